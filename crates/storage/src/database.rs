//! Table registry for Tessera.
//!
//! This module provides the `Database` struct which maps table names to
//! shared tables and hands out transactions.

use crate::config::{DatabaseConfig, TableConfig};
use crate::sink::LogSink;
use crate::table::Table;
use crate::transaction::Transaction;
use hashbrown::HashMap;
use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::Arc;
use tessera_core::{Error, Result};
use tracing::{info, warn};

/// Registry of named tables.
#[derive(Default)]
pub struct Database {
    /// Table name → table mapping.
    tables: RwLock<HashMap<String, Arc<Table>>>,
    sink: LogSink,
}

impl Database {
    /// Creates an empty database logging to the current dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty database whose tables and transactions log to `sink`.
    pub fn with_sink(sink: LogSink) -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            sink,
        }
    }

    /// Builds a database from `config`, see [`Database::load_tables_from_config`].
    pub fn from_config(config: &DatabaseConfig, sink: LogSink) -> Result<Self> {
        let db = Self::with_sink(sink);
        db.load_tables_from_config(config)?;
        Ok(db)
    }

    /// Creates and loads every table listed in `config`, in order, returning
    /// how many were created.
    ///
    /// Identifiers without a `[table.<id>]` entry are skipped with a warning.
    /// Stops at the first table that fails to load or whose name is taken.
    pub fn load_tables_from_config(&self, config: &DatabaseConfig) -> Result<usize> {
        let mut created = 0;
        for id in &config.tables {
            let Some(table) = config.table.get(id) else {
                self.sink
                    .in_scope(|| warn!(table = %id, "no configuration for table, skipped"));
                continue;
            };
            self.create_table_from(table)?;
            created += 1;
        }
        Ok(created)
    }

    /// Creates a table backed by `path` and loads its existing content.
    ///
    /// Fails with `TableExists` if the name is taken.
    pub fn create_table(&self, name: &str, path: impl Into<PathBuf>) -> Result<Arc<Table>> {
        self.create_table_from(&TableConfig::new(name, path))
    }

    /// Creates a table from its settings: constraints and column kinds are
    /// declared, the file is loaded, then indexes are built.
    pub fn create_table_from(&self, config: &TableConfig) -> Result<Arc<Table>> {
        let mut tables = self.tables.write();
        if tables.contains_key(&config.name) {
            return Err(Error::table_exists(config.name.as_str()));
        }

        let mut table =
            Table::new(config.name.as_str(), config.file.as_path()).with_sink(self.sink.clone());
        if let Some(capacity) = config.cache_capacity {
            table = table.with_cache_capacity(capacity);
        }
        for column in config.unique_column_list() {
            table.add_unique_constraint(column);
        }
        for (column, kind) in &config.column_kinds {
            table.declare_column_kind(column.as_str(), *kind);
        }
        table.load()?;
        for column in &config.indexes {
            table.create_index(column);
        }
        for columns in &config.multi_column_indexes {
            let columns: Vec<&str> = columns.iter().map(String::as_str).collect();
            table.create_multi_column_index(&columns);
        }

        let table = Arc::new(table);
        tables.insert(config.name.clone(), Arc::clone(&table));
        let (rows, file) = (table.len(), config.file.display());
        self.sink
            .in_scope(|| info!(table = %config.name, file = %file, rows, "table created"));
        Ok(table)
    }

    /// Gets a table by name.
    pub fn get_table(&self, name: &str) -> Option<Arc<Table>> {
        self.tables.read().get(name).cloned()
    }

    /// Gets a table by name, failing with `TableNotFound`.
    pub fn table(&self, name: &str) -> Result<Arc<Table>> {
        self.get_table(name).ok_or_else(|| Error::table_not_found(name))
    }

    /// Removes a table from the registry. Its backing file is left on disk
    /// and handles already given out keep working.
    pub fn delete_table(&self, name: &str) -> Option<Arc<Table>> {
        let removed = self.tables.write().remove(name);
        if removed.is_some() {
            self.sink.in_scope(|| info!(table = name, "table deleted"));
        }
        removed
    }

    /// Checks if a table exists.
    pub fn has_table(&self, name: &str) -> bool {
        self.tables.read().contains_key(name)
    }

    /// Returns the number of tables.
    pub fn table_count(&self) -> usize {
        self.tables.read().len()
    }

    /// Returns all table names, sorted.
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns every table, sorted by name.
    pub fn tables(&self) -> Vec<Arc<Table>> {
        let mut tables: Vec<Arc<Table>> = self.tables.read().values().cloned().collect();
        tables.sort_by(|a, b| a.name().cmp(b.name()));
        tables
    }

    /// Starts a transaction logging to this database's sink.
    pub fn begin_transaction(&self) -> Transaction {
        Transaction::begin().with_sink(self.sink.clone())
    }

    /// Returns this database's log sink.
    pub fn sink(&self) -> &LogSink {
        &self.sink
    }
}

impl core::fmt::Debug for Database {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Database")
            .field("tables", &self.table_names())
            .finish()
    }
}
