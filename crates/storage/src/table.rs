//! Table storage for Tessera.
//!
//! This module provides the `Table` struct which owns the rows of a single
//! table together with their secondary indexes, unique constraints, a bounded
//! row cache, and the backing file.
//!
//! Every mutation updates the row store, the indexes and the cache, then
//! rewrites the backing file, all under the table's write lock. Reads share
//! the read lock.

use crate::cache::{Cache, DEFAULT_CACHE_CAPACITY};
use crate::constraint::ConstraintChecker;
use crate::index::{IndexLookup, IndexSet};
use crate::persist;
use crate::sink::LogSink;
use crate::transaction::{Operation, Transaction};
use core::cmp::Ordering;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tessera_core::{Error, Result, Row, RowId, Value, ValueKind};
use tracing::{debug, info, warn};

/// Column → required value. An empty map matches every row.
pub type Conditions = BTreeMap<String, Value>;

/// State guarded by the table lock.
#[derive(Default)]
struct TableState {
    rows: BTreeMap<RowId, Arc<Row>>,
    indexes: IndexSet,
    unique_columns: BTreeSet<String>,
    column_kinds: BTreeMap<String, ValueKind>,
}

impl TableState {
    fn row_refs(&self) -> impl Iterator<Item = &Row> + Clone {
        self.rows.values().map(|r| r.as_ref())
    }
}

/// A named table backed by a flat file.
pub struct Table {
    name: String,
    path: PathBuf,
    state: RwLock<TableState>,
    cache: Cache,
    sink: LogSink,
}

impl Table {
    /// Creates an empty table backed by `path`. Nothing is read or written
    /// until the first mutation or an explicit [`Table::load`].
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            state: RwLock::new(TableState::default()),
            cache: Cache::new(DEFAULT_CACHE_CAPACITY),
            sink: LogSink::current(),
        }
    }

    /// Replaces the row cache with one of the given capacity.
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache = Cache::new(capacity);
        self
    }

    /// Routes this table's events to `sink`.
    pub fn with_sink(mut self, sink: LogSink) -> Self {
        self.sink = sink;
        self
    }

    /// Returns the table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the number of rows.
    pub fn len(&self) -> usize {
        self.state.read().rows.len()
    }

    /// Returns true if the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.state.read().rows.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn cache(&self) -> &Cache {
        &self.cache
    }

    /// Returns the number of cached rows.
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Returns the maximum number of cached rows.
    pub fn cache_capacity(&self) -> usize {
        self.cache.capacity()
    }

    /// Returns true if the row is currently cached. Does not touch recency.
    pub fn is_cached(&self, id: RowId) -> bool {
        self.cache.contains(id)
    }

    // ========== Schema ==========

    /// Registers a column for uniqueness checking on future inserts.
    pub fn add_unique_constraint(&self, column: impl Into<String>) {
        self.state.write().unique_columns.insert(column.into());
    }

    /// Returns the unique-constrained columns.
    pub fn unique_columns(&self) -> Vec<String> {
        self.state.read().unique_columns.iter().cloned().collect()
    }

    /// Declares the kind a column's text is parsed as when loading.
    pub fn declare_column_kind(&self, column: impl Into<String>, kind: ValueKind) {
        self.state.write().column_kinds.insert(column.into(), kind);
    }

    /// Builds (or rebuilds) a single-column index over the current rows.
    pub fn create_index(&self, column: &str) {
        let mut guard = self.state.write();
        let state = &mut *guard;
        state.indexes.build_single(column, state.rows.values().map(|r| r.as_ref()));
        self.sink
            .in_scope(|| debug!(table = %self.name, column, "index created"));
    }

    /// Builds (or rebuilds) a composite index over the ordered column list.
    pub fn create_multi_column_index(&self, columns: &[&str]) {
        let columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        let mut guard = self.state.write();
        let state = &mut *guard;
        self.sink
            .in_scope(|| debug!(table = %self.name, columns = ?columns, "composite index created"));
        state.indexes.build_multi(columns, state.rows.values().map(|r| r.as_ref()));
    }

    /// Drops a single-column index. Returns true if it existed.
    pub fn drop_index(&self, column: &str) -> bool {
        self.state.write().indexes.drop_single(column)
    }

    /// Drops a composite index. Returns true if it existed.
    pub fn drop_multi_column_index(&self, columns: &[&str]) -> bool {
        let columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        self.state.write().indexes.drop_multi(&columns)
    }

    /// Returns the columns with a single-column index.
    pub fn indexed_columns(&self) -> Vec<String> {
        self.state.read().indexes.single_columns()
    }

    /// Returns the column lists of all composite indexes.
    pub fn multi_column_indexes(&self) -> Vec<Vec<String>> {
        self.state.read().indexes.multi_columns()
    }

    // ========== Mutations ==========

    /// Inserts a row.
    ///
    /// Fails with `ConstraintViolation`, leaving the table untouched, if a
    /// unique-constrained column already holds the row's value. A row with
    /// an existing ID replaces it.
    pub fn add_record(&self, row: Row) -> Result<()> {
        let mut guard = self.state.write();
        let state = &mut *guard;

        let checked =
            ConstraintChecker::check_unique(&state.unique_columns, state.row_refs(), &row);
        if let Err(err) = checked {
            let id = row.id();
            self.sink
                .in_scope(|| warn!(table = %self.name, id, error = %err, "insert rejected"));
            return Err(err);
        }

        let id = row.id();
        self.store(state, Arc::new(row));
        self.sink.in_scope(|| debug!(table = %self.name, id, "record added"));
        self.persist(state)
    }

    /// Overwrites one column of an existing row. Does nothing if the ID is
    /// absent.
    pub fn update_field(&self, id: RowId, column: &str, value: Value) -> Result<()> {
        let mut guard = self.state.write();
        let state = &mut *guard;

        let Some(old) = state.rows.get(&id) else {
            return Ok(());
        };
        let mut row = Row::clone(old);
        row.set(column, value);

        self.store(state, Arc::new(row));
        self.sink
            .in_scope(|| debug!(table = %self.name, id, column, "record field updated"));
        self.persist(state)
    }

    /// Replaces a whole row, inserting it if the ID is absent.
    ///
    /// Unlike [`Table::add_record`] no unique constraint is checked.
    pub fn update_record(&self, row: Row) -> Result<()> {
        let mut guard = self.state.write();
        let state = &mut *guard;

        let id = row.id();
        self.store(state, Arc::new(row));
        self.sink.in_scope(|| debug!(table = %self.name, id, "record updated"));
        self.persist(state)
    }

    /// Replaces a whole row that must already exist.
    pub fn replace_existing(&self, row: Row) -> Result<()> {
        let mut guard = self.state.write();
        let state = &mut *guard;

        let id = row.id();
        if !state.rows.contains_key(&id) {
            return Err(Error::not_found(self.name.as_str(), id));
        }
        self.store(state, Arc::new(row));
        self.sink.in_scope(|| debug!(table = %self.name, id, "record replaced"));
        self.persist(state)
    }

    /// Deletes a row. Deleting an absent ID is a no-op.
    pub fn delete_record(&self, id: RowId) -> Result<()> {
        let mut guard = self.state.write();
        let state = &mut *guard;

        let Some(old) = state.rows.remove(&id) else {
            return Ok(());
        };
        state.indexes.remove_row(&old);
        self.cache.remove(id);
        self.sink.in_scope(|| debug!(table = %self.name, id, "record deleted"));
        self.persist(state)
    }

    /// Writes `row` into the store, moving its index entries and refreshing
    /// the cache. Caller holds the write lock.
    fn store(&self, state: &mut TableState, row: Arc<Row>) {
        let id = row.id();
        match state.rows.insert(id, Arc::clone(&row)) {
            Some(old) => state.indexes.replace_row(&old, &row),
            None => state.indexes.insert_row(&row),
        }
        self.cache.put(id, row);
    }

    // ========== Deferred mutations ==========

    /// Queues an insert in `tx` instead of applying it.
    pub fn add_record_in(self: &Arc<Self>, row: Row, tx: &mut Transaction) {
        tx.add_operation(self, Operation::Insert(row));
    }

    /// Queues a field update in `tx` instead of applying it.
    pub fn update_field_in(
        self: &Arc<Self>,
        id: RowId,
        column: &str,
        value: Value,
        tx: &mut Transaction,
    ) {
        tx.add_operation(
            self,
            Operation::UpdateField {
                id,
                column: column.to_string(),
                value,
            },
        );
    }

    /// Queues a whole-row update in `tx` instead of applying it.
    pub fn update_record_in(self: &Arc<Self>, row: Row, tx: &mut Transaction) {
        tx.add_operation(self, Operation::UpdateRow(row));
    }

    /// Queues a delete in `tx` instead of applying it.
    pub fn delete_record_in(self: &Arc<Self>, id: RowId, tx: &mut Transaction) {
        tx.add_operation(self, Operation::Delete(id));
    }

    // ========== Reads ==========

    /// Gets a row by ID, serving from the cache when possible.
    pub fn get_record(&self, id: RowId) -> Option<Arc<Row>> {
        let state = self.state.read();
        self.read_row(&state, id)
    }

    /// Cache-aware read. Caller holds the lock.
    fn read_row(&self, state: &TableState, id: RowId) -> Option<Arc<Row>> {
        if let Some(row) = self.cache.get(id) {
            return Some(row);
        }
        let row = Arc::clone(state.rows.get(&id)?);
        self.cache.put(id, Arc::clone(&row));
        Some(row)
    }

    /// Returns one row whose indexed `column` equals `value`, or `None` if
    /// the column is not indexed or nothing matches. Which row is returned
    /// among several matches is unspecified.
    pub fn get_record_by_index(&self, column: &str, value: &Value) -> Option<Arc<Row>> {
        let state = self.state.read();
        let id = *state.indexes.single(column)?.get(value)?.iter().next()?;
        self.read_row(&state, id)
    }

    /// Returns every row in the composite index bucket for `values`.
    ///
    /// Empty if no composite index exists over exactly `columns` (in that
    /// order), or if the arities differ.
    pub fn get_records_by_multi_column_index(
        &self,
        columns: &[&str],
        values: &[Value],
    ) -> Vec<Arc<Row>> {
        if columns.len() != values.len() {
            return Vec::new();
        }
        let columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        let state = self.state.read();
        let Some(ids) = state.indexes.multi(&columns).and_then(|index| index.get(values)) else {
            return Vec::new();
        };
        ids.iter().filter_map(|&id| self.read_row(&state, id)).collect()
    }

    /// Linear scan for rows whose `column` equals `value`, ignoring indexes.
    pub fn query_records(&self, column: &str, value: &Value) -> BTreeMap<RowId, Arc<Row>> {
        let state = self.state.read();
        state
            .rows
            .iter()
            .filter(|(_, row)| row.get(column) == Some(value))
            .map(|(&id, row)| (id, Arc::clone(row)))
            .collect()
    }

    /// Returns every row matching all `conditions`, in ID order.
    ///
    /// Applicable single-column and composite indexes narrow the candidate
    /// set; conditions no applied index covers are then checked on each
    /// candidate. Without an applicable index the whole table is scanned.
    pub fn query(&self, conditions: &Conditions) -> Vec<Arc<Row>> {
        let state = self.state.read();
        self.query_locked(&state, conditions)
    }

    fn query_locked(&self, state: &TableState, conditions: &Conditions) -> Vec<Arc<Row>> {
        match state.indexes.lookup(conditions) {
            IndexLookup::Empty => Vec::new(),
            IndexLookup::NotApplicable => {
                let ids: Vec<RowId> = state
                    .rows
                    .values()
                    .filter(|row| row.matches(conditions))
                    .map(|row| row.id())
                    .collect();
                ids.into_iter().filter_map(|id| self.read_row(state, id)).collect()
            }
            IndexLookup::Candidates { ids, covered } => {
                let residual: Vec<(&String, &Value)> = conditions
                    .iter()
                    .filter(|(column, _)| !covered.contains(*column))
                    .collect();
                ids.into_iter()
                    .filter_map(|id| self.read_row(state, id))
                    .filter(|row| row.matches(residual.iter().copied()))
                    .collect()
            }
        }
    }

    /// Returns rows whose `column` value lies in `[start, end]`, in ID order.
    ///
    /// A `None` bound leaves that side open. Rows lacking the column, or
    /// whose value is of a different kind than a bound, are excluded.
    pub fn range_query(
        &self,
        column: &str,
        start: Option<&Value>,
        end: Option<&Value>,
    ) -> Vec<Arc<Row>> {
        let state = self.state.read();
        state
            .rows
            .values()
            .filter(|row| {
                let Some(value) = row.get(column) else {
                    return false;
                };
                let above = start.map_or(true, |s| {
                    matches!(value.compare(s), Some(Ordering::Greater | Ordering::Equal))
                });
                let below = end.map_or(true, |e| {
                    matches!(value.compare(e), Some(Ordering::Less | Ordering::Equal))
                });
                above && below
            })
            .cloned()
            .collect()
    }

    /// Runs [`Table::query`] and sorts the result by `sort_by`.
    ///
    /// Fails with `Unorderable` if a matching row lacks `sort_by` or the
    /// values are of mixed kinds. Ties keep ID order.
    pub fn sorted_query(
        &self,
        conditions: &Conditions,
        sort_by: &str,
        ascending: bool,
    ) -> Result<Vec<Arc<Row>>> {
        let mut rows = self.query(conditions);

        let mut kind = None;
        for row in &rows {
            let Some(value) = row.get(sort_by) else {
                return Err(Error::unorderable(sort_by));
            };
            match kind {
                None => kind = Some(value.kind()),
                Some(k) if k != value.kind() => return Err(Error::unorderable(sort_by)),
                Some(_) => {}
            }
        }

        rows.sort_by(|a, b| {
            let ord = match (a.get(sort_by), b.get(sort_by)) {
                (Some(x), Some(y)) => x.compare(y).unwrap_or(Ordering::Equal),
                _ => Ordering::Equal,
            };
            if ascending {
                ord
            } else {
                ord.reverse()
            }
        });
        Ok(rows)
    }

    /// Runs [`Table::query`] and returns the 1-based `page` of `page_size`
    /// rows. Empty when the page starts before the first row or past the
    /// last one.
    pub fn paginated_query(
        &self,
        conditions: &Conditions,
        page: i64,
        page_size: i64,
    ) -> Vec<Arc<Row>> {
        let rows = self.query(conditions);
        let Some(from) = page.checked_sub(1).and_then(|p| p.checked_mul(page_size)) else {
            return Vec::new();
        };
        if from < 0 || from >= rows.len() as i64 || page_size <= 0 {
            return Vec::new();
        }
        let from = from as usize;
        let to = from.saturating_add(page_size as usize).min(rows.len());
        rows[from..to].to_vec()
    }

    /// Returns every row, in ID order.
    pub fn scan(&self) -> Vec<Arc<Row>> {
        self.state.read().rows.values().cloned().collect()
    }

    /// Returns every row ID, in order.
    pub fn row_ids(&self) -> Vec<RowId> {
        self.state.read().rows.keys().copied().collect()
    }

    // ========== Persistence ==========

    /// Rewrites the backing file. Caller holds the write lock.
    fn persist(&self, state: &TableState) -> Result<()> {
        persist::write_rows(&self.path, state.row_refs()).map_err(|err| {
            self.sink
                .in_scope(|| warn!(table = %self.name, error = %err, "table not persisted"));
            err
        })
    }

    /// Rewrites the backing file with the current rows.
    pub fn save(&self) -> Result<()> {
        let state = self.state.write();
        self.persist(&state)
    }

    /// Replaces the in-memory rows with the backing file's content.
    ///
    /// A missing file leaves the table as it is. On a malformed file nothing
    /// changes. Indexes are rebuilt and the cache is cleared.
    pub fn load(&self) -> Result<()> {
        let mut guard = self.state.write();
        let state = &mut *guard;

        let Some(rows) = persist::read_rows(&self.path, &state.column_kinds)? else {
            return Ok(());
        };
        state.rows = rows.into_iter().map(|(id, row)| (id, Arc::new(row))).collect();
        state.indexes.rebuild(state.rows.values().map(|r| r.as_ref()));
        self.cache.clear();

        let count = state.rows.len();
        self.sink
            .in_scope(|| info!(table = %self.name, rows = count, "table loaded"));
        Ok(())
    }
}

impl core::fmt::Debug for Table {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Table")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("rows", &self.len())
            .finish()
    }
}
