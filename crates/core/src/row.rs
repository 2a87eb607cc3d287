//! Row structure for Tessera.
//!
//! This module defines the `Row` struct which represents a single record in a
//! table: a caller-assigned identity plus a column name → value mapping.

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Unique identifier for a row within its table.
pub type RowId = u64;

/// A row in a table.
///
/// Columns are kept sorted by name, which makes persisted column order
/// deterministic.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Row {
    /// Identifier for this row, fixed at construction.
    id: RowId,
    /// Values stored in this row, keyed by column name.
    data: BTreeMap<String, Value>,
}

impl Row {
    /// Creates an empty row with the given ID.
    pub fn new(id: RowId) -> Self {
        Self {
            id,
            data: BTreeMap::new(),
        }
    }

    /// Creates a row from an ID and `(column, value)` pairs.
    pub fn from_pairs<I, K, V>(id: RowId, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Self {
            id,
            data: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Builder-style setter.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    /// Returns the row ID.
    #[inline]
    pub fn id(&self) -> RowId {
        self.id
    }

    /// Gets the value stored under a column.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.data.get(column)
    }

    /// Sets a column, returning the previous value if any.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.data.insert(column.into(), value.into())
    }

    /// Removes a column, returning its value if any.
    pub fn remove(&mut self, column: &str) -> Option<Value> {
        self.data.remove(column)
    }

    /// Returns the column → value mapping.
    #[inline]
    pub fn data(&self) -> &BTreeMap<String, Value> {
        &self.data
    }

    /// Iterates over column names in sorted order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(|k| k.as_str())
    }

    /// Returns the number of columns in this row.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if this row has no columns.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns true if every `(column, value)` condition holds for this row.
    pub fn matches<'a, I>(&self, conditions: I) -> bool
    where
        I: IntoIterator<Item = (&'a String, &'a Value)>,
    {
        conditions
            .into_iter()
            .all(|(column, expected)| self.data.get(column) == Some(expected))
    }
}
