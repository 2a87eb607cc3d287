//! Secondary indexes for Tessera tables.
//!
//! Indexes are derived structures, never the source of truth. A table keeps
//! an `IndexSet` holding:
//!
//! - single-column indexes: `Value → {RowId}`
//! - composite indexes, identified by their ordered column list:
//!   `[Value] → {RowId}`
//!
//! A row that lacks an indexed column is not present in that index.

use core::borrow::Borrow;
use core::hash::Hash;
use hashbrown::HashMap;
use std::collections::{BTreeMap, BTreeSet};
use tessera_core::{Row, RowId, Value};

/// A hash-based index for point lookups.
///
/// Buckets are kept sorted so lookups return row IDs in ascending order.
/// Empty buckets are dropped eagerly.
#[derive(Debug)]
pub struct HashIndex<K> {
    /// The underlying map from keys to row IDs.
    map: HashMap<K, BTreeSet<RowId>>,
    /// Total number of (key, row) entries.
    entries: usize,
}

impl<K: Eq + Hash> HashIndex<K> {
    /// Creates a new empty index.
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
            entries: 0,
        }
    }

    /// Adds a row ID under a key.
    pub fn add(&mut self, key: K, row_id: RowId) {
        if self.map.entry(key).or_default().insert(row_id) {
            self.entries += 1;
        }
    }

    /// Removes a row ID from a key's bucket, dropping the bucket when empty.
    pub fn remove<Q>(&mut self, key: &Q, row_id: RowId)
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        if let Some(ids) = self.map.get_mut(key) {
            if ids.remove(&row_id) {
                self.entries -= 1;
            }
            if ids.is_empty() {
                self.map.remove(key);
            }
        }
    }

    /// Gets the bucket for a key.
    pub fn get<Q>(&self, key: &Q) -> Option<&BTreeSet<RowId>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.get(key)
    }

    /// Checks if the index contains a key.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.contains_key(key)
    }

    /// Returns the number of distinct keys.
    pub fn key_count(&self) -> usize {
        self.map.len()
    }

    /// Returns the number of (key, row) entries.
    pub fn len(&self) -> usize {
        self.entries
    }

    /// Returns true if the index holds no entries.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Clears all entries.
    pub fn clear(&mut self) {
        self.map.clear();
        self.entries = 0;
    }

    /// Iterates over `(key, bucket)` pairs in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &BTreeSet<RowId>)> {
        self.map.iter()
    }
}

impl<K: Eq + Hash> Default for HashIndex<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Extracts a single-column key from a row.
fn single_key(row: &Row, column: &str) -> Option<Value> {
    row.get(column).cloned()
}

/// Extracts a composite key from a row, in index column order.
fn composite_key(row: &Row, columns: &[String]) -> Option<Vec<Value>> {
    columns.iter().map(|c| row.get(c).cloned()).collect()
}

/// Outcome of consulting the index set for a condition map.
#[derive(Debug, PartialEq)]
pub enum IndexLookup {
    /// No index applies to any condition.
    NotApplicable,
    /// Some applicable index has no bucket for the required value.
    Empty,
    /// Intersection of every applicable index bucket, plus the condition
    /// columns those indexes already enforce.
    Candidates {
        ids: BTreeSet<RowId>,
        covered: BTreeSet<String>,
    },
}

/// All secondary indexes of one table.
#[derive(Debug, Default)]
pub struct IndexSet {
    single: BTreeMap<String, HashIndex<Value>>,
    multi: BTreeMap<Vec<String>, HashIndex<Vec<Value>>>,
}

impl IndexSet {
    /// Creates an empty index set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds (or replaces) a single-column index from the given rows.
    pub fn build_single<'a>(&mut self, column: &str, rows: impl Iterator<Item = &'a Row>) {
        let mut index = HashIndex::new();
        for row in rows {
            if let Some(key) = single_key(row, column) {
                index.add(key, row.id());
            }
        }
        self.single.insert(column.to_string(), index);
    }

    /// Builds (or replaces) a composite index from the given rows.
    pub fn build_multi<'a>(&mut self, columns: Vec<String>, rows: impl Iterator<Item = &'a Row>) {
        let mut index = HashIndex::new();
        for row in rows {
            if let Some(key) = composite_key(row, &columns) {
                index.add(key, row.id());
            }
        }
        self.multi.insert(columns, index);
    }

    /// Drops a single-column index. Returns true if it existed.
    pub fn drop_single(&mut self, column: &str) -> bool {
        self.single.remove(column).is_some()
    }

    /// Drops a composite index. Returns true if it existed.
    pub fn drop_multi(&mut self, columns: &[String]) -> bool {
        self.multi.remove(columns).is_some()
    }

    /// Rebuilds every index from scratch over the given rows.
    pub fn rebuild<'a>(&mut self, rows: impl Iterator<Item = &'a Row> + Clone) {
        let singles: Vec<String> = self.single.keys().cloned().collect();
        for column in singles {
            self.build_single(&column, rows.clone());
        }
        let multis: Vec<Vec<String>> = self.multi.keys().cloned().collect();
        for columns in multis {
            self.build_multi(columns, rows.clone());
        }
    }

    /// Adds a row to every index under its current values.
    pub fn insert_row(&mut self, row: &Row) {
        for (column, index) in self.single.iter_mut() {
            if let Some(key) = single_key(row, column) {
                index.add(key, row.id());
            }
        }
        for (columns, index) in self.multi.iter_mut() {
            if let Some(key) = composite_key(row, columns) {
                index.add(key, row.id());
            }
        }
    }

    /// Removes a row from every index under the values it holds.
    pub fn remove_row(&mut self, row: &Row) {
        for (column, index) in self.single.iter_mut() {
            if let Some(key) = row.get(column) {
                index.remove(key, row.id());
            }
        }
        for (columns, index) in self.multi.iter_mut() {
            if let Some(key) = composite_key(row, columns) {
                index.remove(key.as_slice(), row.id());
            }
        }
    }

    /// Moves a row's index entries from its old values to its new values.
    pub fn replace_row(&mut self, old: &Row, new: &Row) {
        self.remove_row(old);
        self.insert_row(new);
    }

    /// Gets a single-column index.
    pub fn single(&self, column: &str) -> Option<&HashIndex<Value>> {
        self.single.get(column)
    }

    /// Gets a composite index by its ordered column list.
    pub fn multi(&self, columns: &[String]) -> Option<&HashIndex<Vec<Value>>> {
        self.multi.get(columns)
    }

    /// Returns the indexed single columns.
    pub fn single_columns(&self) -> Vec<String> {
        self.single.keys().cloned().collect()
    }

    /// Returns the column lists of all composite indexes.
    pub fn multi_columns(&self) -> Vec<Vec<String>> {
        self.multi.keys().cloned().collect()
    }

    /// Intersects the buckets of every index applicable to `conditions`.
    ///
    /// A single-column index applies when its column is a condition key; a
    /// composite index applies when all of its columns are condition keys.
    pub fn lookup(&self, conditions: &BTreeMap<String, Value>) -> IndexLookup {
        let mut ids: Option<BTreeSet<RowId>> = None;
        let mut covered = BTreeSet::new();

        for (column, value) in conditions {
            let Some(index) = self.single.get(column) else {
                continue;
            };
            let Some(bucket) = index.get(value) else {
                return IndexLookup::Empty;
            };
            ids = Some(intersect(ids, bucket));
            covered.insert(column.clone());
        }

        for (columns, index) in &self.multi {
            let key: Option<Vec<Value>> =
                columns.iter().map(|c| conditions.get(c).cloned()).collect();
            let Some(key) = key else {
                continue;
            };
            let Some(bucket) = index.get(key.as_slice()) else {
                return IndexLookup::Empty;
            };
            ids = Some(intersect(ids, bucket));
            covered.extend(columns.iter().cloned());
        }

        match ids {
            None => IndexLookup::NotApplicable,
            Some(ids) if ids.is_empty() => IndexLookup::Empty,
            Some(ids) => IndexLookup::Candidates { ids, covered },
        }
    }
}

fn intersect(current: Option<BTreeSet<RowId>>, bucket: &BTreeSet<RowId>) -> BTreeSet<RowId> {
    match current {
        None => bucket.clone(),
        Some(mut ids) => {
            ids.retain(|id| bucket.contains(id));
            ids
        }
    }
}
