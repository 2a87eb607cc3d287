//! Bounded row cache for Tessera tables.
//!
//! This module provides the `Cache` struct, a fixed-capacity `RowId → Row`
//! overlay with least-recently-used eviction. The cache is a performance hint
//! only: a miss says nothing about whether the row exists.

use hashbrown::HashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tessera_core::{Row, RowId};

/// Capacity used by tables that do not configure one.
pub const DEFAULT_CACHE_CAPACITY: usize = 100;

const NIL: usize = usize::MAX;

/// A slot in the recency list.
struct Node {
    key: RowId,
    row: Option<Arc<Row>>,
    prev: usize,
    next: usize,
}

/// Recency list over a slab of nodes; `head` is most recently used.
struct LruState {
    map: HashMap<RowId, usize>,
    nodes: Vec<Node>,
    free: Vec<usize>,
    head: usize,
    tail: usize,
}

impl LruState {
    fn new() -> Self {
        Self {
            map: HashMap::new(),
            nodes: Vec::new(),
            free: Vec::new(),
            head: NIL,
            tail: NIL,
        }
    }

    fn detach(&mut self, idx: usize) {
        let (prev, next) = (self.nodes[idx].prev, self.nodes[idx].next);
        if prev == NIL {
            self.head = next;
        } else {
            self.nodes[prev].next = next;
        }
        if next == NIL {
            self.tail = prev;
        } else {
            self.nodes[next].prev = prev;
        }
        self.nodes[idx].prev = NIL;
        self.nodes[idx].next = NIL;
    }

    fn push_front(&mut self, idx: usize) {
        self.nodes[idx].prev = NIL;
        self.nodes[idx].next = self.head;
        if self.head != NIL {
            self.nodes[self.head].prev = idx;
        }
        self.head = idx;
        if self.tail == NIL {
            self.tail = idx;
        }
    }

    fn release(&mut self, idx: usize) {
        self.detach(idx);
        self.nodes[idx].row = None;
        self.free.push(idx);
    }

    fn allocate(&mut self, key: RowId, row: Arc<Row>) -> usize {
        let node = Node {
            key,
            row: Some(row),
            prev: NIL,
            next: NIL,
        };
        match self.free.pop() {
            Some(idx) => {
                self.nodes[idx] = node;
                idx
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }
}

/// Fixed-capacity LRU cache of rows keyed by row ID.
///
/// All methods take `&self` and synchronize internally, so the cache can be
/// shared by concurrent readers of a table.
pub struct Cache {
    capacity: usize,
    state: Mutex<LruState>,
}

impl Cache {
    /// Creates a cache holding at most `capacity` rows.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(LruState::new()),
        }
    }

    /// Returns the maximum number of cached rows.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of cached rows.
    pub fn len(&self) -> usize {
        self.state.lock().map.len()
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if the key is cached, without touching recency.
    pub fn contains(&self, key: RowId) -> bool {
        self.state.lock().map.contains_key(&key)
    }

    /// Gets a cached row and marks it most recently used.
    pub fn get(&self, key: RowId) -> Option<Arc<Row>> {
        let mut state = self.state.lock();
        let idx = *state.map.get(&key)?;
        state.detach(idx);
        state.push_front(idx);
        state.nodes[idx].row.clone()
    }

    /// Inserts or overwrites a row and marks it most recently used.
    ///
    /// Evicts the least recently used entry when the insert overflows the
    /// capacity.
    pub fn put(&self, key: RowId, row: Arc<Row>) {
        if self.capacity == 0 {
            return;
        }
        let mut state = self.state.lock();
        let existing = state.map.get(&key).copied();
        if let Some(idx) = existing {
            state.nodes[idx].row = Some(row);
            state.detach(idx);
            state.push_front(idx);
            return;
        }

        if state.map.len() >= self.capacity {
            let lru = state.tail;
            let evicted = state.nodes[lru].key;
            state.map.remove(&evicted);
            state.release(lru);
        }

        let idx = state.allocate(key, row);
        state.push_front(idx);
        state.map.insert(key, idx);
    }

    /// Removes a row from the cache.
    pub fn remove(&self, key: RowId) {
        let mut state = self.state.lock();
        if let Some(idx) = state.map.remove(&key) {
            state.release(idx);
        }
    }

    /// Discards every cached row.
    pub fn clear(&self) {
        *self.state.lock() = LruState::new();
    }

    /// Returns cached keys from most to least recently used.
    pub fn keys(&self) -> Vec<RowId> {
        let state = self.state.lock();
        let mut keys = Vec::with_capacity(state.map.len());
        let mut cursor = state.head;
        while cursor != NIL {
            keys.push(state.nodes[cursor].key);
            cursor = state.nodes[cursor].next;
        }
        keys
    }
}

impl Default for Cache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}
