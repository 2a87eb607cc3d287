//! Tessera Storage - Storage engine for the Tessera table store.
//!
//! This crate provides:
//!
//! - `Table`: Row storage with secondary indexes, unique constraints, a row
//!   cache, queries, and flat-file persistence
//! - `Database`: Registry of named tables, created from code or a TOML config
//! - `Transaction`: Deferred operation queue replayed on commit
//! - `Cache`: Bounded LRU overlay of recently used rows
//! - `LogSink`: Per-instance destination for `tracing` events
//!
//! # Example
//!
//! ```rust
//! use tessera_storage::{Conditions, Database};
//! use tessera_core::{Row, Value};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let db = Database::new();
//! let users = db.create_table("users", dir.path().join("users.csv")).unwrap();
//! users.create_index("age");
//!
//! users.add_record(Row::new(1).with("name", "Alice").with("age", 30)).unwrap();
//! users.add_record(Row::new(2).with("name", "Bob").with("age", 25)).unwrap();
//!
//! // Deferred until commit
//! let mut tx = db.begin_transaction();
//! users.update_field_in(2, "age", Value::Int(30), &mut tx);
//! tx.commit().unwrap();
//!
//! let mut conditions = Conditions::new();
//! conditions.insert("age".into(), Value::Int(30));
//! assert_eq!(users.query(&conditions).len(), 2);
//! ```

pub mod cache;
pub mod config;
pub mod constraint;
pub mod database;
pub mod index;
pub mod persist;
pub mod sink;
pub mod table;
pub mod transaction;

pub use cache::{Cache, DEFAULT_CACHE_CAPACITY};
pub use config::{DatabaseConfig, TableConfig};
pub use constraint::ConstraintChecker;
pub use database::Database;
pub use index::{HashIndex, IndexLookup, IndexSet};
pub use sink::LogSink;
pub use table::{Conditions, Table};
pub use transaction::{
    Operation, OperationRecord, PendingOperation, Transaction, TransactionId, TransactionState,
};
