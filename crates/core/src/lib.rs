//! Tessera Core - Core types for the Tessera table store.
//!
//! This crate provides the foundational types shared by the storage engine and
//! its front ends:
//!
//! - `Value`: Closed scalar variant stored in row cells (Int, Float, Text, Bool)
//! - `ValueKind`: Type tag of a value, used to re-type persisted text
//! - `Row`: A column name → value mapping with a caller-assigned identifier
//! - `Error`: Error types for table store operations
//!
//! # Example
//!
//! ```rust
//! use tessera_core::{Row, Value};
//!
//! let row = Row::new(1)
//!     .with("name", "Alice")
//!     .with("age", 30);
//!
//! assert_eq!(row.id(), 1);
//! assert_eq!(row.get("name"), Some(&Value::Text("Alice".into())));
//! assert_eq!(row.get("age"), Some(&Value::Int(30)));
//! ```

mod error;
mod row;
mod value;

pub use error::{Error, Result};
pub use row::{Row, RowId};
pub use value::{Value, ValueKind};
