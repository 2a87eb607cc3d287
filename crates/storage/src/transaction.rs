//! Transaction management for Tessera.
//!
//! A transaction is a deferred-execution queue: operations are recorded
//! against their target tables and only take effect, in enqueue order, when
//! the transaction commits. There is no isolation and no undo; each replayed
//! operation takes its table's lock on its own.

use crate::sink::LogSink;
use crate::table::Table;
use core::sync::atomic::{AtomicU64, Ordering};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tessera_core::{Error, Result, Row, RowId, Value};
use tracing::{debug, warn};

/// Global transaction ID counter.
static NEXT_TX_ID: AtomicU64 = AtomicU64::new(1);

/// Transaction ID type.
pub type TransactionId = u64;

/// Transaction state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransactionState {
    /// Operations can be queued, committed or discarded.
    Open,
    /// The queue has been replayed. Only `rollback` reopens it.
    Committed,
}

/// A table mutation recorded for later replay.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    /// `Table::add_record`
    Insert(Row),
    /// `Table::update_field`
    UpdateField { id: RowId, column: String, value: Value },
    /// `Table::update_record`
    UpdateRow(Row),
    /// `Table::delete_record`
    Delete(RowId),
}

impl Operation {
    /// Applies this operation to `table` through its non-deferred method.
    pub fn apply(&self, table: &Table) -> Result<()> {
        match self {
            Operation::Insert(row) => table.add_record(row.clone()),
            Operation::UpdateField { id, column, value } => {
                table.update_field(*id, column, value.clone())
            }
            Operation::UpdateRow(row) => table.update_record(row.clone()),
            Operation::Delete(id) => table.delete_record(*id),
        }
    }

    /// Returns the ID of the row this operation targets.
    pub fn row_id(&self) -> RowId {
        match self {
            Operation::Insert(row) | Operation::UpdateRow(row) => row.id(),
            Operation::UpdateField { id, .. } | Operation::Delete(id) => *id,
        }
    }
}

/// An operation bound to the table it targets.
#[derive(Clone)]
pub struct PendingOperation {
    table: Arc<Table>,
    operation: Operation,
}

impl PendingOperation {
    /// Returns the target table.
    pub fn table(&self) -> &Arc<Table> {
        &self.table
    }

    /// Returns the queued operation.
    pub fn operation(&self) -> &Operation {
        &self.operation
    }
}

impl core::fmt::Debug for PendingOperation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PendingOperation")
            .field("table", &self.table.name())
            .field("operation", &self.operation)
            .finish()
    }
}

/// Serializable view of a queued operation, the table referenced by name.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OperationRecord {
    pub table: String,
    pub operation: Operation,
}

/// A deferred-execution transaction.
#[derive(Debug)]
pub struct Transaction {
    /// Unique transaction ID.
    id: TransactionId,
    /// Queued operations, in enqueue order.
    pending: Vec<PendingOperation>,
    state: TransactionState,
    sink: LogSink,
}

impl Transaction {
    /// Creates a new, empty, open transaction.
    pub fn begin() -> Self {
        Self {
            id: NEXT_TX_ID.fetch_add(1, Ordering::SeqCst),
            pending: Vec::new(),
            state: TransactionState::Open,
            sink: LogSink::current(),
        }
    }

    /// Routes commit and rollback events to `sink`.
    pub fn with_sink(mut self, sink: LogSink) -> Self {
        self.sink = sink;
        self
    }

    /// Returns the transaction ID.
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Returns the current state.
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Returns true once the transaction has committed.
    pub fn is_committed(&self) -> bool {
        self.state == TransactionState::Committed
    }

    /// Returns the number of queued operations.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns true if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Iterates the queued operations in replay order.
    pub fn operations(&self) -> impl Iterator<Item = &PendingOperation> {
        self.pending.iter()
    }

    /// Appends an operation against `table`.
    ///
    /// Operations queued after commit are kept but never replayed.
    pub fn add_operation(&mut self, table: &Arc<Table>, operation: Operation) {
        self.pending.push(PendingOperation {
            table: Arc::clone(table),
            operation,
        });
    }

    /// Replays every queued operation in order.
    ///
    /// Fails with `AlreadyCommitted` on a second commit, touching nothing.
    /// If an operation fails, replay stops: the operations already applied
    /// leave the queue, the failing one and its successors stay queued and
    /// the transaction stays open.
    pub fn commit(&mut self) -> Result<()> {
        if self.is_committed() {
            return Err(Error::AlreadyCommitted);
        }

        let mut applied = 0;
        let mut failure = None;
        for pending in &self.pending {
            match pending.operation.apply(&pending.table) {
                Ok(()) => applied += 1,
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }
        self.pending.drain(..applied);

        if let Some(err) = failure {
            let (tx, left) = (self.id, self.pending.len());
            self.sink
                .in_scope(|| warn!(tx, applied, pending = left, error = %err, "commit stopped"));
            return Err(err);
        }

        self.state = TransactionState::Committed;
        let tx = self.id;
        self.sink.in_scope(|| debug!(tx, applied, "transaction committed"));
        Ok(())
    }

    /// Discards every queued operation and reopens the transaction.
    /// Effects already applied by a commit stay.
    pub fn rollback(&mut self) {
        let (tx, discarded) = (self.id, self.pending.len());
        self.pending.clear();
        self.state = TransactionState::Open;
        self.sink.in_scope(|| debug!(tx, discarded, "transaction rolled back"));
    }

    /// Returns the queue as serializable records.
    pub fn describe(&self) -> Vec<OperationRecord> {
        self.pending
            .iter()
            .map(|p| OperationRecord {
                table: p.table.name().to_string(),
                operation: p.operation.clone(),
            })
            .collect()
    }
}

impl Default for Transaction {
    fn default() -> Self {
        Self::begin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn people() -> (TempDir, Arc<Table>) {
        let dir = tempfile::tempdir().unwrap();
        let table = Arc::new(Table::new("users", dir.path().join("users.csv")));
        table.add_record(Row::new(1).with("name", "Alice").with("age", 30)).unwrap();
        table.add_record(Row::new(2).with("name", "Bob").with("age", 25)).unwrap();
        (dir, table)
    }

    #[test]
    fn test_transaction_begin() {
        let a = Transaction::begin();
        let b = Transaction::begin();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.state(), TransactionState::Open);
        assert!(a.is_empty());
    }

    #[test]
    fn test_operations_deferred_until_commit() {
        let (_dir, table) = people();
        let mut tx = Transaction::begin();
        table.update_field_in(1, "age", Value::Int(31), &mut tx);
        table.delete_record_in(2, &mut tx);

        assert_eq!(tx.len(), 2);
        assert_eq!(table.get_record(1).unwrap().get("age"), Some(&Value::Int(30)));
        assert!(table.get_record(2).is_some());

        tx.commit().unwrap();
        assert!(tx.is_committed());
        assert_eq!(table.get_record(1).unwrap().get("age"), Some(&Value::Int(31)));
        assert!(table.get_record(2).is_none());
    }

    #[test]
    fn test_commit_replays_in_order() {
        let (_dir, table) = people();
        let mut tx = Transaction::begin();
        table.add_record_in(Row::new(3).with("name", "Carol"), &mut tx);
        table.update_field_in(3, "name", Value::from("Caroline"), &mut tx);
        table.delete_record_in(3, &mut tx);
        table.update_record_in(Row::new(3).with("name", "Cleo"), &mut tx);
        tx.commit().unwrap();

        assert_eq!(table.get_record(3).unwrap().get("name"), Some(&Value::from("Cleo")));
    }

    #[test]
    fn test_double_commit() {
        let (_dir, table) = people();
        let mut tx = Transaction::begin();
        table.delete_record_in(1, &mut tx);
        tx.commit().unwrap();

        table.add_record(Row::new(1).with("name", "Alice")).unwrap();
        assert!(matches!(tx.commit(), Err(Error::AlreadyCommitted)));
        assert!(table.get_record(1).is_some());
        assert!(tx.is_committed());
    }

    #[test]
    fn test_rollback_discards_queue() {
        let (_dir, table) = people();
        let mut tx = Transaction::begin();
        table.delete_record_in(1, &mut tx);
        tx.rollback();

        assert!(tx.is_empty());
        assert!(!tx.is_committed());
        tx.commit().unwrap();
        assert!(table.get_record(1).is_some());
    }

    #[test]
    fn test_rollback_after_commit_reopens() {
        let (_dir, table) = people();
        let mut tx = Transaction::begin();
        table.delete_record_in(1, &mut tx);
        tx.commit().unwrap();
        assert!(tx.is_committed());

        tx.rollback();
        assert_eq!(tx.state(), TransactionState::Open);
        // Applied effects are not undone.
        assert!(table.get_record(1).is_none());

        table.add_record_in(Row::new(3).with("name", "Carol"), &mut tx);
        tx.commit().unwrap();
        assert!(tx.is_committed());
        assert_eq!(table.get_record(3).unwrap().get("name"), Some(&Value::from("Carol")));
    }

    #[test]
    fn test_failed_commit_keeps_rest_queued() {
        let (_dir, table) = people();
        table.add_unique_constraint("name");

        let mut tx = Transaction::begin();
        table.update_field_in(1, "age", Value::Int(40), &mut tx);
        table.add_record_in(Row::new(3).with("name", "Bob"), &mut tx);
        table.delete_record_in(2, &mut tx);

        let err = tx.commit().unwrap_err();
        assert!(matches!(err, Error::ConstraintViolation { .. }));
        assert_eq!(tx.state(), TransactionState::Open);
        assert_eq!(table.get_record(1).unwrap().get("age"), Some(&Value::Int(40)));
        assert!(table.get_record(2).is_some());

        let left: Vec<RowId> = tx.operations().map(|p| p.operation().row_id()).collect();
        assert_eq!(left, vec![3, 2]);

        // Drop the failing insert and retry.
        tx.rollback();
        table.delete_record_in(2, &mut tx);
        tx.commit().unwrap();
        assert!(table.get_record(2).is_none());
    }

    #[test]
    fn test_commit_spans_tables() {
        let dir = tempfile::tempdir().unwrap();
        let a = Arc::new(Table::new("a", dir.path().join("a.csv")));
        let b = Arc::new(Table::new("b", dir.path().join("b.csv")));

        let mut tx = Transaction::begin();
        a.add_record_in(Row::new(1).with("x", 1), &mut tx);
        b.add_record_in(Row::new(1).with("y", 2), &mut tx);
        tx.commit().unwrap();

        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 1);
    }

    #[test]
    fn test_describe_serializes() {
        let (_dir, table) = people();
        let mut tx = Transaction::begin();
        table.update_field_in(1, "age", Value::Int(31), &mut tx);
        table.delete_record_in(2, &mut tx);

        #[derive(Serialize, Deserialize)]
        struct Queue {
            operations: Vec<OperationRecord>,
        }

        let queue = Queue {
            operations: tx.describe(),
        };
        let text = toml::to_string(&queue).unwrap();
        assert!(text.contains("users"));

        let back: Queue = toml::from_str(&text).unwrap();
        assert_eq!(back.operations, tx.describe());
        assert_eq!(back.operations[1].operation, Operation::Delete(2));
    }

    #[test]
    fn test_commit_events_go_to_sink() {
        let (sink, buf) = crate::sink::test_support::capturing_sink();
        let (_dir, table) = people();
        let mut tx = Transaction::begin().with_sink(sink);
        table.delete_record_in(1, &mut tx);
        tx.commit().unwrap();
        assert!(buf.contents().contains("transaction committed"));
    }
}
