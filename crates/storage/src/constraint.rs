//! Constraint checking for Tessera.
//!
//! Uniqueness is checked at insert time only, by scanning the current rows
//! once per constrained column.

use std::collections::BTreeSet;
use tessera_core::{Error, Result, Row};

/// Constraint checker for validating unique columns.
pub struct ConstraintChecker;

impl ConstraintChecker {
    /// Checks the unique constraints for a row about to be inserted.
    ///
    /// A row that lacks a constrained column is not checked for it. A stored
    /// row with the same ID is the one being replaced and is ignored.
    pub fn check_unique<'a, I>(
        unique_columns: &BTreeSet<String>,
        existing: I,
        row: &Row,
    ) -> Result<()>
    where
        I: Iterator<Item = &'a Row> + Clone,
    {
        for column in unique_columns {
            let Some(value) = row.get(column) else {
                continue;
            };
            let taken = existing
                .clone()
                .any(|other| other.id() != row.id() && other.get(column) == Some(value));
            if taken {
                return Err(Error::constraint_violation(column.as_str(), value.clone()));
            }
        }
        Ok(())
    }
}
