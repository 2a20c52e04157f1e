//! Import results.

use serde::Serialize;

use crate::error_handling::RowRejection;

/// A skipped row: its origin row and why it was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowError {
    pub row: usize,
    pub message: String,
}

impl RowError {
    pub fn new(row: usize, reason: RowRejection) -> Self {
        Self {
            row,
            message: reason.to_string(),
        }
    }
}

/// What happened to one row inside the import transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    Inserted(i64),
    Rejected(RowError),
}

/// Result of one batch.
///
/// `imported_ids` empty means the transaction was rolled back and nothing
/// was persisted; otherwise it was committed, possibly with some rows in
/// `errors`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportOutcome {
    pub imported_count: usize,
    pub imported_ids: Vec<i64>,
    pub errors: Vec<RowError>,
}

impl ImportOutcome {
    /// Folds one row's outcome in, in input order.
    pub fn record(&mut self, outcome: RowOutcome) {
        match outcome {
            RowOutcome::Inserted(id) => {
                self.imported_ids.push(id);
                self.imported_count += 1;
            }
            RowOutcome::Rejected(error) => self.errors.push(error),
        }
    }

    pub fn committed(&self) -> bool {
        !self.imported_ids.is_empty()
    }
}

impl FromIterator<RowOutcome> for ImportOutcome {
    fn from_iter<I: IntoIterator<Item = RowOutcome>>(iter: I) -> Self {
        let mut outcome = ImportOutcome::default();
        for row in iter {
            outcome.record(row);
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_keeps_input_order() {
        let outcome: ImportOutcome = [
            RowOutcome::Inserted(10),
            RowOutcome::Rejected(RowError::new(3, RowRejection::MissingNumber)),
            RowOutcome::Inserted(11),
        ]
        .into_iter()
        .collect();

        assert_eq!(outcome.imported_ids, vec![10, 11]);
        assert_eq!(outcome.imported_count, 2);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].row, 3);
        assert!(outcome.committed());
    }

    #[test]
    fn test_all_rejected_is_not_committed() {
        let outcome: ImportOutcome =
            [RowOutcome::Rejected(RowError::new(2, RowRejection::MissingNumber))]
                .into_iter()
                .collect();
        assert!(!outcome.committed());
        assert_eq!(outcome.imported_count, 0);
    }

    #[test]
    fn test_serializes_camel_case() {
        let mut outcome = ImportOutcome::default();
        outcome.record(RowOutcome::Inserted(1));
        let json = serde_json::to_value(&outcome).expect("serialize");
        assert_eq!(json["importedCount"], 1);
        assert_eq!(json["importedIds"][0], 1);
        assert!(json["errors"].as_array().is_some_and(|e| e.is_empty()));
    }
}
