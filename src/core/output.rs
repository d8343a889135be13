//! Public output types for bulk and per-host results.
//!
//! Used by the service, coordination and fleet clients and by the CLI commands
//! that serialize them.

use serde::{Deserialize, Serialize};

// ============================================================================
// Batch Operations
// ============================================================================

/// Summary of a bulk create/delete over remote items. Failures are recorded,
/// never raised.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub created: u32,
    pub deleted: u32,
    pub skipped: u32,
    pub errors: u32,
    pub items: Vec<BatchResultItem>,
}

/// Individual item result within a batch operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResultItem {
    pub id: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_created(&mut self, id: String) {
        self.created += 1;
        self.push(id, "created", None);
    }

    pub fn record_deleted(&mut self, id: String) {
        self.deleted += 1;
        self.push(id, "deleted", None);
    }

    pub fn record_skipped(&mut self, id: String) {
        self.skipped += 1;
        self.push(id, "skipped", None);
    }

    pub fn record_error(&mut self, id: String, error: String) {
        self.errors += 1;
        self.push(id, "error", Some(error));
    }

    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }

    fn push(&mut self, id: String, status: &str, error: Option<String>) {
        self.items.push(BatchResultItem {
            id,
            status: status.to_string(),
            error,
        });
    }
}

// ============================================================================
// Bulk Operations (one outcome per host)
// ============================================================================

/// Standardized per-host execution result.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkResult<T: Serialize> {
    pub action: String,
    pub results: Vec<ItemOutcome<T>>,
    pub summary: BulkSummary,
}

/// Outcome for a single item in a bulk operation.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemOutcome<T: Serialize> {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(flatten)]
    pub result: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Summary of bulk operation results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl BulkSummary {
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

impl<T: Serialize> BulkResult<T> {
    pub fn new(action: impl Into<String>, results: Vec<ItemOutcome<T>>) -> Self {
        let failed = results.iter().filter(|r| r.error.is_some()).count();
        let summary = BulkSummary {
            total: results.len(),
            succeeded: results.len() - failed,
            failed,
            skipped: 0,
        };
        Self {
            action: action.into(),
            results,
            summary,
        }
    }
}
