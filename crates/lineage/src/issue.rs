use serde::Serialize;

/// A non-fatal problem found while reconstructing chains.
///
/// Issues never abort a pass. Each one is logged when raised and returned to
/// the caller alongside the chains so the admin surface can show them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LineageIssue {
    /// The record could not be read (missing, unparseable, or timed out) and
    /// was left out of the working set.
    #[error("record {request_id} skipped: {reason}")]
    FetchSkipped { request_id: String, reason: String },

    /// The record's input is a hosted image whose request is not in the
    /// working set. The record is treated as a root.
    #[error("record {request_id} names unknown parent {candidate}; treated as a root")]
    DanglingParent {
        request_id: String,
        candidate: String,
    },

    /// A second, different parent was offered for a record that already has
    /// one. The first parent is kept.
    #[error("record {request_id} already linked to {kept}; rejected second parent {rejected}")]
    ParentConflict {
        request_id: String,
        kept: String,
        rejected: String,
    },

    /// Following parent links from `leaf` did not reach a root within
    /// `bound` steps, so the links loop. The chain for `leaf` is dropped.
    #[error("chain ending at {leaf} exceeds {bound} links; parent links form a cycle")]
    CycleDetected { leaf: String, bound: usize },
}

impl LineageIssue {
    /// Request id the issue is about.
    pub fn request_id(&self) -> &str {
        match self {
            LineageIssue::FetchSkipped { request_id, .. }
            | LineageIssue::DanglingParent { request_id, .. }
            | LineageIssue::ParentConflict { request_id, .. } => request_id,
            LineageIssue::CycleDetected { leaf, .. } => leaf,
        }
    }

    /// Emit the issue on the log channel.
    pub(crate) fn log(&self) {
        match self {
            LineageIssue::FetchSkipped { request_id, reason } => {
                tracing::warn!(request_id = %request_id, reason = %reason, "record skipped");
            }
            LineageIssue::DanglingParent {
                request_id,
                candidate,
            } => {
                tracing::warn!(
                    request_id = %request_id,
                    candidate = %candidate,
                    "parent not in working set; treating as root"
                );
            }
            LineageIssue::ParentConflict { .. } | LineageIssue::CycleDetected { .. } => {
                tracing::error!(issue = %self, "lineage data integrity error");
            }
        }
    }
}
