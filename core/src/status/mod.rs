//! Per-entry status state machine.
//!
//! ```text
//!             tick / manual trigger         callback resolves
//!  Pending ───────────────────────▶ Uploading ─────────────▶ Completed
//!                                       │
//!                                       │ callback rejects
//!                                       ▼
//!                                     Error
//! ```
//!
//! Entries that fail validation are created directly in `Error` and
//! never pass through `Pending`. `Completed` and `Error` are terminal:
//! nothing moves an entry out of them, a retry means a new entry.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::TransitionError;

/// Lifecycle status of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Pending,
    Uploading,
    Completed,
    Error,
}

impl UploadStatus {
    /// `Completed` or `Error`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    /// Removal is allowed in every state except `Uploading`.
    pub fn is_removable(self) -> bool {
        self != Self::Uploading
    }

    /// Whether the table allows `self -> next`.
    pub fn can_transition_to(self, next: UploadStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Uploading)
                | (Self::Uploading, Self::Completed)
                | (Self::Uploading, Self::Error)
        )
    }

    /// Validate `self -> next`, returning the new status.
    pub fn transition(self, next: UploadStatus) -> Result<UploadStatus, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError { from: self, to: next })
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Uploading => "uploading",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
