//! Save status surfaced to whatever renders an edited entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of a surfaced save failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveFailureKind {
    /// Transient transport failure; local edits are kept.
    Network,
    /// The remote store rejected the payload.
    Validation,
    /// The remote store no longer knows the entity.
    NotFound,
}

/// A failed save as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveFailure {
    pub kind: SaveFailureKind,
    pub message: String,
}

impl SaveFailure {
    pub fn new(kind: SaveFailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Whether retrying the same payload later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self.kind, SaveFailureKind::Network)
    }
}

impl fmt::Display for SaveFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Lifecycle of the most recent flush.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum UpdateStatus {
    /// Nothing has been saved yet in this editing session.
    #[default]
    Idle,
    /// An update request is in flight.
    Saving,
    /// The last update completed.
    Saved { at: DateTime<Utc> },
    /// The last update failed; local edits were kept.
    Failed { failure: SaveFailure, at: DateTime<Utc> },
}

impl UpdateStatus {
    pub fn saved_now() -> Self {
        Self::Saved { at: Utc::now() }
    }

    pub fn failed_now(failure: SaveFailure) -> Self {
        Self::Failed { failure, at: Utc::now() }
    }

    pub fn is_saving(&self) -> bool {
        matches!(self, Self::Saving)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Completion time of the last successful save.
    pub fn saved_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Saved { at } => Some(*at),
            _ => None,
        }
    }

    /// Footer text for the editing view.
    pub fn indicator(&self) -> &'static str {
        match self {
            Self::Idle => "",
            Self::Saving => "Saving...",
            Self::Saved { .. } => "Saved",
            Self::Failed { .. } => "Save failed",
        }
    }
}
