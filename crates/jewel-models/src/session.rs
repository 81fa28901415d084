//! Upload session status.

use serde::{Deserialize, Serialize};

/// Lifecycle of one upload session.
///
/// `Idle -> Uploading -> (Succeeded | Failed)`. The terminal states go back to
/// `Idle` only through a new upload or a delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// No request outstanding and nothing to show
    #[default]
    Idle,
    /// Request/retry sequence in progress
    Uploading,
    /// Result available
    Succeeded,
    /// Error message available
    Failed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Uploading => "uploading",
            SessionStatus::Succeeded => "succeeded",
            SessionStatus::Failed => "failed",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Succeeded | SessionStatus::Failed)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!SessionStatus::Idle.is_terminal());
        assert!(!SessionStatus::Uploading.is_terminal());
        assert!(SessionStatus::Succeeded.is_terminal());
        assert!(SessionStatus::Failed.is_terminal());
    }

    #[test]
    fn test_serialization() {
        assert_eq!(serde_json::to_string(&SessionStatus::Uploading).unwrap(), "\"uploading\"");
    }
}
