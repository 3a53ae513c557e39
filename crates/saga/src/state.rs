//! Saga state machine.

use serde::{Deserialize, Serialize};

/// Progress of one order creation saga.
///
/// A request rejected by shape validation never leaves `NotStarted`. Any
/// failed step passes through `Compensating`, even with nothing to release.
///
/// ```text
/// NotStarted ──► Running ──┬──► Completed
///                          └──► Compensating ──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SagaState {
    #[default]
    NotStarted,

    /// Steps from `CreationStep::ALL` are executing.
    Running,

    /// Reservations taken so far are being released, most recent first.
    Compensating,

    /// The order is persisted and every line reserved.
    Completed,

    /// The request failed; a persisted order may be flagged for reconciliation.
    Failed,
}

impl SagaState {
    /// Only a running saga has reservations to unwind.
    pub fn can_compensate(&self) -> bool {
        matches!(self, SagaState::Running)
    }

    /// Label used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaState::NotStarted => "not_started",
            SagaState::Running => "running",
            SagaState::Compensating => "compensating",
            SagaState::Completed => "completed",
            SagaState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for SagaState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [SagaState; 5] = [
        SagaState::NotStarted,
        SagaState::Running,
        SagaState::Compensating,
        SagaState::Completed,
        SagaState::Failed,
    ];

    #[test]
    fn test_default_state_is_not_started() {
        assert_eq!(SagaState::default(), SagaState::NotStarted);
    }

    #[test]
    fn test_only_running_saga_compensates() {
        let compensating: Vec<_> = ALL.into_iter().filter(SagaState::can_compensate).collect();
        assert_eq!(compensating, vec![SagaState::Running]);
    }

    #[test]
    fn test_label_matches_serialized_form() {
        for state in ALL {
            let json = serde_json::to_string(&state).unwrap();
            assert_eq!(json, format!("\"{state}\""));
        }
        assert_eq!(SagaState::NotStarted.to_string(), "not_started");
    }
}
