//! Conversion run state machine
//!
//! ```text
//! Pending -> Converting -> Completed | PartiallyCompleted | Failed
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// State of one conversion run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConversionState {
    Pending,
    Converting,
    Completed,
    PartiallyCompleted,
    Failed,
}

/// Illegal state change
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid conversion state change: {from} -> {to}")]
pub struct StateError {
    pub from: ConversionState,
    pub to: ConversionState,
}

impl ConversionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ConversionState::Completed | ConversionState::PartiallyCompleted | ConversionState::Failed
        )
    }

    /// Move to `next` if the change is legal
    pub fn transition(self, next: ConversionState) -> Result<ConversionState, StateError> {
        let legal = match self {
            ConversionState::Pending => next == ConversionState::Converting,
            ConversionState::Converting => next.is_terminal(),
            _ => false,
        };
        if legal {
            Ok(next)
        } else {
            Err(StateError {
                from: self,
                to: next,
            })
        }
    }

    /// Terminal state for a finished run
    ///
    /// `unconverted` counts selected features the run left unconverted:
    /// failures plus features deferred by a per-run cap. A run fails when
    /// nothing converted and either something is left unconverted or nothing
    /// was eligible. A run in which every selected feature had already been
    /// imported is complete.
    pub fn outcome(converted: usize, unconverted: usize, skipped: usize) -> ConversionState {
        match (converted, unconverted) {
            (0, 0) if skipped > 0 => ConversionState::Completed,
            (0, _) => ConversionState::Failed,
            (_, 0) => ConversionState::Completed,
            _ => ConversionState::PartiallyCompleted,
        }
    }
}

impl fmt::Display for ConversionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionState::Pending => write!(f, "pending"),
            ConversionState::Converting => write!(f, "converting"),
            ConversionState::Completed => write!(f, "completed"),
            ConversionState::PartiallyCompleted => write!(f, "partially-completed"),
            ConversionState::Failed => write!(f, "failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions() {
        let state = ConversionState::Pending;
        let state = state.transition(ConversionState::Converting).unwrap();
        assert_eq!(
            state.transition(ConversionState::Completed),
            Ok(ConversionState::Completed)
        );
        assert!(
            ConversionState::Pending
                .transition(ConversionState::Completed)
                .is_err()
        );
        assert!(
            ConversionState::Failed
                .transition(ConversionState::Converting)
                .is_err()
        );
    }

    #[test]
    fn test_outcome() {
        assert_eq!(ConversionState::outcome(3, 0, 0), ConversionState::Completed);
        assert_eq!(
            ConversionState::outcome(2, 1, 0),
            ConversionState::PartiallyCompleted
        );
        assert_eq!(ConversionState::outcome(0, 1, 0), ConversionState::Failed);
        assert_eq!(ConversionState::outcome(0, 0, 0), ConversionState::Failed);
        assert_eq!(ConversionState::outcome(0, 0, 4), ConversionState::Completed);
        // Features deferred by a per-run cap count as unconverted
        assert_eq!(
            ConversionState::outcome(2, 3, 1),
            ConversionState::PartiallyCompleted
        );
    }
}
