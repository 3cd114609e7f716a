use thiserror::Error;

use crate::domain::content::ContentStatus;
use crate::domain::transition::ActionKind;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("cannot {action} content that is {from}")]
    InvalidTransition {
        from: ContentStatus,
        action: ActionKind,
    },
    #[error("validation failed: {0}")]
    ValidationFailed(String),
    /// The scheduled entry no longer matches the record (rescheduled)
    #[error("scheduled publication was superseded")]
    Superseded,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} value '{value}'")]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

impl UnknownVariant {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}
