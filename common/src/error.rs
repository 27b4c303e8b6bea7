use thiserror::Error;

/// Failures surfaced to a control-surface caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControlError {
    /// A set-schedule request carried fewer than 48 values.
    #[error("IncompleteSchedule: expected 48 values, got {parsed}")]
    IncompleteSchedule { parsed: usize },
    /// Unknown, secret or missing resource.
    #[error("NotFound: {path}")]
    NotFound { path: String },
}
