//! Error types for workflow transitions.

use thiserror::Error;

use super::state::WorkflowState;
use crate::validate::FieldErrors;

/// Action rejected by the workflow. The state is left unchanged except that
/// a validation failure records its field errors for display.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// The step's fields did not validate; the workflow stays put and
    /// surfaces the errors.
    #[error("validation failed: {0}")]
    Validation(FieldErrors),

    /// The action does not apply to the current state, e.g. `next` while a
    /// submission is in flight.
    #[error("{action} is not allowed in state {state:?}")]
    InvalidAction {
        action: &'static str,
        state: WorkflowState,
    },
}
