use serde::{Deserialize, Serialize};

use crate::model::OrderId;

/// Wizard steps, in collection order. Review confirms; it owns no fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Contact,
    SizeDetails,
    Photo,
    Review,
}

impl Step {
    pub const FIRST: Step = Step::Contact;

    /// The steps that collect fields, in the order they are validated.
    pub const COLLECTING: [Step; 3] = [Step::Contact, Step::SizeDetails, Step::Photo];

    pub fn next(self) -> Option<Step> {
        match self {
            Step::Contact => Some(Step::SizeDetails),
            Step::SizeDetails => Some(Step::Photo),
            Step::Photo => Some(Step::Review),
            Step::Review => None,
        }
    }

    pub fn prev(self) -> Option<Step> {
        match self {
            Step::Contact => None,
            Step::SizeDetails => Some(Step::Contact),
            Step::Photo => Some(Step::SizeDetails),
            Step::Review => Some(Step::Photo),
        }
    }
}

/// Current position of the order workflow.
///
/// Serializable so a driver can persist and restore wizard progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WorkflowState {
    /// Collecting form fields for `step`.
    Collecting { step: Step },
    /// Upload in flight; no further submit is accepted.
    Submitting,
    /// Order persisted; waiting on the payment gateway or the simulated timer.
    AwaitingPayment { order_id: OrderId },
    Succeeded { order_id: OrderId },
    /// Submission or payment failed; resubmission is permitted.
    Failed,
    Cancelled,
}

impl WorkflowState {
    /// Terminal states accept no further actions. `Failed` is not terminal:
    /// the user may retry.
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowState::Succeeded { .. } | WorkflowState::Cancelled)
    }

    pub fn collecting_step(&self) -> Option<Step> {
        match self {
            WorkflowState::Collecting { step } => Some(*step),
            _ => None,
        }
    }
}
