//! Order workflow state machine.
//!
//! Sequences step collection, validation, upload, persistence, and the
//! payment handoff. Transitions are driven by discrete user actions and I/O
//! completion events; the async work happens outside the machine and reports
//! back carrying the generation captured when the submission started, so
//! events from a cancelled or superseded submission can never mutate state.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::config::PaymentConfig;
use crate::gateway::{GatewayError, PaymentGateway, PaymentOutcome};
use crate::model::{CURRENCY, OrderDraft, OrderId, PaymentRequest, ValidatedDraft};
use crate::signer::{ConfigError, PaymentSigner, Signature, SignerMode};
use crate::transport::{SubmitError, SubmitOrder};
use crate::validate::{self, FieldErrors};

mod error;
mod state;

pub use error::WorkflowError;
pub use state::{Step, WorkflowState};

/// Synthetic payment delay applied in simulation mode.
pub const SIMULATED_PAYMENT_DELAY: Duration = Duration::from_secs(2);

/// Identifies one submission attempt. Completion events must present the
/// generation they belong to; stale ones are discarded.
pub type Generation = u64;

/// What the driver must do after a successful upload.
#[derive(Debug)]
pub enum PaymentInstruction {
    /// No gateway configured: report success after the fixed delay, no user
    /// action required.
    Simulate { delay: Duration },
    /// Hand the signed request to the hosted payment page.
    Redirect(Box<PaymentRequest>),
}

/// Result of driving one submission attempt to its resting state.
#[derive(Debug)]
pub enum SubmissionOutcome {
    /// Simulation mode completed with a synthetic success.
    Succeeded { order_id: OrderId },
    /// Production mode: the order is persisted and awaiting the hosted
    /// payment page; hand this request to the gateway.
    AwaitingRedirect(Box<PaymentRequest>),
    /// Upload or validation failed; see the workflow's errors.
    Failed,
    Cancelled,
}

/// The order workflow driver. Owns the draft exclusively; at most one
/// submission is in flight at a time.
#[derive(Debug)]
pub struct Workflow {
    state: WorkflowState,
    draft: OrderDraft,
    /// Errors for the active step only.
    field_errors: FieldErrors,
    form_error: Option<String>,
    generation: Generation,
    /// Snapshot taken at submission start; kept until success or cancel so a
    /// dismissed payment can be retried.
    pending: Option<ValidatedDraft>,
    signer: PaymentSigner,
    payment: PaymentConfig,
}

/// Public API
impl Workflow {
    /// Start an empty wizard. Fails closed if the payment configuration
    /// names a merchant but no secret.
    pub fn new(payment: PaymentConfig) -> Result<Self, ConfigError> {
        let signer = PaymentSigner::from_config(&payment)?;
        Ok(Self {
            state: WorkflowState::Collecting { step: Step::FIRST },
            draft: OrderDraft::default(),
            field_errors: FieldErrors::default(),
            form_error: None,
            generation: 0,
            pending: None,
            signer,
            payment,
        })
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn draft(&self) -> &OrderDraft {
        &self.draft
    }

    /// Mutable access to the form fields. Edits never affect a submission
    /// already in flight: the transport works from the snapshot taken when
    /// the submission started.
    pub fn draft_mut(&mut self) -> &mut OrderDraft {
        &mut self.draft
    }

    /// Validation errors for the active step.
    pub fn field_errors(&self) -> &FieldErrors {
        &self.field_errors
    }

    /// Form-level failure message, if the last submission failed.
    pub fn form_error(&self) -> Option<&str> {
        self.form_error.as_deref()
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Validate the active step and advance to the next one. On failure the
    /// workflow stays put and surfaces the field errors. The review step
    /// advances through [`Workflow::begin_submission`], not `next`.
    pub fn next(&mut self) -> Result<(), WorkflowError> {
        let Some(step) = self.state.collecting_step() else {
            return Err(self.invalid("next"));
        };
        let Some(following) = step.next() else {
            return Err(self.invalid("next"));
        };
        match validate::validate_step(&self.draft, step) {
            Ok(()) => {
                self.field_errors = FieldErrors::default();
                info!(from = ?step, to = ?following, "step advanced");
                self.state = WorkflowState::Collecting { step: following };
                Ok(())
            }
            Err(errors) => {
                warn!(step = ?step, errors = %errors, "step validation failed");
                self.field_errors = errors.clone();
                Err(WorkflowError::Validation(errors))
            }
        }
    }

    /// Return to the previous step without re-validating. Entered values are
    /// kept; only the errors of the step being left are cleared.
    pub fn back(&mut self) -> Result<(), WorkflowError> {
        let Some(step) = self.state.collecting_step() else {
            return Err(self.invalid("back"));
        };
        let Some(previous) = step.prev() else {
            return Err(self.invalid("back"));
        };
        self.field_errors = FieldErrors::default();
        self.state = WorkflowState::Collecting { step: previous };
        Ok(())
    }

    /// Cancel the workflow. Allowed while collecting, during the upload, or
    /// while awaiting payment; the generation bump suppresses any in-flight
    /// completion events. A record already created stays in pending payment
    /// for operator reconciliation.
    pub fn cancel(&mut self) -> Result<(), WorkflowError> {
        match &self.state {
            WorkflowState::Collecting { .. } | WorkflowState::Submitting | WorkflowState::Failed => {}
            WorkflowState::AwaitingPayment { order_id } => {
                info!(order_id = %order_id, "cancelled; order record remains pending payment");
            }
            WorkflowState::Succeeded { .. } | WorkflowState::Cancelled => {
                return Err(self.invalid("cancel"));
            }
        }
        self.generation += 1;
        self.draft = OrderDraft::default();
        self.pending = None;
        self.state = WorkflowState::Cancelled;
        Ok(())
    }

    /// Confirm the review step: validate the whole draft and move to
    /// `Submitting`. Returns the generation the completion events must carry
    /// plus the validated snapshot for the transport. Also accepted from
    /// `Failed` (resubmission); any other state is rejected, which is what
    /// keeps a second click from creating a duplicate order.
    pub fn begin_submission(&mut self) -> Result<(Generation, ValidatedDraft), WorkflowError> {
        match self.state {
            WorkflowState::Collecting { step: Step::Review } | WorkflowState::Failed => {}
            _ => return Err(self.invalid("submit")),
        }
        match validate::validate_all(&self.draft) {
            Ok(order) => {
                self.generation += 1;
                self.form_error = None;
                self.field_errors = FieldErrors::default();
                self.pending = Some(order.clone());
                self.state = WorkflowState::Submitting;
                info!(
                    generation = self.generation,
                    size = %order.size,
                    amount = %order.amount(),
                    "submission started"
                );
                Ok((self.generation, order))
            }
            Err((step, errors)) => {
                warn!(step = ?step, errors = %errors, "submission blocked by validation");
                self.field_errors = errors.clone();
                self.state = WorkflowState::Collecting { step };
                Err(WorkflowError::Validation(errors))
            }
        }
    }

    /// Apply a successful upload: capture the order id, sign the payment
    /// request, and tell the driver what happens next. Stale or out-of-place
    /// events are discarded.
    pub fn upload_succeeded(
        &mut self,
        generation: Generation,
        order_id: OrderId,
    ) -> Option<PaymentInstruction> {
        if self.stale(generation, "upload_succeeded") {
            return None;
        }
        if self.state != WorkflowState::Submitting {
            warn!(state = ?self.state, "upload result ignored outside Submitting");
            return None;
        }
        let Some(pending) = self.pending.as_ref() else {
            error!("no pending draft for an in-flight submission");
            self.form_error = Some("An unexpected error occurred".to_string());
            self.state = WorkflowState::Failed;
            return None;
        };

        let signature = self.signer.sign(&order_id, pending.amount());
        info!(
            order_id = %order_id,
            mode = ?signature.mode,
            amount = %pending.amount(),
            "order persisted, payment initiated"
        );
        let instruction = match signature.mode {
            SignerMode::Simulation => PaymentInstruction::Simulate { delay: SIMULATED_PAYMENT_DELAY },
            SignerMode::Production => PaymentInstruction::Redirect(Box::new(build_payment_request(
                &self.payment,
                pending,
                order_id.clone(),
                signature,
            ))),
        };
        self.state = WorkflowState::AwaitingPayment { order_id };
        Some(instruction)
    }

    /// Apply a failed upload. Field-level rejections return the user to the
    /// offending step; everything else fails the submission with a
    /// form-level message and permits a retry.
    pub fn upload_failed(&mut self, generation: Generation, error: &SubmitError) {
        if self.stale(generation, "upload_failed") {
            return;
        }
        if self.state != WorkflowState::Submitting {
            warn!(state = ?self.state, "upload error ignored outside Submitting");
            return;
        }
        self.pending = None;
        match error {
            SubmitError::Rejected { errors, message } if !errors.is_empty() => {
                let step = first_offending_step(errors);
                warn!(step = ?step, errors = %errors, "submission rejected by endpoint");
                self.field_errors = errors.clone();
                self.form_error = Some(message.clone());
                self.state = WorkflowState::Collecting { step };
            }
            other => {
                error!(error = %other, "submission failed");
                self.form_error = Some(other.user_message());
                self.state = WorkflowState::Failed;
            }
        }
    }

    /// Payment confirmation, from the gateway callback or the simulated
    /// timer. Stale events (after cancellation or resubmission) are
    /// discarded; the draft is dropped on success.
    pub fn payment_completed(&mut self, generation: Generation) {
        if self.stale(generation, "payment_completed") {
            return;
        }
        let WorkflowState::AwaitingPayment { order_id } = &self.state else {
            warn!(state = ?self.state, "payment completion ignored outside AwaitingPayment");
            return;
        };
        let order_id = order_id.clone();
        info!(order_id = %order_id, "payment completed");
        self.draft = OrderDraft::default();
        self.pending = None;
        self.field_errors = FieldErrors::default();
        self.form_error = None;
        self.state = WorkflowState::Succeeded { order_id };
    }

    /// Gateway-reported failure. The order record stays in pending payment;
    /// the user may retry the submission.
    pub fn payment_failed(&mut self, generation: Generation, error: &GatewayError) {
        if self.stale(generation, "payment_failed") {
            return;
        }
        if !matches!(self.state, WorkflowState::AwaitingPayment { .. }) {
            warn!(state = ?self.state, "payment failure ignored outside AwaitingPayment");
            return;
        }
        error!(error = %error, "payment gateway reported failure");
        self.form_error = Some("Payment failed. Please try again.".to_string());
        self.state = WorkflowState::Failed;
    }

    /// The customer closed the payment page without paying. Stays in
    /// `AwaitingPayment`; [`Workflow::payment_request`] rebuilds the request
    /// so the page can be re-presented.
    pub fn payment_dismissed(&mut self, generation: Generation) {
        if self.stale(generation, "payment_dismissed") {
            return;
        }
        if !matches!(self.state, WorkflowState::AwaitingPayment { .. }) {
            warn!(state = ?self.state, "payment dismissal ignored outside AwaitingPayment");
            return;
        }
        info!("payment page dismissed");
    }

    /// Rebuild the signed request for the order currently awaiting payment.
    /// Signing is deterministic, so this equals the request issued at upload
    /// time. `None` in simulation mode or outside `AwaitingPayment`.
    pub fn payment_request(&self) -> Option<PaymentRequest> {
        let WorkflowState::AwaitingPayment { order_id } = &self.state else {
            return None;
        };
        let pending = self.pending.as_ref()?;
        let signature = self.signer.sign(order_id, pending.amount());
        match signature.mode {
            SignerMode::Simulation => None,
            SignerMode::Production => Some(build_payment_request(
                &self.payment,
                pending,
                order_id.clone(),
                signature,
            )),
        }
    }

    /// Run one submission attempt end to end: upload the draft, then either
    /// simulate the payment or stop at the redirect handoff. Flipping
    /// `cancel` to `true` aborts the in-flight upload (the request future is
    /// dropped) or the simulated delay; anything arriving later is discarded
    /// by generation.
    pub async fn run_submission<T: SubmitOrder>(
        &mut self,
        transport: &T,
        progress: &watch::Sender<u8>,
        cancel: &mut watch::Receiver<bool>,
    ) -> Result<SubmissionOutcome, WorkflowError> {
        let (generation, order) = self.begin_submission()?;

        let result = tokio::select! {
            result = transport.submit(&order, progress) => result,
            _ = cancelled(cancel) => {
                let _ = self.cancel();
                return Ok(SubmissionOutcome::Cancelled);
            }
        };

        let instruction = match result {
            Ok(success) => self.upload_succeeded(generation, success.order_id),
            Err(error) => {
                self.upload_failed(generation, &error);
                return Ok(SubmissionOutcome::Failed);
            }
        };

        match instruction {
            Some(PaymentInstruction::Simulate { delay }) => {
                info!(delay = ?delay, "simulation mode: synthetic success after delay");
                tokio::select! {
                    _ = tokio::time::sleep(delay) => self.payment_completed(generation),
                    _ = cancelled(cancel) => {
                        let _ = self.cancel();
                    }
                }
                match &self.state {
                    WorkflowState::Succeeded { order_id } => {
                        Ok(SubmissionOutcome::Succeeded { order_id: order_id.clone() })
                    }
                    _ => Ok(SubmissionOutcome::Cancelled),
                }
            }
            Some(PaymentInstruction::Redirect(request)) => {
                Ok(SubmissionOutcome::AwaitingRedirect(request))
            }
            None => Ok(SubmissionOutcome::Failed),
        }
    }

    /// Drive the hosted payment page for the order awaiting payment and
    /// apply whatever the gateway reports.
    pub async fn complete_payment<G: PaymentGateway>(
        &mut self,
        gateway: &G,
        request: &PaymentRequest,
    ) {
        let generation = self.generation;
        match gateway.start_payment(request).await {
            Ok(PaymentOutcome::Completed) => self.payment_completed(generation),
            Ok(PaymentOutcome::Dismissed) => self.payment_dismissed(generation),
            Err(error) => self.payment_failed(generation, &error),
        }
    }
}

/// Private API
impl Workflow {
    fn invalid(&self, action: &'static str) -> WorkflowError {
        warn!(action, state = ?self.state, "action rejected");
        WorkflowError::InvalidAction { action, state: self.state.clone() }
    }

    fn stale(&self, generation: Generation, event: &'static str) -> bool {
        if generation == self.generation {
            false
        } else {
            warn!(
                event,
                generation,
                current = self.generation,
                "discarding stale completion event"
            );
            true
        }
    }
}

/// Map endpoint field errors back to the earliest wizard step that owns one
/// of the offending fields.
fn first_offending_step(errors: &FieldErrors) -> Step {
    errors
        .fields()
        .filter_map(|field| match field {
            "name" | "email" => Some(Step::Contact),
            "size" | "details" => Some(Step::SizeDetails),
            "photo" => Some(Step::Photo),
            _ => None,
        })
        .min()
        .unwrap_or(Step::Review)
}

fn build_payment_request(
    payment: &PaymentConfig,
    order: &ValidatedDraft,
    order_id: OrderId,
    signature: Signature,
) -> PaymentRequest {
    PaymentRequest {
        merchant_id: signature.merchant_id,
        order_id,
        items: order.size.items_label(),
        amount: order.amount(),
        currency: CURRENCY.to_string(),
        hash: signature.hash,
        return_url: payment.return_url.clone(),
        cancel_url: payment.cancel_url.clone(),
        notify_url: payment.notify_url.clone(),
        first_name: order.first_name().to_string(),
        last_name: order.last_name(),
        email: order.email.clone(),
    }
}

/// Resolves once the cancel flag flips to true; pending forever if the
/// handle is dropped without cancelling.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
