//! Scenario tests for the order workflow with a scripted transport.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::watch;
use url::Url;

use commission_flow::gateway::{GatewayError, PaymentGateway, PaymentOutcome};
use commission_flow::model::{DrawingSize, PaymentRequest, ReferenceImage, ValidatedDraft};
use commission_flow::transport::{SubmitError, SubmitOrder, SubmitSuccess};
use commission_flow::validate::FieldErrors;
use commission_flow::workflow::{Step, SubmissionOutcome, WorkflowState};
use commission_flow::{PaymentConfig, Workflow};

// test utils

/// Pops one scripted response per submit call.
struct StubTransport {
    responses: Mutex<VecDeque<Result<SubmitSuccess, SubmitError>>>,
}

impl StubTransport {
    fn success(order_id: &str) -> Self {
        Self::script([Ok(SubmitSuccess {
            order_id: order_id.to_string(),
            message: "Order submitted successfully!".to_string(),
        })])
    }

    fn script(responses: impl IntoIterator<Item = Result<SubmitSuccess, SubmitError>>) -> Self {
        Self { responses: Mutex::new(responses.into_iter().collect()) }
    }
}

impl SubmitOrder for StubTransport {
    async fn submit(
        &self,
        _order: &ValidatedDraft,
        progress: &watch::Sender<u8>,
    ) -> Result<SubmitSuccess, SubmitError> {
        let _ = progress.send(100);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .expect("no scripted response left")
    }
}

/// Never completes; stands in for an upload hanging on a dead network.
struct HangingTransport;

impl SubmitOrder for HangingTransport {
    async fn submit(
        &self,
        _order: &ValidatedDraft,
        _progress: &watch::Sender<u8>,
    ) -> Result<SubmitSuccess, SubmitError> {
        std::future::pending().await
    }
}

struct FakeGateway {
    result: Result<PaymentOutcome, GatewayError>,
}

impl PaymentGateway for FakeGateway {
    async fn start_payment(
        &self,
        _request: &PaymentRequest,
    ) -> Result<PaymentOutcome, GatewayError> {
        self.result.clone()
    }
}

fn simulation_workflow() -> Workflow {
    let config = PaymentConfig::with_site_origin(
        None,
        None,
        &Url::parse("http://localhost:3000").unwrap(),
    )
    .unwrap();
    Workflow::new(config).unwrap()
}

fn production_workflow() -> Workflow {
    let config = PaymentConfig::with_site_origin(
        Some("1221149".to_string()),
        Some("sandbox-secret".to_string()),
        &Url::parse("http://localhost:3000").unwrap(),
    )
    .unwrap();
    Workflow::new(config).unwrap()
}

fn to_review(workflow: &mut Workflow) {
    let draft = workflow.draft_mut();
    draft.name = "Jane Doe".to_string();
    draft.email = "jane@x.com".to_string();
    draft.size = Some(DrawingSize::A3);
    draft.reference_image = Some(ReferenceImage {
        file_name: "cat.jpg".to_string(),
        content_type: "image/jpeg".to_string(),
        bytes: vec![0u8; 2 * 1024 * 1024],
    });
    for _ in 0..3 {
        workflow.next().unwrap();
    }
}

fn channels() -> (watch::Sender<u8>, watch::Sender<bool>, watch::Receiver<bool>) {
    let (progress, progress_rx) = watch::channel(0);
    // Keep a progress receiver alive for the duration of the test: a watch
    // sender with no receivers silently drops the values it is sent, so the
    // progress updates pushed by the transport would otherwise be lost.
    std::mem::forget(progress_rx);
    let (cancel_tx, cancel_rx) = watch::channel(false);
    (progress, cancel_tx, cancel_rx)
}

// Scenarios

#[tokio::test(start_paused = true)]
async fn simulation_submission_succeeds_within_the_fixed_delay() {
    let mut workflow = simulation_workflow();
    to_review(&mut workflow);
    let (progress, _cancel_tx, mut cancel_rx) = channels();

    let outcome = workflow
        .run_submission(&StubTransport::success("ord_1"), &progress, &mut cancel_rx)
        .await
        .unwrap();

    let SubmissionOutcome::Succeeded { order_id } = outcome else {
        panic!("expected a synthetic success, got {outcome:?}");
    };
    assert_eq!(order_id, "ord_1");
    assert_eq!(
        *workflow.state(),
        WorkflowState::Succeeded { order_id: "ord_1".to_string() }
    );
    assert_eq!(*progress.borrow(), 100);
}

#[tokio::test(start_paused = true)]
async fn server_error_fails_and_the_retry_goes_through() {
    let mut workflow = simulation_workflow();
    to_review(&mut workflow);
    let (progress, _cancel_tx, mut cancel_rx) = channels();

    let transport = StubTransport::script([
        Err(SubmitError::Server {
            status: 500,
            message: "Failed to submit order. Please try again later.".to_string(),
        }),
        Ok(SubmitSuccess {
            order_id: "ord_2".to_string(),
            message: "Order submitted successfully!".to_string(),
        }),
    ]);

    let first = workflow
        .run_submission(&transport, &progress, &mut cancel_rx)
        .await
        .unwrap();
    assert!(matches!(first, SubmissionOutcome::Failed));
    assert_eq!(*workflow.state(), WorkflowState::Failed);
    assert_eq!(
        workflow.form_error(),
        Some("Failed to submit order. Please try again later.")
    );

    let second = workflow
        .run_submission(&transport, &progress, &mut cancel_rx)
        .await
        .unwrap();
    assert!(matches!(second, SubmissionOutcome::Succeeded { .. }));
}

#[tokio::test(start_paused = true)]
async fn endpoint_rejection_returns_to_the_offending_step() {
    let mut workflow = simulation_workflow();
    to_review(&mut workflow);
    let (progress, _cancel_tx, mut cancel_rx) = channels();

    let mut errors = FieldErrors::default();
    errors.push("photo", "File size must be less than 10MB");
    let transport = StubTransport::script([Err(SubmitError::Rejected {
        errors,
        message: "Please fix the errors below.".to_string(),
    })]);

    let outcome = workflow
        .run_submission(&transport, &progress, &mut cancel_rx)
        .await
        .unwrap();
    assert!(matches!(outcome, SubmissionOutcome::Failed));
    assert_eq!(workflow.state().collecting_step(), Some(Step::Photo));
    assert_eq!(
        workflow.field_errors().messages("photo"),
        ["File size must be less than 10MB"]
    );
}

#[tokio::test(start_paused = true)]
async fn cancelling_during_the_simulated_delay_suppresses_the_success() {
    let mut workflow = simulation_workflow();
    to_review(&mut workflow);
    let (progress, cancel_tx, mut cancel_rx) = channels();

    // flips cancel midway through the 2s synthetic payment delay
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        let _ = cancel_tx.send(true);
    });

    let outcome = workflow
        .run_submission(&StubTransport::success("ord_1"), &progress, &mut cancel_rx)
        .await
        .unwrap();

    assert!(matches!(outcome, SubmissionOutcome::Cancelled));
    assert_eq!(*workflow.state(), WorkflowState::Cancelled);

    // even if the timer somehow fired afterwards, its generation is stale
    let generation = workflow.generation();
    workflow.payment_completed(generation.wrapping_sub(1));
    assert_eq!(*workflow.state(), WorkflowState::Cancelled);
}

#[tokio::test(start_paused = true)]
async fn cancelling_aborts_a_hung_upload() {
    let mut workflow = simulation_workflow();
    to_review(&mut workflow);
    let (progress, cancel_tx, mut cancel_rx) = channels();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        let _ = cancel_tx.send(true);
    });

    let outcome = workflow
        .run_submission(&HangingTransport, &progress, &mut cancel_rx)
        .await
        .unwrap();

    assert!(matches!(outcome, SubmissionOutcome::Cancelled));
    assert_eq!(*workflow.state(), WorkflowState::Cancelled);
}

#[tokio::test(start_paused = true)]
async fn production_submission_stops_at_the_redirect_handoff() {
    let mut workflow = production_workflow();
    to_review(&mut workflow);
    let (progress, _cancel_tx, mut cancel_rx) = channels();

    let outcome = workflow
        .run_submission(&StubTransport::success("ord_42"), &progress, &mut cancel_rx)
        .await
        .unwrap();

    let SubmissionOutcome::AwaitingRedirect(request) = outcome else {
        panic!("expected a redirect handoff, got {outcome:?}");
    };
    assert_eq!(request.hash, "66BE3EDC7B61FE8CEC7D2E95FCA5E7A3");
    assert_eq!(request.amount.to_string(), "8000.00");
    assert!(matches!(workflow.state(), WorkflowState::AwaitingPayment { .. }));

    // gateway confirms
    let gateway = FakeGateway { result: Ok(PaymentOutcome::Completed) };
    workflow.complete_payment(&gateway, &request).await;
    assert_eq!(
        *workflow.state(),
        WorkflowState::Succeeded { order_id: "ord_42".to_string() }
    );
}

#[tokio::test(start_paused = true)]
async fn dismissed_payment_can_be_represented() {
    let mut workflow = production_workflow();
    to_review(&mut workflow);
    let (progress, _cancel_tx, mut cancel_rx) = channels();

    let outcome = workflow
        .run_submission(&StubTransport::success("ord_42"), &progress, &mut cancel_rx)
        .await
        .unwrap();
    let SubmissionOutcome::AwaitingRedirect(request) = outcome else {
        panic!("expected a redirect handoff");
    };

    let gateway = FakeGateway { result: Ok(PaymentOutcome::Dismissed) };
    workflow.complete_payment(&gateway, &request).await;
    assert!(matches!(workflow.state(), WorkflowState::AwaitingPayment { .. }));

    // the rebuilt request carries the identical deterministic hash
    let retry = workflow.payment_request().unwrap();
    assert_eq!(retry.hash, request.hash);

    let gateway = FakeGateway { result: Ok(PaymentOutcome::Completed) };
    workflow.complete_payment(&gateway, &retry).await;
    assert!(matches!(workflow.state(), WorkflowState::Succeeded { .. }));
}

#[tokio::test(start_paused = true)]
async fn gateway_error_leaves_a_retryable_failure() {
    let mut workflow = production_workflow();
    to_review(&mut workflow);
    let (progress, _cancel_tx, mut cancel_rx) = channels();

    let outcome = workflow
        .run_submission(&StubTransport::success("ord_42"), &progress, &mut cancel_rx)
        .await
        .unwrap();
    let SubmissionOutcome::AwaitingRedirect(request) = outcome else {
        panic!("expected a redirect handoff");
    };

    let gateway = FakeGateway {
        result: Err(GatewayError { message: "card declined".to_string() }),
    };
    workflow.complete_payment(&gateway, &request).await;
    assert_eq!(*workflow.state(), WorkflowState::Failed);
    assert_eq!(workflow.form_error(), Some("Payment failed. Please try again."));
    assert!(workflow.begin_submission().is_ok());
}
