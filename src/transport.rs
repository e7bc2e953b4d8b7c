//! HTTP submission transport for validated orders.
//!
//! A multipart POST carrying the form fields and the reference photo, with
//! upload progress reported over a watch channel as the body streams out.
//! Dropping the in-flight future aborts the request; the workflow's
//! generation counter discards anything that still arrives late.

use std::future::Future;

use bytes::Bytes;
use futures::stream;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::watch;
use url::Url;

use crate::config::TransportConfig;
use crate::model::{OrderId, ValidatedDraft};
use crate::validate::FieldErrors;

/// Terminal result of a successful submission: the endpoint persisted an
/// order record and returned its id.
#[derive(Debug, Clone)]
pub struct SubmitSuccess {
    pub order_id: OrderId,
    pub message: String,
}

/// Submission failure, separated by how the user recovers.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// 4xx with structured field errors: the user edits the offending
    /// fields and retries. Nothing was persisted.
    #[error("submission rejected: {message}")]
    Rejected { errors: FieldErrors, message: String },

    /// 5xx from the endpoint: retry later, message surfaced as a form-level
    /// error.
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Connection, DNS, or timeout failure before a response arrived.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// 2xx response whose body did not carry an order id.
    #[error("malformed response from submission endpoint: {0}")]
    MalformedResponse(String),
}

impl SubmitError {
    /// Message shown to the customer; internal detail stays in the logs.
    pub fn user_message(&self) -> String {
        match self {
            SubmitError::Rejected { message, .. } | SubmitError::Server { message, .. } => {
                message.clone()
            }
            SubmitError::Network(_) => "Network error. Please check your connection.".to_string(),
            SubmitError::MalformedResponse(_) => "An unexpected error occurred".to_string(),
        }
    }
}

/// The submission operation the workflow depends on. The content-store
/// repository sits behind the endpoint; from here the call is atomic: either
/// an order id comes back or nothing was persisted. Every call creates a new
/// record; there is no implicit deduplication.
pub trait SubmitOrder {
    fn submit(
        &self,
        order: &ValidatedDraft,
        progress: &watch::Sender<u8>,
    ) -> impl Future<Output = Result<SubmitSuccess, SubmitError>> + Send;
}

/// JSON body returned by the submission endpoint, success or failure.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    order_id: Option<OrderId>,
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Option<FieldErrors>,
}

/// `reqwest`-backed [`SubmitOrder`] implementation.
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpTransport {
    /// Build a transport with the configured endpoint and request timeout.
    pub fn new(config: &TransportConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, endpoint: config.endpoint.clone() })
    }
}

impl SubmitOrder for HttpTransport {
    async fn submit(
        &self,
        order: &ValidatedDraft,
        progress: &watch::Sender<u8>,
    ) -> Result<SubmitSuccess, SubmitError> {
        let _ = progress.send(0);

        let (body, length) = progress_body(order.photo.bytes.clone(), progress.clone());
        let photo = Part::stream_with_length(body, length)
            .file_name(order.photo.file_name.clone())
            .mime_str(&order.photo.content_type)?;
        let form = Form::new()
            .text("name", order.name.clone())
            .text("email", order.email.clone())
            .text("size", order.size.to_string())
            .text("details", order.details.clone())
            .part("photo", photo);

        let response = self.client.post(self.endpoint.clone()).multipart(form).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            let parsed: SubmitResponse = serde_json::from_str(&body)
                .map_err(|e| SubmitError::MalformedResponse(e.to_string()))?;
            match parsed.order_id {
                Some(order_id) if parsed.success => {
                    let _ = progress.send(100);
                    Ok(SubmitSuccess { order_id, message: parsed.message })
                }
                _ => Err(SubmitError::MalformedResponse(
                    "success response without an order id".to_string(),
                )),
            }
        } else {
            let parsed = serde_json::from_str::<SubmitResponse>(&body).ok();
            let message = parsed
                .as_ref()
                .filter(|p| !p.message.is_empty())
                .map(|p| p.message.clone())
                .unwrap_or_else(|| "An unexpected error occurred".to_string());
            if status.is_client_error() {
                let errors = parsed.and_then(|p| p.errors).unwrap_or_default();
                Err(SubmitError::Rejected { errors, message })
            } else {
                Err(SubmitError::Server { status: status.as_u16(), message })
            }
        }
    }
}

const CHUNK_SIZE: usize = 64 * 1024;

/// Split the photo into a streamed body that reports cumulative progress as
/// chunks are pulled onto the wire. The photo dominates the payload, so the
/// percentage is computed over its bytes; values only ever increase.
fn progress_body(bytes: Vec<u8>, progress: watch::Sender<u8>) -> (reqwest::Body, u64) {
    let total = bytes.len();
    let chunks: Vec<Bytes> = bytes.chunks(CHUNK_SIZE).map(Bytes::copy_from_slice).collect();

    let mut sent = 0usize;
    let stream = stream::iter(chunks.into_iter().map(move |chunk| {
        sent += chunk.len();
        // receivers may be gone; progress is best effort
        let _ = progress.send((sent * 100 / total.max(1)) as u8);
        Ok::<_, std::convert::Infallible>(chunk)
    }));

    (reqwest::Body::wrap_stream(stream), total as u64)
}
