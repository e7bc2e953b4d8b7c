//! Adapter seam for the hosted payment page.
//!
//! The hosted SDK reports back through success/error/dismiss callbacks;
//! implementations fold those into a single async result so the state
//! machine never touches callback state.

use std::future::Future;

use thiserror::Error;

use crate::model::PaymentRequest;

/// What the hosted payment page reported back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// The gateway confirmed the payment and redirected to the return URL.
    Completed,
    /// The customer closed the payment page without paying.
    Dismissed,
}

/// Failure reported by the payment provider. Retryable: the order record
/// stays in pending payment.
#[derive(Debug, Clone, Error)]
#[error("payment gateway error: {message}")]
pub struct GatewayError {
    pub message: String,
}

pub trait PaymentGateway {
    /// Present `request` to the customer and resolve once the gateway
    /// reports success, dismissal, or an error.
    fn start_payment(
        &self,
        request: &PaymentRequest,
    ) -> impl Future<Output = Result<PaymentOutcome, GatewayError>> + Send;
}
