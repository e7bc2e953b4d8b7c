//! Explicit configuration passed into constructors at startup.
//!
//! Core logic never reads the environment; the binary resolves flags and
//! environment variables into these structs once.

use std::time::Duration;

use url::Url;

/// Payment gateway credentials and the redirect endpoints baked into every
/// payment request.
#[derive(Debug, Clone)]
pub struct PaymentConfig {
    /// Merchant identifier; absent (or the `TEST` sentinel) selects
    /// simulation mode.
    pub merchant_id: Option<String>,
    /// Merchant secret; required whenever a real merchant id is configured.
    pub merchant_secret: Option<String>,
    pub return_url: Url,
    pub cancel_url: Url,
    pub notify_url: Url,
}

impl PaymentConfig {
    /// Derive the gateway callbacks from the public site origin.
    pub fn with_site_origin(
        merchant_id: Option<String>,
        merchant_secret: Option<String>,
        origin: &Url,
    ) -> Result<Self, url::ParseError> {
        Ok(Self {
            merchant_id,
            merchant_secret,
            return_url: origin.join("/order/success")?,
            cancel_url: origin.join("/order")?,
            notify_url: origin.join("/api/payhere/notify")?,
        })
    }
}

/// Submission endpoint settings for the upload transport.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub endpoint: Url,
    /// Request timeout. A hung upload fails the submission instead of
    /// leaving the workflow in `Submitting` forever.
    pub timeout: Duration,
}

impl TransportConfig {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(endpoint: Url) -> Self {
        Self { endpoint, timeout: Self::DEFAULT_TIMEOUT }
    }
}
