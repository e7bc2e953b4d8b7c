//! Payment-request signing and notification verification.
//!
//! The hosted gateway verifies checkout requests with a nested-MD5 signature
//! and signs its server-to-server notifications the same way. The hex/case
//! convention must match the gateway byte for byte.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use md5::{Digest, Md5};

use crate::Amount;
use crate::config::PaymentConfig;
use crate::model::{CURRENCY, OrderId};

/// Merchant id standing in when none is configured.
pub const SIMULATION_MERCHANT_ID: &str = "TEST";

/// Placeholder hash returned in simulation mode.
const SIMULATED_HASH: &str = "SIMULATED";

fn md5_upper(input: &str) -> String {
    hex::encode(Md5::digest(input.as_bytes())).to_ascii_uppercase()
}

/// Signing mode, decided once from configuration at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignerMode {
    /// No real merchant configured: skip the external redirect and let the
    /// workflow synthesize a success.
    Simulation,
    Production,
}

/// A signed payment-request fragment: the hash plus the identity it binds.
#[derive(Debug, Clone)]
pub struct Signature {
    pub hash: String,
    pub merchant_id: String,
    pub mode: SignerMode,
}

/// Signer construction failure. Operator-facing, never shown to customers.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("merchant id '{0}' is configured but the merchant secret is missing")]
    MissingMerchantSecret(String),
}

#[derive(Debug)]
enum Inner {
    Simulation,
    Production {
        merchant_id: String,
        // upper(hex(md5(secret))), precomputed once
        hashed_secret: String,
    },
}

/// Computes the gateway signature for outgoing payment requests and checks
/// the signature on incoming payment notifications.
#[derive(Debug)]
pub struct PaymentSigner {
    inner: Inner,
}

impl PaymentSigner {
    /// Select the mode from explicit configuration. A missing or `TEST`
    /// merchant id selects simulation; a real merchant id without a secret
    /// fails closed here rather than at the first payment.
    pub fn from_config(config: &PaymentConfig) -> Result<Self, ConfigError> {
        let merchant_id = match config.merchant_id.as_deref() {
            None | Some("") | Some(SIMULATION_MERCHANT_ID) => {
                return Ok(Self { inner: Inner::Simulation });
            }
            Some(id) => id.to_string(),
        };
        match config.merchant_secret.as_deref() {
            Some(secret) if !secret.is_empty() => Ok(Self {
                inner: Inner::Production {
                    merchant_id,
                    hashed_secret: md5_upper(secret),
                },
            }),
            _ => Err(ConfigError::MissingMerchantSecret(merchant_id)),
        }
    }

    pub fn mode(&self) -> SignerMode {
        match self.inner {
            Inner::Simulation => SignerMode::Simulation,
            Inner::Production { .. } => SignerMode::Production,
        }
    }

    pub fn merchant_id(&self) -> &str {
        match &self.inner {
            Inner::Simulation => SIMULATION_MERCHANT_ID,
            Inner::Production { merchant_id, .. } => merchant_id,
        }
    }

    /// Sign a payment request. Deterministic: identical inputs always yield
    /// an identical hash.
    ///
    /// Production form: `upper(hex(md5(merchant_id + order_id + amount_2dp +
    /// currency + upper(hex(md5(secret))))))`.
    pub fn sign(&self, order_id: &str, amount: Amount) -> Signature {
        match &self.inner {
            Inner::Simulation => Signature {
                hash: SIMULATED_HASH.to_string(),
                merchant_id: SIMULATION_MERCHANT_ID.to_string(),
                mode: SignerMode::Simulation,
            },
            Inner::Production { merchant_id, hashed_secret } => {
                let message = format!("{merchant_id}{order_id}{amount}{CURRENCY}{hashed_secret}");
                Signature {
                    hash: md5_upper(&message),
                    merchant_id: merchant_id.clone(),
                    mode: SignerMode::Production,
                }
            }
        }
    }

    /// Verify the `md5sig` of a gateway notification.
    ///
    /// Amount and currency are hashed exactly as received; re-formatting them
    /// would break the signature. Refused entirely in simulation mode.
    pub fn verify_notification(&self, n: &PaymentNotification) -> Result<(), NotificationError> {
        let Inner::Production { merchant_id, hashed_secret } = &self.inner else {
            return Err(NotificationError::SimulationMode);
        };
        if n.merchant_id != *merchant_id {
            return Err(NotificationError::MerchantMismatch {
                received: n.merchant_id.clone(),
                configured: merchant_id.clone(),
            });
        }
        let message = format!(
            "{merchant_id}{}{}{}{}{hashed_secret}",
            n.order_id, n.amount, n.currency, n.status_code
        );
        if !md5_upper(&message).eq_ignore_ascii_case(&n.md5sig) {
            return Err(NotificationError::BadSignature(n.order_id.clone()));
        }
        Ok(())
    }
}

/// A server-to-server payment notification from the gateway.
///
/// Drives `OrderStatus::PendingPayment -> Paid` once verified with a
/// "received" status.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentNotification {
    pub merchant_id: String,
    pub order_id: OrderId,
    #[serde(rename = "payhere_amount")]
    pub amount: String,
    #[serde(rename = "payhere_currency")]
    pub currency: String,
    pub status_code: i8,
    pub md5sig: String,
}

impl PaymentNotification {
    pub fn status(&self) -> Option<NotificationStatus> {
        NotificationStatus::from_code(self.status_code)
    }
}

/// Payment result codes carried by a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationStatus {
    Received,
    Pending,
    Canceled,
    Failed,
    Chargedback,
}

impl NotificationStatus {
    pub fn from_code(code: i8) -> Option<Self> {
        match code {
            2 => Some(NotificationStatus::Received),
            0 => Some(NotificationStatus::Pending),
            -1 => Some(NotificationStatus::Canceled),
            -2 => Some(NotificationStatus::Failed),
            -3 => Some(NotificationStatus::Chargedback),
            _ => None,
        }
    }
}

/// Notification rejection. The handler must not advance the order status.
#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("notifications cannot be verified in simulation mode")]
    SimulationMode,

    #[error("notification merchant id '{received}' does not match configured '{configured}'")]
    MerchantMismatch { received: String, configured: String },

    #[error("notification signature mismatch for order {0}")]
    BadSignature(OrderId),
}
