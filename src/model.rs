//! Core domain types for the commission order workflow.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::Amount;

/// Opaque order identifier assigned by the content store on creation.
pub type OrderId = String;

/// Currency charged by the payment gateway. Fixed; the price table, the
/// request hash, and the notification signature all assume it.
pub const CURRENCY: &str = "LKR";

/// Drawing sizes offered for a commissioned portrait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DrawingSize {
    A4,
    A3,
    A2,
}

impl DrawingSize {
    pub const ALL: [DrawingSize; 3] = [DrawingSize::A4, DrawingSize::A3, DrawingSize::A2];

    /// Fixed price table, kept consistent with any server-side validation.
    pub fn price(self) -> Amount {
        match self {
            DrawingSize::A4 => Amount::from_major(5000),
            DrawingSize::A3 => Amount::from_major(8000),
            DrawingSize::A2 => Amount::from_major(12000),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DrawingSize::A4 => "A4",
            DrawingSize::A3 => "A3",
            DrawingSize::A2 => "A2",
        }
    }

    /// Line-item label sent to the payment gateway.
    pub fn items_label(self) -> String {
        format!("Pencil Portrait - {}", self.as_str())
    }
}

impl fmt::Display for DrawingSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unrecognized drawing size '{0}'")]
pub struct ParseSizeError(String);

impl FromStr for DrawingSize {
    type Err = ParseSizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A4" => Ok(DrawingSize::A4),
            "A3" => Ok(DrawingSize::A3),
            "A2" => Ok(DrawingSize::A2),
            other => Err(ParseSizeError(other.to_string())),
        }
    }
}

/// The customer's reference photo: raw bytes plus the metadata the upload
/// endpoint validates against.
#[derive(Clone, Serialize, Deserialize)]
pub struct ReferenceImage {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

// Hand-written so a logged draft never dumps megabytes of image bytes.
impl fmt::Debug for ReferenceImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferenceImage")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// The client-held order form state, mutated step by step until submission.
///
/// Nothing here is persisted; the draft is discarded on success or cancel and
/// only ever leaves the client as a [`ValidatedDraft`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderDraft {
    pub name: String,
    pub email: String,
    pub size: Option<DrawingSize>,
    pub details: String,
    pub reference_image: Option<ReferenceImage>,
}

/// An order draft that passed validation for every collecting step.
///
/// Required fields are guaranteed present; the transport and signer never see
/// unvalidated input.
#[derive(Debug, Clone)]
pub struct ValidatedDraft {
    pub name: String,
    pub email: String,
    pub size: DrawingSize,
    pub details: String,
    pub photo: ReferenceImage,
}

impl ValidatedDraft {
    pub fn amount(&self) -> Amount {
        self.size.price()
    }

    /// First whitespace-separated token of the customer name.
    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or("")
    }

    /// Everything after the first token, or empty for single-word names.
    pub fn last_name(&self) -> String {
        self.name.split_whitespace().skip(1).collect::<Vec<_>>().join(" ")
    }
}

/// Lifecycle status of a persisted order record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    PendingPayment,
    Paid,
    Accepted,
    Completed,
}

impl OrderStatus {
    /// The status only ever moves forward; a confirmed payment is never
    /// un-confirmed by a later notification.
    pub fn can_advance_to(self, next: OrderStatus) -> bool {
        next > self
    }
}

/// Reference to an asset stored alongside the order document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRef(pub String);

/// The persisted, server-owned order document.
///
/// Created by the submission endpoint; its `id` is immutable once assigned
/// and its `status` is advanced by the payment notification handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    pub id: OrderId,
    pub customer_name: String,
    pub email: String,
    pub drawing_size: DrawingSize,
    #[serde(default)]
    pub details: String,
    pub reference_photo: AssetRef,
    pub status: OrderStatus,
}

impl OrderRecord {
    /// Advance the lifecycle status; backward transitions are rejected.
    pub fn advance_to(&mut self, next: OrderStatus) -> bool {
        if self.status.can_advance_to(next) {
            self.status = next;
            true
        } else {
            false
        }
    }
}

/// The signed request object handed to the hosted payment page.
///
/// Field names follow the gateway's checkout contract; `amount` serializes as
/// a 2-decimal string, the same form that went into the hash.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentRequest {
    pub merchant_id: String,
    pub order_id: OrderId,
    pub items: String,
    pub amount: Amount,
    pub currency: String,
    pub hash: String,
    pub return_url: Url,
    pub cancel_url: Url,
    pub notify_url: Url,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image() -> ReferenceImage {
        ReferenceImage {
            file_name: "cat.jpg".to_string(),
            content_type: "image/jpeg".to_string(),
            bytes: vec![0u8; 64],
        }
    }

    // Price table

    #[test]
    fn price_table() {
        assert_eq!(DrawingSize::A4.price(), Amount::from_major(5000));
        assert_eq!(DrawingSize::A3.price(), Amount::from_major(8000));
        assert_eq!(DrawingSize::A2.price(), Amount::from_major(12000));
    }

    #[test]
    fn items_label_names_the_size() {
        assert_eq!(DrawingSize::A3.items_label(), "Pencil Portrait - A3");
    }

    #[test]
    fn size_parses_exact_labels_only() {
        assert_eq!("A4".parse(), Ok(DrawingSize::A4));
        assert_eq!("A2".parse(), Ok(DrawingSize::A2));
        assert!("a4".parse::<DrawingSize>().is_err());
        assert!("A5".parse::<DrawingSize>().is_err());
        assert!("".parse::<DrawingSize>().is_err());
    }

    // Customer name split

    #[test]
    fn name_splits_into_first_and_last() {
        let draft = ValidatedDraft {
            name: "Jane Maria Doe".to_string(),
            email: "jane@x.com".to_string(),
            size: DrawingSize::A3,
            details: String::new(),
            photo: image(),
        };
        assert_eq!(draft.first_name(), "Jane");
        assert_eq!(draft.last_name(), "Maria Doe");
    }

    #[test]
    fn single_word_name_has_empty_last_name() {
        let draft = ValidatedDraft {
            name: "Jane".to_string(),
            email: "jane@x.com".to_string(),
            size: DrawingSize::A4,
            details: String::new(),
            photo: image(),
        };
        assert_eq!(draft.first_name(), "Jane");
        assert_eq!(draft.last_name(), "");
    }

    // Status lifecycle

    #[test]
    fn status_only_advances_forward() {
        use OrderStatus::*;
        assert!(PendingPayment.can_advance_to(Paid));
        assert!(PendingPayment.can_advance_to(Completed));
        assert!(Paid.can_advance_to(Accepted));
        assert!(!Paid.can_advance_to(PendingPayment));
        assert!(!Completed.can_advance_to(Accepted));
        assert!(!Paid.can_advance_to(Paid));
    }

    #[test]
    fn record_rejects_backward_transition() {
        let mut record = OrderRecord {
            id: "ord_1".to_string(),
            customer_name: "Jane Doe".to_string(),
            email: "jane@x.com".to_string(),
            drawing_size: DrawingSize::A3,
            details: String::new(),
            reference_photo: AssetRef("image-abc".to_string()),
            status: OrderStatus::PendingPayment,
        };
        assert!(record.advance_to(OrderStatus::Paid));
        assert!(!record.advance_to(OrderStatus::PendingPayment));
        assert_eq!(record.status, OrderStatus::Paid);
    }

    #[test]
    fn record_serializes_with_wire_names() {
        let record = OrderRecord {
            id: "ord_1".to_string(),
            customer_name: "Jane Doe".to_string(),
            email: "jane@x.com".to_string(),
            drawing_size: DrawingSize::A2,
            details: "side profile".to_string(),
            reference_photo: AssetRef("image-abc".to_string()),
            status: OrderStatus::PendingPayment,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["customerName"], "Jane Doe");
        assert_eq!(json["drawingSize"], "A2");
        assert_eq!(json["status"], "pending_payment");
    }

    #[test]
    fn debug_elides_image_bytes() {
        let rendered = format!("{:?}", image());
        assert!(rendered.contains("cat.jpg"));
        assert!(!rendered.contains("[0, 0"));
    }
}
