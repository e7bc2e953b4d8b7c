pub mod amount;
pub mod config;
pub mod gateway;
pub mod model;
pub mod signer;
pub mod transport;
pub mod validate;
pub mod workflow;

pub use amount::Amount;
pub use config::{PaymentConfig, TransportConfig};
pub use model::{DrawingSize, OrderDraft, OrderId, ValidatedDraft};
pub use signer::PaymentSigner;
pub use transport::{HttpTransport, SubmitOrder};
pub use workflow::{Step, SubmissionOutcome, Workflow, WorkflowState};
