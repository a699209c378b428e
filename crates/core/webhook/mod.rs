//! Webhook subscriptions and signed, retried delivery of job lifecycle
//! events.

pub mod dispatcher;
pub mod registry;
pub mod signature;
pub mod transport;
pub mod types;

pub use dispatcher::WebhookDispatcher;
pub use registry::WebhookRegistry;
pub use signature::{SIGNATURE_HEADER, sign_payload, signature_header, verify_signature};
pub use transport::{DeliveryError, HttpTransport, WebhookRequest, WebhookTransport};
pub use types::{
    AttemptLog, DeliveryRecord, DeliveryStatus, Webhook, WebhookEvent, WebhookPayload,
    WebhookStats,
};
