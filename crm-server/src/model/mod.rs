//! Document types persisted by the store and exchanged over HTTP.
//!
//! Every document serializes with camelCase field names and an `_id`
//! identifier so the JSON shape matches what the web client expects.

pub mod campaign;
pub mod communication_log;
pub mod customer;
pub mod order;
pub mod segment;

pub use campaign::{Campaign, CampaignStatus, DeliveryStats};
pub use communication_log::{CommunicationLog, DeliveryStatus};
pub use customer::{AudienceMember, Customer};
pub use order::{Order, Product};
pub use segment::{Condition, Logic, RuleGroup, RuleValue, Segment};

use uuid::Uuid;

/// A document addressable by its `_id`.
pub trait Document: Clone + Send + Sync + 'static {
    fn id(&self) -> Uuid;
}

/// Placeholder for the acting user until identity is threaded through.
pub const SYSTEM_USER: &str = "system";
