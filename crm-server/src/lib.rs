//! Zeno CRM - audience segmentation and campaign dispatch.
//!
//! This library backs the `zeno-crm` binary:
//! - Ingests customers and orders
//! - Resolves rule-based audience segments
//! - Dispatches personalized campaigns through a delivery channel
//! - Reconciles vendor delivery receipts
//!
//! ## Architecture
//!
//! ```text
//! Orders → Customers → Segment rules → Audience → DispatchWorker → Vendor
//!                                                       ↓
//!                                   Receipts → CommunicationLog
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod ingest;
pub mod model;
pub mod receipt;
pub mod segment;
pub mod store;
pub mod web;

// Re-export commonly used types
pub use config::Config;
pub use dispatch::{CampaignService, DeliveryChannel, DispatchHandle, DispatchWorker};
pub use error::{AppError, AppResult};
pub use ingest::IngestService;
pub use segment::{CombinatorPolicy, SegmentService};
pub use store::Store;
pub use web::{build_router, AppState};
