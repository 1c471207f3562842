//! HTTP surface of the CRM.
//!
//! ```text
//! GET  /health
//! POST /api/campaigns/segments            GET /api/campaigns/segments
//! POST /api/campaigns/segments/preview
//! POST /api/campaigns                     GET /api/campaigns
//! POST /api/campaigns/delivery-receipt
//! POST /api/customers                     GET /api/customers[/:id]
//! POST /api/orders                        GET /api/orders[/:id]
//! ```
//!
//! Every `/api` route passes the session gate in [`auth`].

pub mod auth;
pub mod handlers;
pub mod ingestion;
pub mod signature;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::dispatch::{CampaignService, DispatchHandle};
use crate::ingest::IngestService;
use crate::segment::SegmentService;
use crate::store::Store;

pub use handlers::{health, HealthResponse};
pub use signature::{is_signature_verification_enabled, verify_receipt_signature};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Store,
    pub segments: SegmentService,
    pub campaigns: CampaignService,
    pub ingest: IngestService,
}

impl AppState {
    pub fn new(config: Config, store: Store, dispatcher: DispatchHandle) -> Self {
        let segments = SegmentService::new(store.clone(), config.combinator_policy);
        let campaigns = CampaignService::new(
            store.clone(),
            segments.clone(),
            dispatcher,
            config.await_dispatch,
        );
        let ingest = IngestService::new(store.clone());

        Self {
            config: Arc::new(config),
            store,
            segments,
            campaigns,
            ingest,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route(
            "/campaigns/segments",
            post(handlers::create_segment).get(handlers::list_segments),
        )
        .route("/campaigns/segments/preview", post(handlers::preview_segment))
        .route(
            "/campaigns",
            post(handlers::create_campaign).get(handlers::list_campaigns),
        )
        .route("/campaigns/delivery-receipt", post(handlers::delivery_receipt))
        .route(
            "/customers",
            post(ingestion::create_customer).get(ingestion::list_customers),
        )
        .route("/customers/:id", get(ingestion::get_customer))
        .route(
            "/orders",
            post(ingestion::create_order).get(ingestion::list_orders),
        )
        .route("/orders/:id", get(ingestion::get_order))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_session,
        ));

    Router::new()
        .route("/health", get(health))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
