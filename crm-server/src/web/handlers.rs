//! Segment, campaign and delivery receipt handlers.
//!
//! Handlers only translate HTTP to service calls; every failure goes
//! through [`AppError`]'s responder.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::dispatch::CampaignView;
use crate::error::{AppError, AppResult};
use crate::model::{Campaign, CommunicationLog, RuleGroup, Segment};
use crate::receipt::apply_receipt;
use crate::web::signature::{
    is_signature_verification_enabled, verify_receipt_signature, SIGNATURE_HEADER,
    TIMESTAMP_HEADER, TOKEN_HEADER,
};
use crate::web::AppState;

/// Unwrap a JSON body, answering malformed input with a 400.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    match payload {
        Ok(Json(body)) => Ok(body),
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "request_body_rejected");
            Err(AppError::Validation(rejection.body_text()))
        }
    }
}

// =============================================================================
// Health Check
// =============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// Segments
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct SegmentRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub rules: Vec<RuleGroup>,
}

#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    #[serde(default)]
    pub rules: Vec<RuleGroup>,
}

#[derive(Serialize)]
pub struct SegmentResponse {
    pub status: &'static str,
    pub segment: Segment,
}

#[derive(Serialize)]
pub struct SegmentListResponse {
    pub status: &'static str,
    pub segments: Vec<Segment>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResponse {
    pub audience_size: u64,
}

pub async fn create_segment(
    State(state): State<AppState>,
    payload: Result<Json<SegmentRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let request = json_body(payload)?;
    let segment = state.segments.create(&request.name, request.rules).await?;

    Ok((
        StatusCode::CREATED,
        Json(SegmentResponse {
            status: "success",
            segment,
        }),
    ))
}

pub async fn preview_segment(
    State(state): State<AppState>,
    payload: Result<Json<PreviewRequest>, JsonRejection>,
) -> AppResult<Json<PreviewResponse>> {
    let request = json_body(payload)?;
    let audience_size = state.segments.preview(&request.rules).await?;
    Ok(Json(PreviewResponse { audience_size }))
}

pub async fn list_segments(
    State(state): State<AppState>,
) -> AppResult<Json<SegmentListResponse>> {
    Ok(Json(SegmentListResponse {
        status: "success",
        segments: state.segments.list().await?,
    }))
}

// =============================================================================
// Campaigns
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub segment_id: String,
    #[serde(default)]
    pub message_template: String,
}

/// Echoes the segment the campaign was sent to, plus the campaign itself.
#[derive(Serialize)]
pub struct CampaignCreatedResponse {
    pub status: &'static str,
    pub segment: Segment,
    pub campaign: Campaign,
}

#[derive(Serialize)]
pub struct CampaignListResponse {
    pub status: &'static str,
    pub campaigns: Vec<CampaignView>,
}

pub async fn create_campaign(
    State(state): State<AppState>,
    payload: Result<Json<CampaignRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let request = json_body(payload)?;
    let created = state
        .campaigns
        .create(&request.name, &request.segment_id, &request.message_template)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CampaignCreatedResponse {
            status: "success",
            segment: created.segment,
            campaign: created.campaign,
        }),
    ))
}

pub async fn list_campaigns(
    State(state): State<AppState>,
) -> AppResult<Json<CampaignListResponse>> {
    Ok(Json(CampaignListResponse {
        status: "success",
        campaigns: state.campaigns.list().await?,
    }))
}

// =============================================================================
// Delivery Receipts
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptRequest {
    #[serde(default)]
    pub vendor_message_id: String,
    #[serde(default)]
    pub status: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptResponse {
    pub msg: &'static str,
    pub communication_log: CommunicationLog,
}

/// Vendor callback reporting the final state of a message.
///
/// When a receipt signing key is configured the signature headers are
/// verified before the body is looked at.
pub async fn delivery_receipt(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<ReceiptRequest>, JsonRejection>,
) -> AppResult<Json<ReceiptResponse>> {
    let signing_key = state.config.receipt_signing_key.as_deref();
    if let Some(key) = signing_key.filter(|k| is_signature_verification_enabled(Some(*k))) {
        if !verify_receipt_signature(
            key,
            header_str(&headers, TIMESTAMP_HEADER),
            header_str(&headers, TOKEN_HEADER),
            header_str(&headers, SIGNATURE_HEADER),
            state.config.receipt_signature_max_age,
        ) {
            warn!("receipt_signature_rejected");
            return Err(AppError::Unauthorized(
                "Invalid receipt signature".to_string(),
            ));
        }
    }

    let request = json_body(payload)?;
    info!(
        vendor_message_id = %request.vendor_message_id,
        status = %request.status,
        "delivery_receipt_received"
    );

    let communication_log =
        apply_receipt(&state.store, &request.vendor_message_id, &request.status).await?;

    Ok(Json(ReceiptResponse {
        msg: "Delivery receipt processed",
        communication_log,
    }))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}
