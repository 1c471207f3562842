//! Delivery receipt reconciliation.
//!
//! Vendors report the terminal state of a message some time after dispatch.
//! Receipts are matched to their communication log by `vendorMessageId`.

use chrono::Utc;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::model::{CommunicationLog, DeliveryStatus};
use crate::store::Store;

/// Overwrite the delivery status of the log carrying `vendor_message_id`.
///
/// Any transition is accepted, including backwards ones such as
/// `Read → Pending`; those are logged. `deliveredAt` is stamped on every
/// call. The lookup and the write happen under one lock on the log
/// collection.
pub async fn apply_receipt(
    store: &Store,
    vendor_message_id: &str,
    status: &str,
) -> AppResult<CommunicationLog> {
    let vendor_message_id = vendor_message_id.trim();
    if vendor_message_id.is_empty() || status.trim().is_empty() {
        return Err(AppError::validation(
            "Vendor message ID and status are required",
        ));
    }

    let status: DeliveryStatus = status.parse().map_err(AppError::Validation)?;

    let mut previous = None;
    let log = store
        .communication_logs
        .find_one_and_update(
            |l| l.vendor_message_id.as_deref() == Some(vendor_message_id),
            |l| {
                previous = Some(l.delivery_status);
                l.delivery_status = status;
                l.delivered_at = Some(Utc::now());
            },
        )
        .await?;

    let Some(log) = log else {
        warn!(vendor_message_id = %vendor_message_id, "receipt_unknown_vendor_message");
        return Err(AppError::UnknownReceipt(vendor_message_id.to_string()));
    };

    if let Some(previous) = previous {
        if !previous.advances_to(status) {
            warn!(
                vendor_message_id = %vendor_message_id,
                from = %previous,
                to = %status,
                "receipt_status_regressed"
            );
        }
    }

    info!(
        log_id = %log.id,
        campaign_id = %log.campaign_id,
        vendor_message_id = %vendor_message_id,
        delivery_status = %log.delivery_status,
        "receipt_applied"
    );

    Ok(log)
}
