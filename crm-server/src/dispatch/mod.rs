//! Campaign creation and dispatch.
//!
//! ## Flow
//!
//! ```text
//! create() → resolve live audience → persist InProgress → DispatchWorker
//!          → per member: render → DeliveryChannel::send → CommunicationLog + stats
//!          → Completed
//! ```

pub mod channel;
pub mod worker;

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::model::{Campaign, CampaignStatus, DeliveryStats, Segment, SYSTEM_USER};
use crate::segment::SegmentService;
use crate::store::Store;

pub use channel::{DeliveryChannel, DeliveryOutcome, HttpVendor, SimulatedVendor};
pub use worker::{dispatch_campaign, DispatchHandle, DispatchJob, DispatchWorker};

/// Placeholder substituted with the recipient's name.
pub const CUSTOMER_NAME_PLACEHOLDER: &str = "{customerName}";

/// Personalize `template` for one recipient.
///
/// Only the first placeholder is substituted.
pub fn render_message(template: &str, customer_name: &str) -> String {
    template.replacen(CUSTOMER_NAME_PLACEHOLDER, customer_name, 1)
}

/// Result of creating a campaign.
#[derive(Debug, Clone)]
pub struct CreatedCampaign {
    pub campaign: Campaign,
    pub segment: Segment,
}

/// Segment reference populated into campaign listings.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SegmentRef {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
}

/// Campaign as listed, with `segmentId` populated.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CampaignView {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    /// `null` when the segment no longer exists
    pub segment_id: Option<SegmentRef>,
    pub message_template: String,
    pub delivery_stats: DeliveryStats,
    pub status: CampaignStatus,
    pub scheduled_at: chrono::DateTime<chrono::Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub created_by: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl CampaignView {
    fn new(campaign: Campaign, segment: Option<&Segment>) -> Self {
        Self {
            id: campaign.id,
            name: campaign.name,
            segment_id: segment.map(|s| SegmentRef {
                id: s.id,
                name: s.name.clone(),
            }),
            message_template: campaign.message_template,
            delivery_stats: campaign.delivery_stats,
            status: campaign.status,
            scheduled_at: campaign.scheduled_at,
            completed_at: campaign.completed_at,
            created_by: campaign.created_by,
            created_at: campaign.created_at,
        }
    }
}

/// Campaign creation and listing.
#[derive(Clone)]
pub struct CampaignService {
    store: Store,
    segments: SegmentService,
    dispatcher: DispatchHandle,
    await_dispatch: bool,
}

impl CampaignService {
    pub fn new(
        store: Store,
        segments: SegmentService,
        dispatcher: DispatchHandle,
        await_dispatch: bool,
    ) -> Self {
        Self {
            store,
            segments,
            dispatcher,
            await_dispatch,
        }
    }

    /// Create a campaign for a segment and dispatch it.
    ///
    /// The audience is re-resolved from the segment's stored rules, so it can
    /// differ from the size cached on the segment. When dispatch is awaited
    /// the returned campaign is `Completed`; otherwise it is `InProgress`.
    pub async fn create(
        &self,
        name: &str,
        segment_id: &str,
        message_template: &str,
    ) -> AppResult<CreatedCampaign> {
        if name.trim().is_empty()
            || segment_id.trim().is_empty()
            || message_template.trim().is_empty()
        {
            return Err(AppError::validation(
                "Campaign name, segment ID, and message template are required",
            ));
        }

        let segment = match Uuid::parse_str(segment_id.trim()) {
            Ok(id) => self.segments.get(id).await?,
            Err(_) => None,
        }
        .ok_or_else(|| AppError::not_found("Segment not found"))?;

        let audience = self.segments.audience(&segment.rules).await?;

        let mut campaign = Campaign::new(name.trim(), segment.id, message_template, SYSTEM_USER);
        campaign.start(audience.len() as u64);
        let campaign = self.store.campaigns.insert(campaign).await?;

        info!(
            campaign_id = %campaign.id,
            segment_id = %segment.id,
            cached_audience_size = segment.audience_size,
            audience_size = campaign.delivery_stats.audience_size,
            await_dispatch = self.await_dispatch,
            "campaign_created"
        );

        let job = DispatchJob {
            campaign_id: campaign.id,
            message_template: campaign.message_template.clone(),
            audience: audience.iter().map(|c| c.as_member()).collect(),
            completion: None,
        };

        let campaign = if self.await_dispatch {
            self.dispatcher.run(job).await?
        } else {
            self.dispatcher.submit(job).await?;
            campaign
        };

        Ok(CreatedCampaign { campaign, segment })
    }

    /// All campaigns with their segment name populated.
    pub async fn list(&self) -> AppResult<Vec<CampaignView>> {
        let campaigns = self.store.campaigns.all().await?;
        let segments = self.store.segments.all().await?;

        Ok(campaigns
            .into_iter()
            .map(|campaign| {
                let segment = segments.iter().find(|s| s.id == campaign.segment_id);
                CampaignView::new(campaign, segment)
            })
            .collect())
    }
}
