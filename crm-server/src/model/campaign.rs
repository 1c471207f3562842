use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Document;

/// Campaign lifecycle. `Scheduled` exists in the data model but nothing
/// transitions into it.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum CampaignStatus {
    #[default]
    Draft,
    Scheduled,
    InProgress,
    Completed,
}

/// Aggregate counters owned by the campaign. Only ever incremented.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryStats {
    pub audience_size: u64,
    pub sent: u64,
    pub failed: u64,
}

impl DeliveryStats {
    pub fn record(&mut self, success: bool) {
        if success {
            self.sent += 1;
        } else {
            self.failed += 1;
        }
    }

    pub fn processed(&self) -> u64 {
        self.sent + self.failed
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub segment_id: Uuid,
    /// Message body; `{customerName}` is replaced per recipient
    pub message_template: String,
    pub delivery_stats: DeliveryStats,
    pub status: CampaignStatus,
    pub scheduled_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl Campaign {
    pub fn new(
        name: impl Into<String>,
        segment_id: Uuid,
        message_template: impl Into<String>,
        created_by: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            segment_id,
            message_template: message_template.into(),
            delivery_stats: DeliveryStats::default(),
            status: CampaignStatus::Draft,
            scheduled_at: now,
            completed_at: None,
            created_by: created_by.into(),
            created_at: now,
        }
    }

    /// Move to `InProgress` with the audience resolved at dispatch time.
    pub fn start(&mut self, audience_size: u64) {
        self.status = CampaignStatus::InProgress;
        self.delivery_stats.audience_size = audience_size;
    }

    /// Move to `Completed`. `completed_at` is stamped only once.
    pub fn complete(&mut self, at: DateTime<Utc>) {
        self.status = CampaignStatus::Completed;
        self.completed_at.get_or_insert(at);
    }
}

impl Document for Campaign {
    fn id(&self) -> Uuid {
        self.id
    }
}
