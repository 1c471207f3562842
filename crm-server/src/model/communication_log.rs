use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Document;

/// Delivery state of one message.
///
/// Dispatch only ever writes `Sent` or `Failed`; `Delivered` and `Read`
/// arrive through receipts.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum DeliveryStatus {
    #[default]
    Pending,
    Sent,
    Failed,
    Delivered,
    Read,
}

impl DeliveryStatus {
    fn rank(self) -> u8 {
        match self {
            DeliveryStatus::Pending => 0,
            DeliveryStatus::Sent | DeliveryStatus::Failed => 1,
            DeliveryStatus::Delivered => 2,
            DeliveryStatus::Read => 3,
        }
    }

    /// Whether moving from `self` to `next` follows the normal lifecycle.
    pub fn advances_to(self, next: DeliveryStatus) -> bool {
        next.rank() >= self.rank()
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeliveryStatus::Pending => "Pending",
            DeliveryStatus::Sent => "Sent",
            DeliveryStatus::Failed => "Failed",
            DeliveryStatus::Delivered => "Delivered",
            DeliveryStatus::Read => "Read",
        };
        f.write_str(name)
    }
}

/// Vendors report `DELIVERED`, `read`, ... so matching ignores case.
impl FromStr for DeliveryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(DeliveryStatus::Pending),
            "sent" => Ok(DeliveryStatus::Sent),
            "failed" => Ok(DeliveryStatus::Failed),
            "delivered" => Ok(DeliveryStatus::Delivered),
            "read" => Ok(DeliveryStatus::Read),
            other => Err(format!("Unknown delivery status '{}'", other)),
        }
    }
}

/// One dispatch attempt for a (campaign, customer) pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CommunicationLog {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub customer_id: Uuid,
    /// Rendered message as handed to the vendor
    pub message: String,
    pub delivery_status: DeliveryStatus,
    /// Correlation key issued by the vendor on a successful send
    pub vendor_message_id: Option<String>,
    pub sent_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<DateTime<Utc>>,
}

impl CommunicationLog {
    pub fn new(
        campaign_id: Uuid,
        customer_id: Uuid,
        message: String,
        delivery_status: DeliveryStatus,
        vendor_message_id: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            campaign_id,
            customer_id,
            message,
            delivery_status,
            vendor_message_id,
            sent_at: Utc::now(),
            delivered_at: None,
        }
    }
}

impl Document for CommunicationLog {
    fn id(&self) -> Uuid {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse_ignores_case() {
        assert_eq!("DELIVERED".parse(), Ok(DeliveryStatus::Delivered));
        assert_eq!("read".parse(), Ok(DeliveryStatus::Read));
        assert_eq!(" Sent ".parse(), Ok(DeliveryStatus::Sent));
        assert!("bounced".parse::<DeliveryStatus>().is_err());
    }

    #[test]
    fn test_advances_to() {
        assert!(DeliveryStatus::Sent.advances_to(DeliveryStatus::Delivered));
        assert!(DeliveryStatus::Delivered.advances_to(DeliveryStatus::Read));
        assert!(DeliveryStatus::Read.advances_to(DeliveryStatus::Read));
        assert!(!DeliveryStatus::Sent.advances_to(DeliveryStatus::Pending));
        assert!(!DeliveryStatus::Read.advances_to(DeliveryStatus::Delivered));
    }
}
