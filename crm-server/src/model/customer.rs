use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Document;

/// A customer and the behavioural attributes segments filter on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    /// Unique, stored trimmed and lowercased
    pub email: String,
    /// Sum of all ingested order amounts
    pub total_spend: f64,
    /// Number of ingested orders
    pub visits: u64,
    /// Bumped on every ingested order
    pub last_activity: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            email: email.into(),
            total_spend: 0.0,
            visits: 0,
            last_activity: now,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply an order of `amount` placed at `at`.
    pub fn record_order(&mut self, amount: f64, at: DateTime<Utc>) {
        self.total_spend += amount;
        self.visits += 1;
        self.last_activity = at;
        self.updated_at = at;
    }

    pub fn as_member(&self) -> AudienceMember {
        AudienceMember {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }
}

impl Document for Customer {
    fn id(&self) -> Uuid {
        self.id
    }
}

/// Projection of a customer used while dispatching a campaign.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AudienceMember {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_order_bumps_counters() {
        let mut customer = Customer::new("Ada", "ada@example.com");
        let at = Utc::now();
        customer.record_order(1500.0, at);
        customer.record_order(20.5, at);

        assert_eq!(customer.total_spend, 1520.5);
        assert_eq!(customer.visits, 2);
        assert_eq!(customer.last_activity, at);
    }

    #[test]
    fn test_customer_serializes_camel_case() {
        let customer = Customer::new("Ada", "ada@example.com");
        let json = serde_json::to_value(&customer).unwrap();

        assert!(json.get("_id").is_some());
        assert_eq!(json["totalSpend"], 0.0);
        assert!(json.get("lastActivity").is_some());
    }
}
