use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Document;

/// A line item on an order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub name: String,
    pub quantity: u32,
    pub price: f64,
}

/// An ingested order. Ingestion feeds the owning customer's spend and visits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub customer_id: Uuid,
    pub amount: f64,
    pub products: Vec<Product>,
    pub order_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn new(customer_id: Uuid, amount: f64, products: Vec<Product>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            customer_id,
            amount,
            products,
            order_date: now,
            created_at: now,
        }
    }
}

impl Document for Order {
    fn id(&self) -> Uuid {
        self.id
    }
}
