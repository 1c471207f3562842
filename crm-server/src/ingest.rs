//! Customer and order ingestion.
//!
//! Orders are the only writer of a customer's behavioural attributes.

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::model::{Customer, Order, Product};
use crate::store::Store;

/// Customer fields populated into order listings.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CustomerRef {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

/// Order with `customerId` populated.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub customer_id: Option<CustomerRef>,
    pub amount: f64,
    pub products: Vec<Product>,
    pub order_date: chrono::DateTime<chrono::Utc>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl OrderView {
    fn new(order: Order, customer: Option<&Customer>) -> Self {
        Self {
            id: order.id,
            customer_id: customer.map(|c| CustomerRef {
                id: c.id,
                name: c.name.clone(),
                email: c.email.clone(),
            }),
            amount: order.amount,
            products: order.products,
            order_date: order.order_date,
            created_at: order.created_at,
        }
    }
}

#[derive(Clone)]
pub struct IngestService {
    store: Store,
}

impl IngestService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Register a customer. Emails are unique after trimming and lowercasing.
    pub async fn create_customer(&self, name: &str, email: &str) -> AppResult<Customer> {
        let name = name.trim();
        let email = email.trim().to_lowercase();
        if name.is_empty() || email.is_empty() {
            return Err(AppError::validation("Please provide name and email"));
        }
        if !is_valid_email(&email) {
            return Err(AppError::validation("Enter a valid email"));
        }

        let customer = self
            .store
            .customers
            .insert_unless(Customer::new(name, email.clone()), |c| c.email == email)
            .await?
            .ok_or_else(|| {
                AppError::Conflict(
                    "Email already exists, please register with unique credentials".to_string(),
                )
            })?;

        info!(customer_id = %customer.id, "customer_registered");
        Ok(customer)
    }

    pub async fn list_customers(&self) -> AppResult<Vec<Customer>> {
        self.store.customers.all().await
    }

    pub async fn get_customer(&self, id: &str) -> AppResult<Customer> {
        let found = match Uuid::parse_str(id) {
            Ok(id) => self.store.customers.get(id).await?,
            Err(_) => None,
        };
        found.ok_or_else(|| AppError::not_found("Customer not found"))
    }

    /// Record an order and bump the customer's spend, visits and activity.
    pub async fn ingest_order(
        &self,
        customer_id: &str,
        amount: Option<f64>,
        products: Vec<Product>,
    ) -> AppResult<Order> {
        let amount = match amount {
            Some(a) if a.is_finite() && a > 0.0 => a,
            _ => {
                return Err(AppError::validation(
                    "Customer ID, amount, and products are required",
                ))
            }
        };
        if customer_id.trim().is_empty() || products.is_empty() {
            return Err(AppError::validation(
                "Customer ID, amount, and products are required",
            ));
        }
        if products.iter().any(|p| p.name.trim().is_empty()) {
            return Err(AppError::validation("Every product needs a name"));
        }

        let customer_id = Uuid::parse_str(customer_id.trim())
            .map_err(|_| AppError::not_found("Customer not found"))?;

        if self.store.customers.get(customer_id).await?.is_none() {
            return Err(AppError::not_found("Customer not found"));
        }

        let order = self
            .store
            .orders
            .insert(Order::new(customer_id, amount, products))
            .await?;

        let customer = self
            .store
            .customers
            .update(customer_id, |c| c.record_order(amount, order.order_date))
            .await?
            .ok_or_else(|| AppError::not_found("Customer not found"))?;

        info!(
            order_id = %order.id,
            customer_id = %customer.id,
            amount = amount,
            total_spend = customer.total_spend,
            visits = customer.visits,
            "order_ingested"
        );

        Ok(order)
    }

    pub async fn list_orders(&self) -> AppResult<Vec<OrderView>> {
        let orders = self.store.orders.all().await?;
        let customers = self.store.customers.all().await?;

        Ok(orders
            .into_iter()
            .map(|order| {
                let customer = customers.iter().find(|c| c.id == order.customer_id);
                OrderView::new(order, customer)
            })
            .collect())
    }

    pub async fn get_order(&self, id: &str) -> AppResult<OrderView> {
        let order = match Uuid::parse_str(id) {
            Ok(id) => self.store.orders.get(id).await?,
            Err(_) => None,
        }
        .ok_or_else(|| AppError::not_found("Order not found"))?;

        let customer = self.store.customers.get(order.customer_id).await?;
        Ok(OrderView::new(order, customer.as_ref()))
    }
}

/// `local@domain.tld` with no whitespace and a dotted domain.
fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain
            .split('.')
            .collect::<Vec<_>>()
            .as_slice()
            .split_last()
            .is_some_and(|(tld, labels)| {
                tld.len() >= 2 && !labels.is_empty() && labels.iter().all(|l| !l.is_empty())
            })
}
