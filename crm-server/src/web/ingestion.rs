//! Customer and order ingestion handlers.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::ingest::OrderView;
use crate::model::{Customer, Product};
use crate::web::handlers::json_body;
use crate::web::AppState;

#[derive(Debug, Deserialize)]
pub struct CustomerRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Serialize)]
pub struct CustomerCreatedResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub customer: Customer,
}

#[derive(Serialize)]
pub struct CustomerResponse {
    pub status: &'static str,
    pub customer: Customer,
}

#[derive(Serialize)]
pub struct CustomerListResponse {
    pub status: &'static str,
    pub customers: Vec<Customer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    #[serde(default)]
    pub customer_id: String,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub products: Vec<Product>,
}

pub async fn create_customer(
    State(state): State<AppState>,
    payload: Result<Json<CustomerRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let request = json_body(payload)?;
    let customer = state
        .ingest
        .create_customer(&request.name, &request.email)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CustomerCreatedResponse {
            status: "success",
            message: "customer registered successfully",
            customer,
        }),
    ))
}

pub async fn list_customers(
    State(state): State<AppState>,
) -> AppResult<Json<CustomerListResponse>> {
    Ok(Json(CustomerListResponse {
        status: "success",
        customers: state.ingest.list_customers().await?,
    }))
}

pub async fn get_customer(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<CustomerResponse>> {
    Ok(Json(CustomerResponse {
        status: "success",
        customer: state.ingest.get_customer(&id).await?,
    }))
}

/// Orders are returned bare, as stored.
pub async fn create_order(
    State(state): State<AppState>,
    payload: Result<Json<OrderRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let request = json_body(payload)?;
    let order = state
        .ingest
        .ingest_order(&request.customer_id, request.amount, request.products)
        .await?;

    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn list_orders(State(state): State<AppState>) -> AppResult<Json<Vec<OrderView>>> {
    Ok(Json(state.ingest.list_orders().await?))
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<OrderView>> {
    Ok(Json(state.ingest.get_order(&id).await?))
}
