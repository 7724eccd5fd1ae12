//! Order submission and status endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::OrderId;
use document_store::DocumentStore;
use domain::{INITIALIZE_ORDER_SUBJECT, InitializeOrder, OrderRepository};
use message_bus::{MessageBus, MessageEnvelope};
use serde::Serialize;

use crate::error::ApiError;
use crate::validation;

/// Shared application state accessible from all handlers.
pub struct AppState<S: DocumentStore, B> {
    pub orders: OrderRepository<S>,
    pub bus: B,
    pub initialize_topic: String,
}

// -- Response types --

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSubmittedResponse {
    pub message: &'static str,
    pub order_id: String,
    pub status: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemResponse {
    pub id: String,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub total_price_cents: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusResponse {
    pub id: String,
    pub status: String,
    pub total_items: u32,
    pub total_value_cents: i64,
    pub items: Vec<OrderItemResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
}

// -- Handlers --

/// POST /orders — validate, sanitize, publish, answer 202.
///
/// Nothing is written to the store on this path: the only side effect is
/// the publish, so an error leaves no partial state behind.
#[tracing::instrument(skip(state, body))]
pub async fn submit<S, B>(
    State(state): State<Arc<AppState<S, B>>>,
    Json(body): Json<serde_json::Value>,
) -> Result<(StatusCode, Json<OrderSubmittedResponse>), ApiError>
where
    S: DocumentStore + Clone,
    B: MessageBus,
{
    let submission =
        validation::validate_and_sanitize(body).map_err(|e| ApiError::Validation(e.to_string()))?;

    let order_id = OrderId::new();
    let message = InitializeOrder {
        order_id,
        customer_data: submission.customer_data,
        payment_data: Some(submission.payment_data),
        address_data: Some(submission.address_data),
        items: submission.items,
    };

    let envelope = MessageEnvelope::new(&message)
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .with_subject(INITIALIZE_ORDER_SUBJECT)
        .with_attribute("orderId", order_id.to_string());
    state.bus.publish(&state.initialize_topic, envelope).await?;

    metrics::counter!("orders_submitted_total").increment(1);
    tracing::info!(%order_id, "order submitted");

    Ok((
        StatusCode::ACCEPTED,
        Json(OrderSubmittedResponse {
            message: "Order received for processing",
            order_id: order_id.to_string(),
            status: "submitted",
        }),
    ))
}

/// GET /orders/{id} — read the current state of an order.
#[tracing::instrument(skip(state))]
pub async fn get<S, B>(
    State(state): State<Arc<AppState<S, B>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderStatusResponse>, ApiError>
where
    S: DocumentStore + Clone,
    B: MessageBus,
{
    let order_id: OrderId = id
        .parse()
        .map_err(|_| ApiError::Validation(format!("Invalid order id: {id}")))?;

    let order = state
        .orders
        .get(order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Order {id} not found")))?;

    let items = order
        .items
        .iter()
        .map(|item| OrderItemResponse {
            id: item.id.to_string(),
            product_name: item.product_name.clone(),
            quantity: item.quantity,
            unit_price_cents: item.unit_price.cents(),
            total_price_cents: item.total_price.cents(),
        })
        .collect();

    Ok(Json(OrderStatusResponse {
        id: order.id.to_string(),
        status: order.status.to_string(),
        total_items: order.total_items,
        total_value_cents: order.total_value.cents(),
        items,
        reason: order.reason,
        transaction_id: order.transaction_id.map(|t| t.to_string()),
    }))
}
