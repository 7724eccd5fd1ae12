//! Inter-worker message payloads.
//!
//! Every message is JSON; field names are camelCase on the wire. The
//! `attributes` helpers produce the string attributes each queue carries
//! alongside the body.

use common::{OrderId, ProductId, TransactionId};
use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::order::OrderStatus;
use crate::stock::StockOperation;

/// Subject line attached to the order-initialization publish.
pub const INITIALIZE_ORDER_SUBJECT: &str = "New Order Request";

/// Customer identity as submitted with an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerData {
    pub cpf: String,
    pub email: String,
    pub name: String,
}

/// Card data as submitted with an order. Flows through queues only; it is
/// masked before anything is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentData {
    pub card_number: String,
    pub card_holder_name: String,
    pub expiry_month: String,
    pub expiry_year: String,
    pub cvv: String,
}

/// Shipping address as submitted with an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressData {
    pub street: String,
    pub number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complement: Option<String>,
    pub neighborhood: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
}

/// One requested item: a product reference and a quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemRequest {
    pub id: ProductId,
    pub quantity: u32,
}

/// Published by the ingress to the INITIALIZE topic; consumed independently
/// by the lead worker and the order worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeOrder {
    pub order_id: OrderId,
    pub customer_data: CustomerData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_data: Option<PaymentData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_data: Option<AddressData>,
    pub items: Vec<OrderItemRequest>,
}

/// A stock mutation request consumed by the stock worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockUpdate {
    pub product_id: ProductId,
    pub quantity: u32,
    pub operation: StockOperation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<OrderId>,
    pub reason: String,
}

impl StockUpdate {
    /// Queue attributes: operation, productId and (when present) orderId.
    pub fn attributes(&self) -> Vec<(&'static str, String)> {
        let mut attrs = vec![
            ("operation", self.operation.as_str().to_string()),
            ("productId", self.product_id.to_string()),
        ];
        if let Some(order_id) = self.order_id {
            attrs.push(("orderId", order_id.to_string()));
        }
        attrs
    }
}

/// A payment request consumed by the payment worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessTransaction {
    pub order_id: OrderId,
    pub order_total_value: Money,
    pub payment_data: PaymentData,
    pub address_data: AddressData,
    pub customer_data: CustomerData,
}

impl ProcessTransaction {
    /// Queue attributes: orderId, amount (in cents) and customer email.
    pub fn attributes(&self) -> Vec<(&'static str, String)> {
        vec![
            ("orderId", self.order_id.to_string()),
            ("amount", self.order_total_value.cents().to_string()),
            ("email", self.customer_data.email.clone()),
        ]
    }
}

/// An order status change consumed by the update worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrder {
    pub order_id: OrderId,
    pub status: OrderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<TransactionId>,
}

impl UpdateOrder {
    /// Queue attributes: orderId, status and (when present) transactionId.
    pub fn attributes(&self) -> Vec<(&'static str, String)> {
        let mut attrs = vec![
            ("orderId", self.order_id.to_string()),
            ("status", self.status.as_str().to_string()),
        ];
        if let Some(ref txn) = self.transaction_id {
            attrs.push(("transactionId", txn.to_string()));
        }
        attrs
    }
}
