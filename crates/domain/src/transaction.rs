//! Payment transaction records.

use chrono::{DateTime, Utc};
use common::{OrderId, TransactionId};
use document_store::DocumentStore;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::masking::{CVV_SENTINEL, mask_card_number, mask_cpf};
use crate::messages::{AddressData, CustomerData, PaymentData};
use crate::money::Money;

/// Outcome of a payment attempt as recorded in the transaction table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    Pending,
    Approved,
    Declined,
    Error,
}

impl PaymentStatus {
    /// Returns the status name as stored on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Approved => "APPROVED",
            PaymentStatus::Declined => "DECLINED",
            PaymentStatus::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Card fields as persisted: PAN reduced to last-four, CVV replaced with
/// the fixed sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaskedCard {
    pub card_number: String,
    pub card_holder_name: String,
    pub expiry_month: String,
    pub expiry_year: String,
    pub cvv: String,
}

impl MaskedCard {
    /// Masks submitted card data for persistence.
    pub fn from_payment(payment: &PaymentData) -> Self {
        Self {
            card_number: mask_card_number(&payment.card_number),
            card_holder_name: payment.card_holder_name.clone(),
            expiry_month: payment.expiry_month.clone(),
            expiry_year: payment.expiry_year.clone(),
            cvv: CVV_SENTINEL.to_string(),
        }
    }
}

/// The authoritative payment record for one order attempt.
///
/// Construction masks every sensitive field; an unmasked card number or
/// raw CVV cannot reach the store through this type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: TransactionId,
    pub order_id: OrderId,
    pub amount: Money,
    pub payment_status: PaymentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_code: Option<String>,
    /// Gateway round-trip time in milliseconds.
    pub processing_time: u64,
    pub card_data: MaskedCard,
    pub address_data: AddressData,
    pub customer_data: CustomerData,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Builds a transaction record for a gateway outcome.
    #[allow(clippy::too_many_arguments)]
    pub fn record(
        order_id: OrderId,
        amount: Money,
        payment_status: PaymentStatus,
        auth_code: Option<String>,
        processing_time: u64,
        payment: &PaymentData,
        address: &AddressData,
        customer: &CustomerData,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: TransactionId::for_order(order_id),
            order_id,
            amount,
            payment_status,
            auth_code,
            processing_time,
            card_data: MaskedCard::from_payment(payment),
            address_data: address.clone(),
            customer_data: CustomerData {
                cpf: mask_cpf(&customer.cpf),
                email: customer.email.clone(),
                name: customer.name.clone(),
            },
            created_at: now,
            updated_at: now,
        }
    }
}

/// Store access for the transaction table.
#[derive(Clone)]
pub struct TransactionRepository<S> {
    store: S,
    table: String,
}

impl<S: DocumentStore> TransactionRepository<S> {
    /// Creates a repository over the given table.
    pub fn new(store: S, table: impl Into<String>) -> Self {
        Self {
            store,
            table: table.into(),
        }
    }

    /// Inserts a transaction under the precondition that its id is absent.
    ///
    /// Returns `false` when a row already exists: a redelivered payment
    /// message collides on the deterministic id and must not record a
    /// second outcome.
    #[tracing::instrument(skip(self, transaction), fields(transaction_id = %transaction.id))]
    pub async fn insert_new(&self, transaction: &Transaction) -> Result<bool, DomainError> {
        match self
            .store
            .insert(
                &self.table,
                transaction.id.as_str(),
                serde_json::to_value(transaction)?,
            )
            .await
        {
            Ok(()) => Ok(true),
            Err(document_store::StoreError::Conflict { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Loads a transaction by id.
    pub async fn get(&self, id: &TransactionId) -> Result<Option<Transaction>, DomainError> {
        let document = self.store.get(&self.table, id.as_str()).await?;
        match document {
            Some(doc) => Ok(Some(serde_json::from_value(doc)?)),
            None => Ok(None),
        }
    }
}
