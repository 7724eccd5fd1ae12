//! Queue consumers for the order-processing pipeline.
//!
//! Five workers cooperate through the message bus and the document store:
//! the lead worker and order worker both consume the INITIALIZE fan-out,
//! the stock worker appends ledger entries, the payment worker drives the
//! simulated gateway, and the update worker advances the order state
//! machine. The reaper reconciles stock reservations whose order never
//! materialized.

pub mod config;
pub mod error;
pub mod gateway;
pub mod lead;
pub mod order;
pub mod payment;
pub mod reaper;
pub mod runner;
pub mod stock;
pub mod update;

pub use config::{ConfigError, PipelineConfig};
pub use error::WorkerError;
pub use gateway::{GatewayConfig, GatewayOutcome, PaymentGateway, SimulatedGateway};
pub use lead::LeadWorker;
pub use order::OrderWorker;
pub use payment::PaymentWorker;
pub use reaper::StockReaper;
pub use runner::{BatchOutcome, QueueWorker, RunnerSettings, WorkerRunner};
pub use stock::StockWorker;
pub use update::UpdateWorker;

use message_bus::{BusError, MessageEnvelope};

/// Builds an envelope for a payload plus its queue attributes.
pub(crate) fn message_envelope<T: serde::Serialize>(
    payload: &T,
    attributes: Vec<(&'static str, String)>,
) -> Result<MessageEnvelope, BusError> {
    let mut envelope = MessageEnvelope::new(payload)?;
    for (key, value) in attributes {
        envelope = envelope.with_attribute(key, value);
    }
    Ok(envelope)
}
