//! Pipeline configuration loaded from environment variables.

use std::time::Duration;

use thiserror::Error;

/// The stock ledger table name is fixed.
pub const STOCK_TABLE: &str = "product-stock";

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable was not set.
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
}

/// Configuration shared by the ingress and all workers.
///
/// Table names and queue/topic endpoints are required at startup
/// (`from_env`); tuning knobs fall back to defaults. For single-process
/// in-memory runs and tests, `local()` supplies a self-consistent set of
/// names without touching the environment.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    // tables
    pub lead_table: String,
    pub order_table: String,
    pub product_table: String,
    pub transaction_table: String,
    pub stock_table: String,

    // topics and queues
    pub initialize_topic: String,
    pub lead_queue: String,
    pub order_queue: String,
    pub stock_queue: String,
    pub payment_queue: String,
    pub update_queue: String,

    pub region: String,
    pub log_level: String,

    // consumer tuning
    pub batch_size: usize,
    pub record_timeout: Duration,
    pub max_receive_count: u32,
    pub poll_interval: Duration,

    // reaper
    pub reaper_grace: Duration,
    pub reaper_interval: Duration,
}

impl PipelineConfig {
    /// Loads configuration from the environment, failing on any missing
    /// required variable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            lead_table: require("LEAD_COLLECTION_TABLE")?,
            order_table: require("ORDER_COLLECTION_TABLE")?,
            product_table: require("PRODUCT_COLLECTION_TABLE")?,
            transaction_table: require("TRANSACTION_COLLECTION_TABLE")?,
            stock_table: STOCK_TABLE.to_string(),
            initialize_topic: require("INITIALIZE_ORDER_TOPIC_ARN")?,
            lead_queue: require("LEAD_QUEUE_URL")?,
            order_queue: require("ORDER_QUEUE_URL")?,
            stock_queue: require("PRODUCT_STOCK_QUEUE_URL")?,
            payment_queue: require("PROCESS_TRANSACTION_QUEUE_URL")?,
            update_queue: require("UPDATE_ORDER_QUEUE_URL")?,
            region: require("AWS_REGION")?,
            log_level: optional("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            batch_size: parsed("PIPELINE_BATCH_SIZE", 10),
            record_timeout: Duration::from_secs(parsed("PIPELINE_RECORD_TIMEOUT_SECONDS", 25)),
            max_receive_count: parsed("PIPELINE_MAX_RECEIVE_COUNT", 3),
            poll_interval: Duration::from_millis(parsed("PIPELINE_POLL_INTERVAL_MS", 250)),
            reaper_grace: Duration::from_secs(parsed("STOCK_REAPER_GRACE_SECONDS", 300)),
            reaper_interval: Duration::from_secs(parsed("STOCK_REAPER_INTERVAL_SECONDS", 60)),
        })
    }

    /// Self-consistent names for single-process in-memory wiring.
    pub fn local() -> Self {
        Self {
            lead_table: "leads".to_string(),
            order_table: "orders".to_string(),
            product_table: "products".to_string(),
            transaction_table: "transactions".to_string(),
            stock_table: STOCK_TABLE.to_string(),
            initialize_topic: "initialize-order".to_string(),
            lead_queue: "lead-intake".to_string(),
            order_queue: "order-intake".to_string(),
            stock_queue: "product-stock".to_string(),
            payment_queue: "process-transaction".to_string(),
            update_queue: "update-order".to_string(),
            region: "local".to_string(),
            log_level: "info".to_string(),
            batch_size: 10,
            record_timeout: Duration::from_secs(25),
            max_receive_count: 3,
            poll_interval: Duration::from_millis(250),
            reaper_grace: Duration::from_secs(300),
            reaper_interval: Duration::from_secs(60),
        }
    }
}

fn require(name: &'static str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn parsed<T: std::str::FromStr + Copy>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_names_are_self_consistent() {
        let config = PipelineConfig::local();
        assert_eq!(config.stock_table, STOCK_TABLE);
        assert_ne!(config.lead_queue, config.order_queue);
        assert_eq!(config.max_receive_count, 3);
    }

    #[test]
    fn from_env_requires_table_names() {
        // The full variable set is never present in the test environment,
        // so loading must fail with a Missing error.
        let result = PipelineConfig::from_env();
        if let Err(e) = result {
            assert!(e.to_string().contains("missing required environment variable"));
        }
    }
}
