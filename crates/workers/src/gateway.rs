//! Simulated payment gateway.

use std::time::Duration;

use async_trait::async_trait;
use domain::Money;
use rand::Rng;

/// Gateway failure messages, drawn at random when the simulated outage
/// probability fires.
const GATEWAY_FAILURES: [&str; 4] = [
    "Gateway timeout",
    "Payment service unavailable",
    "Merchant configuration error",
    "Network error",
];

/// Decline reasons drawn when the tiered approval probability misses.
const DECLINE_REASONS: [&str; 3] = [
    "Insufficient funds",
    "Card declined by issuer",
    "Suspected fraud",
];

/// Result of a gateway charge attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayOutcome {
    Approved { auth_code: String },
    Declined { reason: String },
    Errored { message: String },
}

/// Seam between the payment worker and the gateway, so tests can script
/// outcomes deterministically.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Attempts to charge the given amount against a card.
    async fn charge(&self, amount: Money, card_number: &str) -> GatewayOutcome;
}

/// Simulation tuning.
#[derive(Debug, Clone, Copy)]
pub struct GatewayConfig {
    /// Minimum artificial processing delay.
    pub base_delay: Duration,
    /// Additional uniformly-drawn jitter on top of the base delay.
    pub max_jitter: Duration,
    /// Probability of a simulated gateway outage per charge.
    pub failure_probability: f64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(200),
            max_jitter: Duration::from_millis(500),
            failure_probability: 0.03,
        }
    }
}

impl GatewayConfig {
    /// No delay and no simulated outages. Approval draws still apply.
    pub fn instant() -> Self {
        Self {
            base_delay: Duration::ZERO,
            max_jitter: Duration::ZERO,
            failure_probability: 0.0,
        }
    }
}

/// Deterministic-rules gateway with bounded randomness.
///
/// A card number ending in `0000` is always declined. Otherwise approval
/// depends on the amount tier: HIGH (>= 10 000.00) approves at 0.75,
/// MEDIUM (>= 1 000.00) at 0.85, LOW at 0.95.
#[derive(Debug, Clone, Default)]
pub struct SimulatedGateway {
    config: GatewayConfig,
}

impl SimulatedGateway {
    /// Creates a gateway with the given tuning.
    pub fn new(config: GatewayConfig) -> Self {
        Self { config }
    }
}

/// Approval probability for an amount tier.
pub(crate) fn approval_probability(amount: Money) -> f64 {
    if amount.cents() >= 1_000_000 {
        0.75
    } else if amount.cents() >= 100_000 {
        0.85
    } else {
        0.95
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn charge(&self, amount: Money, card_number: &str) -> GatewayOutcome {
        // Draw everything up front; the thread-local RNG cannot be held
        // across an await point.
        let (delay, outcome) = {
            let mut rng = rand::thread_rng();

            let jitter_ms = if self.config.max_jitter.is_zero() {
                0
            } else {
                rng.gen_range(0..=self.config.max_jitter.as_millis() as u64)
            };
            let delay = self.config.base_delay + Duration::from_millis(jitter_ms);

            let outcome = if self.config.failure_probability > 0.0
                && rng.gen_bool(self.config.failure_probability)
            {
                GatewayOutcome::Errored {
                    message: GATEWAY_FAILURES[rng.gen_range(0..GATEWAY_FAILURES.len())]
                        .to_string(),
                }
            } else if card_number.ends_with("0000") {
                GatewayOutcome::Declined {
                    reason: "Card declined by issuer".to_string(),
                }
            } else if rng.gen_bool(approval_probability(amount)) {
                GatewayOutcome::Approved {
                    auth_code: format!("AUTH-{:06X}", rng.gen_range(0..0x100_0000u32)),
                }
            } else {
                GatewayOutcome::Declined {
                    reason: DECLINE_REASONS[rng.gen_range(0..DECLINE_REASONS.len())].to_string(),
                }
            };

            (delay, outcome)
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        outcome
    }
}
