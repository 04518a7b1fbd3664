use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Tunable cancellation rules. Defaults match the platform's published
/// policy: free until 24h before departure, 30% penalty inside the window,
/// no refund once the ride has departed. The fee model mirrors typical card
/// processing (2.9% + EUR 0.30); the gateway keeps its fee on partial
/// refunds, so it is deducted from what the passenger gets back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PenaltyPolicy {
    pub free_cancellation_hours: i64,
    pub late_penalty_percent: u32,
    pub gateway_fee_bps: i64,
    pub gateway_fee_fixed_cents: i64,
}

impl Default for PenaltyPolicy {
    fn default() -> Self {
        Self {
            free_cancellation_hours: 24,
            late_penalty_percent: 30,
            gateway_fee_bps: 290,
            gateway_fee_fixed_cents: 30,
        }
    }
}

/// Outcome of a cancellation penalty computation, all amounts in cents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PenaltyBreakdown {
    pub penalty_percent: u32,
    pub refund_cents: i64,
    pub penalty_cents: i64,
    pub estimated_fee_cents: i64,
}

/// Compute the refund/penalty split for cancelling a captured payment.
/// Deterministic and side-effect free.
pub fn compute(
    paid_cents: i64,
    departure_at: DateTime<Utc>,
    now: DateTime<Utc>,
    policy: &PenaltyPolicy,
) -> PenaltyBreakdown {
    let until_departure = departure_at - now;

    let penalty_percent = if until_departure >= Duration::hours(policy.free_cancellation_hours) {
        0
    } else if until_departure > Duration::zero() {
        policy.late_penalty_percent
    } else {
        100
    };

    let base_refund = percent_of(paid_cents, 100 - i64::from(penalty_percent));
    let estimated_fee =
        bps_of(paid_cents, policy.gateway_fee_bps) + policy.gateway_fee_fixed_cents;
    let refund_cents = (base_refund - estimated_fee).max(0);

    PenaltyBreakdown {
        penalty_percent,
        refund_cents,
        penalty_cents: paid_cents - base_refund,
        estimated_fee_cents: estimated_fee,
    }
}

// Integer cent math, round-half-up. Amounts are validated non-negative at
// construction so plain division rounds correctly.
fn percent_of(amount: i64, percent: i64) -> i64 {
    (amount * percent + 50) / 100
}

fn bps_of(amount: i64, bps: i64) -> i64 {
    (amount * bps + 5_000) / 10_000
}
