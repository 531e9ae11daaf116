//! Deterministic recovery-probability and priority scoring.
//!
//! No learned state: fixed weights over four case features. The engine
//! persists the output as the case's `Prediction` row (replace semantics).

use caseflow_store::AgingBucket;

/// Version tag stamped on every prediction.
pub const MODEL_VERSION: &str = "rule_based_v2";

/// Feature vector extracted from a case and its history.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseFeatures {
    /// Non-linear weight of the aging bucket (older debt scores higher).
    pub aging_weight: f64,
    /// Penalty accumulated from escalations, capped at 0.6.
    pub escalation_penalty: f64,
    /// Organization-wide mean of recovered/owed across closures, or the
    /// 0.4 prior when no closure history exists.
    pub historical_recovery: f64,
    /// Larger amounts are harder to recover; capped at 1.
    pub amount_risk: f64,
}

fn aging_weight(bucket: Option<AgingBucket>) -> f64 {
    match bucket {
        Some(AgingBucket::Days0To30) => 0.15,
        Some(AgingBucket::Days31To60) => 0.35,
        Some(AgingBucket::Days61To90) => 0.65,
        Some(AgingBucket::Days90Plus) => 0.9,
        None => 0.5,
    }
}

fn urgency(bucket: Option<AgingBucket>) -> f64 {
    match bucket {
        Some(AgingBucket::Days0To30) => 0.2,
        Some(AgingBucket::Days31To60) => 0.5,
        Some(AgingBucket::Days61To90) => 0.8,
        Some(AgingBucket::Days90Plus) => 1.0,
        None => 0.5,
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn clamp01(x: f64) -> f64 {
    x.clamp(0.0, 1.0)
}

/// Assemble the feature vector.
///
/// `recovery_ratios` holds `recovered_amount / amount_due` for every
/// closure on record, organization-wide.
pub fn build_features(
    bucket: Option<AgingBucket>,
    escalation_count: u32,
    recovery_ratios: &[f64],
    amount_due: f64,
) -> CaseFeatures {
    let historical_recovery = if recovery_ratios.is_empty() {
        0.4
    } else {
        recovery_ratios.iter().sum::<f64>() / recovery_ratios.len() as f64
    };

    CaseFeatures {
        aging_weight: aging_weight(bucket),
        escalation_penalty: (escalation_count as f64 * 0.15).min(0.6),
        historical_recovery,
        amount_risk: (amount_due / 100_000.0).min(1.0),
    }
}

/// Probability of recovering the debt, in `[0, 1]`, two decimals.
pub fn recovery_probability(features: &CaseFeatures) -> f64 {
    let score = 0.45 * features.historical_recovery
        + 0.30 * (1.0 - features.aging_weight)
        - 0.15 * features.escalation_penalty
        - 0.10 * features.amount_risk;
    round2(clamp01(score))
}

/// Work-ordering priority, in `[0, 1]`, two decimals.
pub fn priority_score(
    bucket: Option<AgingBucket>,
    amount_due: f64,
    recovery_probability: f64,
) -> f64 {
    let financial_impact = (amount_due / 75_000.0).min(1.0);
    let priority =
        0.45 * urgency(bucket) + 0.35 * financial_impact + 0.20 * recovery_probability;
    round2(clamp01(priority))
}
