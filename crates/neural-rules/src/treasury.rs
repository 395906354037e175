//! Treasury fallback engine
//!
//! Payments are routed to the `fast` lane (higher fee, settles quickly) or
//! the `standard` lane (lowest fee, slower). Savings are measured against
//! the more expensive of all-fast and all-standard routing.

use neural_types::{round_to, PendingPayment, RoutingGoal};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Fee per payment on the standard lane
pub const STANDARD_UNIT_COST: f64 = 0.0001;

/// Fee per payment on the fast lane
pub const FAST_UNIT_COST: f64 = 0.02;

/// Balance bucket holding immediately spendable funds
pub const LIQUID_BUCKET: &str = "available";

/// Ratio above which liquidity is considered healthy without the oracle
pub const HEALTHY_RATIO: f64 = 0.10;

/// Amount above which allocations settle on the standard lane
pub const STANDARD_LANE_ALLOCATION_THRESHOLD: f64 = 10_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lane {
    Standard,
    Fast,
}

impl Lane {
    /// Decode a routing label; `L1`/`standard` and `L2`/`fast` are accepted
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "l1" | "standard" => Some(Self::Standard),
            "l2" | "fast" => Some(Self::Fast),
            _ => None,
        }
    }

    pub fn unit_cost(&self) -> f64 {
        match self {
            Self::Standard => STANDARD_UNIT_COST,
            Self::Fast => FAST_UNIT_COST,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Fast => "fast",
        }
    }
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Goal-aware deterministic routing
pub fn fallback_lane(amount: f64, urgency: u8, goal: RoutingGoal) -> Lane {
    let fast = match goal {
        RoutingGoal::Speed => urgency >= 5,
        RoutingGoal::Cost => amount < 50.0 && urgency >= 3,
        RoutingGoal::Balance => urgency >= 7 || amount < 25.0,
    };
    if fast {
        Lane::Fast
    } else {
        Lane::Standard
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutedPayment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    pub amount: f64,
    pub urgency: u8,
    pub lane: Lane,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingPlan {
    pub standard_count: usize,
    pub fast_count: usize,
    pub standard_total: f64,
    pub fast_total: f64,
    pub optimization_goal: RoutingGoal,
    pub payments: Vec<RoutedPayment>,
}

impl RoutingPlan {
    pub fn new(goal: RoutingGoal) -> Self {
        Self {
            standard_count: 0,
            fast_count: 0,
            standard_total: 0.0,
            fast_total: 0.0,
            optimization_goal: goal,
            payments: Vec::new(),
        }
    }

    pub fn push(&mut self, payment: &PendingPayment, lane: Lane) {
        match lane {
            Lane::Standard => {
                self.standard_count += 1;
                self.standard_total += payment.amount;
            }
            Lane::Fast => {
                self.fast_count += 1;
                self.fast_total += payment.amount;
            }
        }
        self.payments.push(RoutedPayment {
            payment_id: payment.payment_id.clone(),
            amount: payment.amount,
            urgency: payment.urgency,
            lane,
        });
    }

    /// Route every payment with the fallback rule
    pub fn fallback(payments: &[PendingPayment], goal: RoutingGoal) -> Self {
        let mut plan = Self::new(goal);
        for payment in payments {
            plan.push(payment, fallback_lane(payment.amount, payment.urgency, goal));
        }
        plan
    }

    pub fn total_count(&self) -> usize {
        self.standard_count + self.fast_count
    }

    pub fn actual_cost(&self) -> f64 {
        self.standard_count as f64 * STANDARD_UNIT_COST + self.fast_count as f64 * FAST_UNIT_COST
    }

    /// `max(0, baseline − actual)`, baseline being the dearer uniform routing
    pub fn estimated_savings(&self) -> f64 {
        let total = self.total_count() as f64;
        let baseline = (total * STANDARD_UNIT_COST).max(total * FAST_UNIT_COST);
        (baseline - self.actual_cost()).max(0.0)
    }
}

// ============================================================================
// Liquidity
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiquidityStatus {
    Healthy,
    Low,
    Critical,
}

impl LiquidityStatus {
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio > 0.15 {
            Self::Healthy
        } else if ratio > 0.05 {
            Self::Low
        } else {
            Self::Critical
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Low => "low",
            Self::Critical => "critical",
        }
    }

    /// Treasury risk implied by the liquidity status
    pub fn risk_assessment(&self) -> &'static str {
        match self {
            Self::Critical => "high",
            Self::Low => "medium",
            Self::Healthy => "low",
        }
    }
}

/// Liquid balance, total balance and their ratio
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiquidityPosition {
    pub total_balance: f64,
    pub liquid_balance: f64,
    pub ratio: f64,
}

impl LiquidityPosition {
    pub fn from_balances(balances: &BTreeMap<String, f64>) -> Self {
        let total_balance: f64 = balances.values().sum();
        let liquid_balance = balances.get(LIQUID_BUCKET).copied().unwrap_or(0.0);
        let ratio = if total_balance > 0.0 {
            liquid_balance / total_balance
        } else {
            0.0
        };
        Self {
            total_balance,
            liquid_balance,
            ratio,
        }
    }
}

/// Fallback for the oracle liquidity check
pub fn liquidity_healthy(liquid_balance: f64, total_balance: f64) -> bool {
    total_balance > 0.0 && liquid_balance / total_balance > HEALTHY_RATIO
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidityHealth {
    pub total_balance: f64,
    pub liquid_balance: f64,
    pub liquidity_ratio: f64,
    pub is_healthy: bool,
    pub status: LiquidityStatus,
}

impl LiquidityHealth {
    /// `is_healthy` is the oracle verdict OR a ratio above 0.10
    pub fn assess(position: LiquidityPosition, oracle_healthy: bool) -> Self {
        Self {
            total_balance: round_to(position.total_balance, 2),
            liquid_balance: round_to(position.liquid_balance, 2),
            liquidity_ratio: round_to(position.ratio, 3),
            is_healthy: oracle_healthy || position.ratio > HEALTHY_RATIO,
            status: LiquidityStatus::from_ratio(position.ratio),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreasuryRecommendation {
    pub priority: String,
    pub action: String,
    pub description: String,
    pub impact: String,
}

impl TreasuryRecommendation {
    fn new(priority: &str, action: &str, description: impl Into<String>, impact: &str) -> Self {
        Self {
            priority: priority.to_string(),
            action: action.to_string(),
            description: description.into(),
            impact: impact.to_string(),
        }
    }
}

pub fn recommendations(
    health: &LiquidityHealth,
    plan: &RoutingPlan,
    goal: RoutingGoal,
) -> Vec<TreasuryRecommendation> {
    let mut out = Vec::new();

    if health.status == LiquidityStatus::Critical {
        out.push(TreasuryRecommendation::new(
            "high",
            "increase_liquidity",
            "Liquidity critically low. Consider adding funds.",
            "Prevent payment failures",
        ));
    }
    if plan.fast_count > plan.standard_count {
        out.push(TreasuryRecommendation::new(
            "medium",
            "optimize_batching",
            format!(
                "Batch {} fast-lane payments for better efficiency",
                plan.fast_count
            ),
            "Reduce transaction costs",
        ));
    }
    if goal == RoutingGoal::Cost {
        out.push(TreasuryRecommendation::new(
            "low",
            "delay_non_urgent",
            "Delay non-urgent payments to batch for lower costs",
            "Maximize cost savings",
        ));
    }

    out
}

// ============================================================================
// Allocation
// ============================================================================

pub const COMPLIANCE_ALLOCATION_WEIGHT: f64 = 0.6;
pub const FRAUD_ALLOCATION_WEIGHT: f64 = 0.4;

/// Blend of compliance risk and fraud probability
pub fn combined_risk(compliance_risk: f64, fraud_probability: f64) -> f64 {
    neural_types::clamp_unit(
        compliance_risk * COMPLIANCE_ALLOCATION_WEIGHT
            + fraud_probability * FRAUD_ALLOCATION_WEIGHT,
    )
}

/// Lower risk earns a larger allocation
pub fn allocation_multiplier(combined_risk: f64) -> f64 {
    if combined_risk < 0.3 {
        2.5
    } else if combined_risk < 0.6 {
        1.5
    } else {
        0.8
    }
}

pub fn allocation_lane(amount: f64) -> Lane {
    if amount > STANDARD_LANE_ALLOCATION_THRESHOLD {
        Lane::Standard
    } else {
        Lane::Fast
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn balances(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_cost_goal_routing_scenario() {
        let payments = vec![PendingPayment::new(10.0, 5), PendingPayment::new(200.0, 1)];
        let plan = RoutingPlan::fallback(&payments, RoutingGoal::Cost);

        assert_eq!(plan.payments[0].lane, Lane::Fast);
        assert_eq!(plan.payments[1].lane, Lane::Standard);
        assert_eq!(plan.fast_count, 1);
        assert_eq!(plan.standard_count, 1);
        assert!(plan.estimated_savings() > 0.0);
        assert!((plan.estimated_savings() - 0.0199).abs() < 1e-9);
    }

    #[test]
    fn test_goal_rules() {
        assert_eq!(fallback_lane(1_000.0, 5, RoutingGoal::Speed), Lane::Fast);
        assert_eq!(fallback_lane(1_000.0, 4, RoutingGoal::Speed), Lane::Standard);
        assert_eq!(fallback_lane(49.0, 3, RoutingGoal::Cost), Lane::Fast);
        assert_eq!(fallback_lane(49.0, 2, RoutingGoal::Cost), Lane::Standard);
        assert_eq!(fallback_lane(500.0, 7, RoutingGoal::Balance), Lane::Fast);
        assert_eq!(fallback_lane(24.0, 1, RoutingGoal::Balance), Lane::Fast);
        assert_eq!(fallback_lane(500.0, 6, RoutingGoal::Balance), Lane::Standard);
    }

    #[test]
    fn test_all_fast_has_no_savings() {
        let payments = vec![PendingPayment::new(1.0, 9), PendingPayment::new(2.0, 9)];
        let plan = RoutingPlan::fallback(&payments, RoutingGoal::Speed);
        assert_eq!(plan.estimated_savings(), 0.0);
        assert!((plan.fast_total - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_lane_labels() {
        assert_eq!(Lane::from_label("L1"), Some(Lane::Standard));
        assert_eq!(Lane::from_label("l2"), Some(Lane::Fast));
        assert_eq!(Lane::from_label("fast"), Some(Lane::Fast));
        assert_eq!(Lane::from_label("teleport"), None);
    }

    #[test]
    fn test_liquidity_status_thresholds() {
        let healthy =
            LiquidityPosition::from_balances(&balances(&[("available", 20.0), ("reserved", 80.0)]));
        assert_eq!(LiquidityHealth::assess(healthy, false).status, LiquidityStatus::Healthy);

        let low =
            LiquidityPosition::from_balances(&balances(&[("available", 8.0), ("reserved", 92.0)]));
        let health = LiquidityHealth::assess(low, false);
        assert_eq!(health.status, LiquidityStatus::Low);
        assert!(!health.is_healthy);

        let critical =
            LiquidityPosition::from_balances(&balances(&[("available", 1.0), ("reserved", 99.0)]));
        let health = LiquidityHealth::assess(critical, false);
        assert_eq!(health.status, LiquidityStatus::Critical);
        assert_eq!(health.status.risk_assessment(), "high");
    }

    #[test]
    fn test_ratio_masks_oracle_verdict() {
        let position =
            LiquidityPosition::from_balances(&balances(&[("available", 12.0), ("reserved", 88.0)]));
        assert!(LiquidityHealth::assess(position, false).is_healthy);

        let position =
            LiquidityPosition::from_balances(&balances(&[("available", 1.0), ("reserved", 99.0)]));
        assert!(LiquidityHealth::assess(position, true).is_healthy);
    }

    #[test]
    fn test_empty_balances() {
        let position = LiquidityPosition::from_balances(&BTreeMap::new());
        assert_eq!(position.ratio, 0.0);
        assert!(!liquidity_healthy(position.liquid_balance, position.total_balance));
        assert_eq!(LiquidityHealth::assess(position, false).status, LiquidityStatus::Critical);
    }

    #[test]
    fn test_recommendations() {
        let position =
            LiquidityPosition::from_balances(&balances(&[("available", 1.0), ("reserved", 99.0)]));
        let health = LiquidityHealth::assess(position, false);
        let payments = vec![PendingPayment::new(10.0, 9), PendingPayment::new(20.0, 9)];
        let plan = RoutingPlan::fallback(&payments, RoutingGoal::Cost);

        let actions: Vec<_> = recommendations(&health, &plan, RoutingGoal::Cost)
            .into_iter()
            .map(|r| r.action)
            .collect();
        assert_eq!(actions, vec!["increase_liquidity", "optimize_batching", "delay_non_urgent"]);
    }

    #[test]
    fn test_allocation_rules() {
        assert!((combined_risk(0.2, 0.1) - 0.16).abs() < 1e-9);
        assert_eq!(allocation_multiplier(0.16), 2.5);
        assert_eq!(allocation_multiplier(0.3), 1.5);
        assert_eq!(allocation_multiplier(0.6), 0.8);
        assert_eq!(allocation_lane(10_001.0), Lane::Standard);
        assert_eq!(allocation_lane(10_000.0), Lane::Fast);
    }
}
