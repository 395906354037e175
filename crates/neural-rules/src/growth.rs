//! Growth fallback engine
//!
//! Suggestions come from a fixed catalog gated by thresholds on the
//! merchant's reported metrics, ranked by predicted revenue impact.

use neural_types::{round_to, GrowthGoal, MerchantMetrics};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Expected days between transactions for an active merchant
pub const AVG_TX_FREQUENCY_DAYS: f64 = 7.0;

/// Churn risk when the merchant is still active
pub const BASELINE_CHURN_RISK: f64 = 0.2;

/// Churn risk when the merchant has gone quiet
pub const ELEVATED_CHURN_RISK: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    PricingOptimization,
    PaymentLinks,
    LoyaltyProgram,
    ReEngagement,
    CustomerSupport,
    CheckoutOptimization,
}

impl SuggestionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PricingOptimization => "pricing_optimization",
            Self::PaymentLinks => "payment_links",
            Self::LoyaltyProgram => "loyalty_program",
            Self::ReEngagement => "re_engagement",
            Self::CustomerSupport => "customer_support",
            Self::CheckoutOptimization => "checkout_optimization",
        }
    }

    pub fn difficulty(&self) -> &'static str {
        match self {
            Self::PaymentLinks | Self::PricingOptimization => "easy",
            Self::ReEngagement | Self::LoyaltyProgram | Self::CustomerSupport => "medium",
            Self::CheckoutOptimization => "hard",
        }
    }

    fn template(&self) -> (&'static str, &'static str, &'static str, &'static str) {
        match self {
            Self::PricingOptimization => (
                "Optimize Pricing Strategy",
                "Consider increasing prices by 10-15% or offering premium tiers",
                "15-20% revenue increase",
                "revenue",
            ),
            Self::PaymentLinks => (
                "Expand Payment Link Usage",
                "Create payment links for frequently purchased items",
                "10-15% conversion increase",
                "revenue",
            ),
            Self::LoyaltyProgram => (
                "Implement Loyalty Rewards",
                "Offer cashback or discounts for repeat customers",
                "20-30% repeat purchase increase",
                "revenue",
            ),
            Self::ReEngagement => (
                "Re-engagement Campaign",
                "Send personalized offers to inactive customers",
                "25% churn reduction",
                "retention",
            ),
            Self::CustomerSupport => (
                "Improve Customer Support",
                "Enable faster response times and proactive outreach",
                "15% satisfaction increase",
                "retention",
            ),
            Self::CheckoutOptimization => (
                "Optimize Checkout Flow",
                "Reduce checkout steps and enable one-click payments",
                "10-15% conversion increase",
                "conversion",
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    #[serde(rename = "type")]
    pub kind: SuggestionKind,
    pub title: String,
    pub description: String,
    pub expected_impact: String,
    pub category: String,
}

impl From<SuggestionKind> for Suggestion {
    fn from(kind: SuggestionKind) -> Self {
        let (title, description, expected_impact, category) = kind.template();
        Self {
            kind,
            title: title.to_string(),
            description: description.to_string(),
            expected_impact: expected_impact.to_string(),
            category: category.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceAnalysis {
    pub transactions_count: u64,
    pub total_revenue: f64,
    pub unique_customers: u64,
    pub growth_rate_pct: f64,
    pub is_healthy_growth: bool,
    pub churn_risk: f64,
    pub avg_transaction_value: f64,
}

/// Period-over-period revenue growth in percent
pub fn growth_rate_pct(metrics: &MerchantMetrics) -> f64 {
    if metrics.previous_revenue > 0.0 {
        (metrics.revenue - metrics.previous_revenue) / metrics.previous_revenue * 100.0
    } else {
        0.0
    }
}

/// Growth between 5% and 50% counts as healthy
pub fn healthy_growth(revenue: f64, previous_revenue: f64) -> bool {
    if previous_revenue <= 0.0 {
        return false;
    }
    let growth = (revenue - previous_revenue) / previous_revenue;
    (0.05..=0.50).contains(&growth)
}

pub fn churn_risk(days_since_last_transaction: f64, avg_frequency_days: f64) -> f64 {
    if days_since_last_transaction > avg_frequency_days * 3.0 {
        ELEVATED_CHURN_RISK
    } else {
        BASELINE_CHURN_RISK
    }
}

pub fn avg_transaction_value(metrics: &MerchantMetrics) -> f64 {
    if metrics.transactions > 0 {
        metrics.revenue / metrics.transactions as f64
    } else {
        0.0
    }
}

/// Assemble the analysis from oracle-or-fallback judgments
pub fn analyze(
    metrics: &MerchantMetrics,
    is_healthy_growth: bool,
    churn_risk: f64,
) -> PerformanceAnalysis {
    PerformanceAnalysis {
        transactions_count: metrics.transactions,
        total_revenue: round_to(metrics.revenue, 2),
        unique_customers: metrics.customers,
        growth_rate_pct: round_to(growth_rate_pct(metrics), 2),
        is_healthy_growth,
        churn_risk: round_to(churn_risk, 2),
        avg_transaction_value: round_to(avg_transaction_value(metrics), 2),
    }
}

/// Catalog entries for each goal, in goal order
pub fn suggestions_for_goals(
    goals: &[GrowthGoal],
    metrics: &MerchantMetrics,
    analysis: &PerformanceAnalysis,
) -> Vec<Suggestion> {
    let mut kinds = Vec::new();

    for goal in goals {
        match goal {
            GrowthGoal::IncreaseRevenue => {
                if analysis.avg_transaction_value < 100.0 {
                    kinds.push(SuggestionKind::PricingOptimization);
                }
                kinds.push(SuggestionKind::PaymentLinks);
                if metrics.customers > 100 {
                    kinds.push(SuggestionKind::LoyaltyProgram);
                }
            }
            GrowthGoal::ReduceChurn => {
                if analysis.churn_risk > 0.5 {
                    kinds.push(SuggestionKind::ReEngagement);
                }
                kinds.push(SuggestionKind::CustomerSupport);
            }
            GrowthGoal::ImproveConversion => kinds.push(SuggestionKind::CheckoutOptimization),
            GrowthGoal::Other => {}
        }
    }

    kinds.into_iter().map(Suggestion::from).collect()
}

/// Lower bound of a percentage range such as `"15-20% revenue increase"`
pub fn parse_impact_pct(expected_impact: &str) -> Option<f64> {
    if !expected_impact.contains('%') {
        return None;
    }
    let head = expected_impact.split('-').next()?;
    let head = head.split('%').next()?;
    head.trim().parse().ok()
}

pub fn predict_impact(suggestions: &[Suggestion], revenue: f64) -> BTreeMap<SuggestionKind, f64> {
    suggestions
        .iter()
        .map(|s| {
            let impact = parse_impact_pct(&s.expected_impact)
                .map(|pct| round_to(revenue * pct / 100.0, 2))
                .unwrap_or(0.0);
            (s.kind, impact)
        })
        .collect()
}

/// Descending by predicted impact; ties keep catalog order
pub fn rank(
    suggestions: &[Suggestion],
    impact: &BTreeMap<SuggestionKind, f64>,
) -> Vec<SuggestionKind> {
    let mut kinds: Vec<SuggestionKind> = suggestions.iter().map(|s| s.kind).collect();
    kinds.sort_by(|a, b| {
        let ia = impact.get(a).copied().unwrap_or(0.0);
        let ib = impact.get(b).copied().unwrap_or(0.0);
        ib.total_cmp(&ia)
    });
    kinds
}

pub fn difficulty(suggestions: &[Suggestion]) -> BTreeMap<SuggestionKind, &'static str> {
    suggestions.iter().map(|s| (s.kind, s.kind.difficulty())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics() -> MerchantMetrics {
        MerchantMetrics {
            transactions: 100,
            revenue: 5_000.0,
            customers: 150,
            previous_revenue: 4_000.0,
            days_since_last_transaction: 2.0,
        }
    }

    #[test]
    fn test_analysis() {
        let m = metrics();
        let analysis = analyze(
            &m,
            healthy_growth(m.revenue, m.previous_revenue),
            churn_risk(2.0, AVG_TX_FREQUENCY_DAYS),
        );
        assert_eq!(analysis.growth_rate_pct, 25.0);
        assert!(analysis.is_healthy_growth);
        assert_eq!(analysis.churn_risk, 0.2);
        assert_eq!(analysis.avg_transaction_value, 50.0);
    }

    #[test]
    fn test_growth_bounds() {
        assert!(!healthy_growth(1_000.0, 0.0));
        assert!(!healthy_growth(1_000.0, 990.0));
        assert!(healthy_growth(1_100.0, 1_000.0));
        assert!(!healthy_growth(2_000.0, 1_000.0));
    }

    #[test]
    fn test_churn_risk() {
        assert_eq!(churn_risk(21.0, AVG_TX_FREQUENCY_DAYS), BASELINE_CHURN_RISK);
        assert_eq!(churn_risk(22.0, AVG_TX_FREQUENCY_DAYS), ELEVATED_CHURN_RISK);
    }

    #[test]
    fn test_revenue_suggestions_and_ranking() {
        let m = metrics();
        let analysis = analyze(&m, true, BASELINE_CHURN_RISK);
        let suggestions = suggestions_for_goals(&[GrowthGoal::IncreaseRevenue], &m, &analysis);
        let kinds: Vec<_> = suggestions.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![
                SuggestionKind::PricingOptimization,
                SuggestionKind::PaymentLinks,
                SuggestionKind::LoyaltyProgram
            ]
        );

        let impact = predict_impact(&suggestions, m.revenue);
        assert_eq!(impact[&SuggestionKind::PricingOptimization], 750.0);
        assert_eq!(impact[&SuggestionKind::PaymentLinks], 500.0);
        assert_eq!(impact[&SuggestionKind::LoyaltyProgram], 1_000.0);

        assert_eq!(
            rank(&suggestions, &impact),
            vec![
                SuggestionKind::LoyaltyProgram,
                SuggestionKind::PricingOptimization,
                SuggestionKind::PaymentLinks
            ]
        );
    }

    #[test]
    fn test_churn_goal_gated_by_risk() {
        let m = metrics();
        let calm = analyze(&m, true, BASELINE_CHURN_RISK);
        let kinds: Vec<_> = suggestions_for_goals(&[GrowthGoal::ReduceChurn], &m, &calm)
            .iter()
            .map(|s| s.kind)
            .collect();
        assert_eq!(kinds, vec![SuggestionKind::CustomerSupport]);

        let quiet = analyze(&m, true, ELEVATED_CHURN_RISK);
        let kinds: Vec<_> = suggestions_for_goals(&[GrowthGoal::ReduceChurn], &m, &quiet)
            .iter()
            .map(|s| s.kind)
            .collect();
        assert_eq!(kinds, vec![SuggestionKind::ReEngagement, SuggestionKind::CustomerSupport]);
    }

    #[test]
    fn test_parse_impact() {
        assert_eq!(parse_impact_pct("15-20% revenue increase"), Some(15.0));
        assert_eq!(parse_impact_pct("25% churn reduction"), Some(25.0));
        assert_eq!(parse_impact_pct("more sales"), None);
    }

    #[test]
    fn test_ties_keep_catalog_order() {
        let suggestions: Vec<Suggestion> = vec![
            SuggestionKind::PaymentLinks.into(),
            SuggestionKind::CheckoutOptimization.into(),
        ];
        let impact = predict_impact(&suggestions, 1_000.0);
        assert_eq!(
            rank(&suggestions, &impact),
            vec![SuggestionKind::PaymentLinks, SuggestionKind::CheckoutOptimization]
        );
        let difficulty = difficulty(&suggestions);
        assert_eq!(difficulty[&SuggestionKind::CheckoutOptimization], "hard");
    }
}
