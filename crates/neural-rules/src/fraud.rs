//! Fraud fallback engine
//!
//! Rule contributions are summed, normalized by 1.5 and clamped. The final
//! probability is an ensemble with an anomaly-model score:
//!
//! ```text
//! probability = 0.6 × rule_score + 0.4 × model_score
//! confidence  = min(0.7 + 0.3 × (1 − |rule_score − model_score|), 1)
//! ```

use neural_types::{clamp_unit, FraudFactor, NEUTRAL_SCORE};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::RuleError;

pub const RULE_WEIGHT: f64 = 0.6;
pub const MODEL_WEIGHT: f64 = 0.4;

/// Default detection threshold for `fraud.detected` alerts
pub const DEFAULT_THRESHOLD: f64 = 0.75;

/// Average amount assumed when the user has no profile
pub const DEFAULT_AVG_AMOUNT: f64 = 500.0;

/// Amount assumed when the request carries none
pub const DEFAULT_AMOUNT: f64 = 1_000.0;

/// Minutes since the last transaction when there is no history
pub const DEFAULT_MINUTES_SINCE_LAST_TX: f64 = 60.0;

const NORMALIZER: f64 = 1.5;

/// Features extracted for one transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudSignals {
    pub amount: f64,
    pub avg_amount: f64,
    pub tx_count_24h: u32,
    /// UTC hour, 0..=23
    pub hour: u32,
    pub new_device: bool,
    pub new_location: bool,
    pub minutes_since_last_tx: f64,
}

impl FraudSignals {
    /// Relative deviation of the amount from the user's average
    pub fn amount_deviation(&self) -> f64 {
        (self.amount - self.avg_amount).abs() / self.avg_amount.max(1.0)
    }

    pub fn is_round_number(&self) -> bool {
        self.amount > 100.0 && self.amount % 100.0 == 0.0
    }

    /// Transactions per hour over the last day
    pub fn velocity(&self) -> f64 {
        self.tx_count_24h as f64 / 24.0
    }

    pub fn is_unusual_hour(&self) -> bool {
        self.hour < 4 || self.hour > 23
    }
}

/// Rule-based score before the ensemble
pub fn rule_score(signals: &FraudSignals) -> f64 {
    let mut score = 0.0;

    if signals.is_round_number() {
        score += 0.3;
    }
    if signals.amount_deviation() > 3.0 {
        score += 0.5;
    }

    if signals.tx_count_24h > 20 {
        score += 0.7;
    } else if signals.tx_count_24h > 10 {
        score += 0.4;
    }

    if signals.is_unusual_hour() {
        score += 0.4;
    }

    if signals.new_device && signals.amount > 1_000.0 {
        score += 0.5;
    }

    clamp_unit((score / NORMALIZER).min(1.0))
}

pub fn ensemble(rule_score: f64, model_score: f64) -> f64 {
    clamp_unit(rule_score * RULE_WEIGHT + model_score * MODEL_WEIGHT)
}

/// Higher when the rule and model signals agree
pub fn confidence(rule_score: f64, model_score: f64) -> f64 {
    let agreement = 1.0 - (rule_score - model_score).abs();
    clamp_unit((0.7 + agreement * 0.3).min(1.0))
}

/// Anomaly model consulted alongside the rules
///
/// Training is out of scope; implementations are handed in already fitted.
pub trait AnomalyScorer: Send + Sync {
    fn name(&self) -> &str;

    fn is_trained(&self) -> bool;

    /// Fraud likelihood in `[0, 1]`
    fn score(&self, signals: &FraudSignals) -> f64;
}

/// Untrained model: always neutral
#[derive(Debug, Clone, Copy, Default)]
pub struct NeutralScorer;

impl AnomalyScorer for NeutralScorer {
    fn name(&self) -> &str {
        "neutral"
    }

    fn is_trained(&self) -> bool {
        false
    }

    fn score(&self, _signals: &FraudSignals) -> f64 {
        NEUTRAL_SCORE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FraudType {
    CardTesting,
    AccountTakeover,
    ManualFraud,
    AutomatedFraud,
    SuspiciousActivity,
}

impl FraudType {
    /// Fixed decision list, first match wins
    pub fn classify(signals: &FraudSignals) -> Self {
        if signals.tx_count_24h > 5 && signals.amount < 50.0 {
            Self::CardTesting
        } else if signals.new_device && signals.amount_deviation() > 4.0 {
            Self::AccountTakeover
        } else if signals.is_round_number() && signals.amount > 1_000.0 {
            Self::ManualFraud
        } else if signals.tx_count_24h > 15 {
            Self::AutomatedFraud
        } else {
            Self::SuspiciousActivity
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CardTesting => "card_testing",
            Self::AccountTakeover => "account_takeover",
            Self::ManualFraud => "manual_fraud",
            Self::AutomatedFraud => "automated_fraud",
            Self::SuspiciousActivity => "suspicious_activity",
        }
    }
}

impl fmt::Display for FraudType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Only probabilities of at least 0.5 are classified
pub fn classify(signals: &FraudSignals, probability: f64) -> Option<FraudType> {
    if probability < 0.5 {
        return None;
    }
    Some(FraudType::classify(signals))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FraudAction {
    Approve,
    Monitor,
    /// Require secondary verification
    Challenge,
    Block,
}

impl FraudAction {
    pub fn from_probability(probability: f64) -> Self {
        if probability > 0.85 {
            Self::Block
        } else if probability > 0.65 {
            Self::Challenge
        } else if probability > 0.45 {
            Self::Monitor
        } else {
            Self::Approve
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Monitor => "monitor",
            Self::Challenge => "challenge",
            Self::Block => "block",
        }
    }
}

impl fmt::Display for FraudAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FraudAction {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "approve" => Ok(Self::Approve),
            "monitor" => Ok(Self::Monitor),
            "challenge" => Ok(Self::Challenge),
            "block" => Ok(Self::Block),
            _ => Err(RuleError::UnknownLabel {
                kind: "fraud action",
                value: s.to_string(),
            }),
        }
    }
}

/// Human-readable contributors to the score
pub fn fraud_factors(signals: &FraudSignals) -> Vec<FraudFactor> {
    let mut factors = Vec::new();

    if signals.amount_deviation() > 3.0 {
        factors.push(FraudFactor::new(
            "unusual_amount",
            0.5,
            "Amount deviates significantly from user's average",
        ));
    }
    if signals.tx_count_24h > 15 {
        factors.push(FraudFactor::new(
            "high_velocity",
            0.7,
            format!("{} transactions in 24 hours", signals.tx_count_24h),
        ));
    }
    if signals.new_device {
        factors.push(FraudFactor::new("new_device", 0.5, "Transaction from new device"));
    }
    if signals.hour < 4 {
        factors.push(FraudFactor::new(
            "unusual_time",
            0.4,
            format!("Transaction at {}:00 (unusual hour)", signals.hour),
        ));
    }
    if signals.is_round_number() {
        factors.push(FraudFactor::new(
            "round_number",
            0.3,
            "Round number amount (common in fraud)",
        ));
    }

    factors
}
