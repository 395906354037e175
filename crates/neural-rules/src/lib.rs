//! Neural Rules - Deterministic Fallback Engines
//!
//! Pure scoring functions used whenever the knowledge oracle is absent or
//! fails. Every function here is deterministic: the same inputs always produce
//! the same scores, levels and actions, so decisions stay auditable under total
//! oracle failure.
//!
//! # Engines
//!
//! - [`compliance`]: AML/KYC risk scoring, violations and recommendations
//! - [`fraud`]: rule-based fraud probability, ensemble and classification
//! - [`treasury`]: payment lane routing, savings and liquidity health
//! - [`growth`]: merchant performance analysis and suggestion catalog
//! - [`support`]: query classification and canned answers

pub mod compliance;
pub mod fraud;
pub mod growth;
pub mod support;
pub mod treasury;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised when decoding rule vocabulary from external labels
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuleError {
    #[error("Unknown {kind} label: {value}")]
    UnknownLabel { kind: &'static str, value: String },
}

pub type Result<T> = std::result::Result<T, RuleError>;

/// Discretized risk level
///
/// The four levels partition `[0, 1]` without gaps:
/// `(0.8, 1]` critical, `(0.6, 0.8]` high, `(0.4, 0.6]` medium, `[0, 0.4]` low.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn from_score(score: f64) -> Self {
        if score > 0.8 {
            Self::Critical
        } else if score > 0.6 {
            Self::High
        } else if score > 0.4 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// High and critical levels are flagged for follow-up
    pub fn is_elevated(&self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            _ => Err(RuleError::UnknownLabel {
                kind: "risk level",
                value: s.to_string(),
            }),
        }
    }
}
