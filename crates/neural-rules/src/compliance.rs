//! Compliance fallback engine
//!
//! Weighted AML/KYC risk score:
//!
//! ```text
//! 0.3 × kyc + 0.3 × amount + 0.3 × velocity + 0.1 × country
//! ```
//!
//! Violation checks run independently of the score and feed the
//! recommendation list.

use neural_types::clamp_unit;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{RiskLevel, RuleError};

/// Jurisdictions scored at full country risk
pub const HIGH_RISK_COUNTRIES: [&str; 4] = ["KP", "IR", "SY", "CU"];

/// Merchant business types that add risk
pub const HIGH_RISK_BUSINESS_TYPES: [&str; 3] = ["gambling", "crypto_exchange", "adult_content"];

/// Currency Transaction Report threshold
pub const CTR_THRESHOLD: f64 = 10_000.0;

/// Amount under which a single transaction may be part of structuring
pub const STRUCTURING_UNIT: f64 = 5_000.0;

/// Amount above which enhanced due diligence is recommended
pub const EDD_THRESHOLD: f64 = 50_000.0;

/// 24h transaction count above which velocity is excessive
pub const VELOCITY_LIMIT: u32 = 20;

const KYC_WEIGHT: f64 = 0.3;
const AMOUNT_WEIGHT: f64 = 0.3;
const VELOCITY_WEIGHT: f64 = 0.3;
const COUNTRY_WEIGHT: f64 = 0.1;

// ============================================================================
// KYC
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KycStatus {
    NotVerified,
    Pending,
    Verified,
    Enhanced,
    #[serde(other)]
    Unknown,
}

impl KycStatus {
    /// Decode a stored status; unrecognized values map to `Unknown`
    pub fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "not_verified" | "unverified" | "none" => Self::NotVerified,
            "pending" => Self::Pending,
            "verified" | "basic" => Self::Verified,
            "enhanced" => Self::Enhanced,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotVerified => "not_verified",
            Self::Pending => "pending",
            Self::Verified => "verified",
            Self::Enhanced => "enhanced",
            Self::Unknown => "unknown",
        }
    }

    /// Component score for the weighted risk sum
    pub fn risk_score(&self) -> f64 {
        match self {
            Self::NotVerified => 0.8,
            Self::Pending => 0.5,
            Self::Verified => 0.2,
            Self::Enhanced => 0.1,
            Self::Unknown => 0.9,
        }
    }

    /// Per-transaction amount limit; `None` means unlimited
    pub fn amount_limit(&self) -> Option<f64> {
        match self {
            Self::NotVerified => Some(1_000.0),
            Self::Pending => Some(5_000.0),
            Self::Verified => Some(50_000.0),
            Self::Enhanced => None,
            Self::Unknown => Some(0.0),
        }
    }

    /// KYC is incomplete and should be finished before high-value activity
    pub fn is_incomplete(&self) -> bool {
        matches!(self, Self::NotVerified | Self::Pending)
    }
}

impl fmt::Display for KycStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Scoring
// ============================================================================

pub fn amount_score(amount: f64) -> f64 {
    if amount > CTR_THRESHOLD {
        0.9
    } else if amount > STRUCTURING_UNIT {
        0.6
    } else {
        0.2
    }
}

pub fn velocity_score(tx_count_24h: u32) -> f64 {
    if tx_count_24h > 50 {
        0.8
    } else if tx_count_24h > VELOCITY_LIMIT {
        0.5
    } else {
        0.1
    }
}

pub fn country_score(country: &str) -> f64 {
    if is_high_risk_country(country) {
        1.0
    } else {
        0.0
    }
}

pub fn is_high_risk_country(country: &str) -> bool {
    HIGH_RISK_COUNTRIES
        .iter()
        .any(|c| c.eq_ignore_ascii_case(country.trim()))
}

/// Weighted compliance risk, capped at 1.0
pub fn risk_score(kyc: KycStatus, amount: f64, tx_count_24h: u32, country: &str) -> f64 {
    let score = kyc.risk_score() * KYC_WEIGHT
        + amount_score(amount) * AMOUNT_WEIGHT
        + velocity_score(tx_count_24h) * VELOCITY_WEIGHT
        + country_score(country) * COUNTRY_WEIGHT;
    clamp_unit(score.min(1.0))
}

/// Whether an amount stays within the KYC tier limit
pub fn kyc_compliant(kyc: KycStatus, amount: f64) -> bool {
    match kyc.amount_limit() {
        Some(limit) => amount <= limit,
        None => true,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceAction {
    Approve,
    EnhancedMonitoring,
    ManualReview,
    Block,
}

impl ComplianceAction {
    pub fn from_score(score: f64) -> Self {
        if score > 0.8 {
            Self::Block
        } else if score > 0.6 {
            Self::ManualReview
        } else if score > 0.4 {
            Self::EnhancedMonitoring
        } else {
            Self::Approve
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::EnhancedMonitoring => "enhanced_monitoring",
            Self::ManualReview => "manual_review",
            Self::Block => "block",
        }
    }

    /// The transaction may proceed
    pub fn passes(&self) -> bool {
        matches!(self, Self::Approve | Self::EnhancedMonitoring)
    }
}

impl fmt::Display for ComplianceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComplianceAction {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "approve" => Ok(Self::Approve),
            "enhanced_monitoring" => Ok(Self::EnhancedMonitoring),
            "manual_review" => Ok(Self::ManualReview),
            "block" => Ok(Self::Block),
            _ => Err(RuleError::UnknownLabel {
                kind: "compliance action",
                value: s.to_string(),
            }),
        }
    }
}

// ============================================================================
// Violations
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    KycLimitExceeded,
    Structuring,
    ExcessiveVelocity,
    CtrRequired,
    KycIncomplete,
    MerchantNotFound,
}

impl ViolationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KycLimitExceeded => "kyc_limit_exceeded",
            Self::Structuring => "structuring",
            Self::ExcessiveVelocity => "excessive_velocity",
            Self::CtrRequired => "ctr_required",
            Self::KycIncomplete => "kyc_incomplete",
            Self::MerchantNotFound => "merchant_not_found",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    #[serde(rename = "type")]
    pub kind: ViolationKind,
    pub severity: Severity,
    pub description: String,
}

impl Violation {
    pub fn new(kind: ViolationKind, severity: Severity, description: impl Into<String>) -> Self {
        Self {
            kind,
            severity,
            description: description.into(),
        }
    }
}

/// Inputs to a transaction compliance evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionProfile {
    pub kyc_status: KycStatus,
    pub amount: f64,
    pub tx_count_24h: u32,
    pub country: String,
    /// Amounts of the sender's recent transactions, most recent first
    pub recent_amounts: Vec<f64>,
}

impl TransactionProfile {
    pub fn risk_score(&self) -> f64 {
        risk_score(self.kyc_status, self.amount, self.tx_count_24h, &self.country)
    }
}

/// Three recent sub-threshold transactions summing past the CTR threshold
pub fn is_structuring(recent_amounts: &[f64]) -> bool {
    if recent_amounts.len() < 3 {
        return false;
    }
    let window = &recent_amounts[..3];
    window.iter().all(|a| *a < STRUCTURING_UNIT) && window.iter().sum::<f64>() > CTR_THRESHOLD
}

/// Run every transaction violation check
///
/// `kyc_compliant` comes from the oracle or [`kyc_compliant`].
pub fn check_violations(profile: &TransactionProfile, kyc_compliant: bool) -> Vec<Violation> {
    let mut violations = Vec::new();

    if !kyc_compliant {
        violations.push(Violation::new(
            ViolationKind::KycLimitExceeded,
            Severity::High,
            format!("Amount exceeds limit for KYC level: {}", profile.kyc_status),
        ));
    }

    if is_structuring(&profile.recent_amounts) {
        violations.push(Violation::new(
            ViolationKind::Structuring,
            Severity::Critical,
            "Multiple transactions below threshold totaling over $10,000",
        ));
    }

    if profile.tx_count_24h > VELOCITY_LIMIT {
        violations.push(Violation::new(
            ViolationKind::ExcessiveVelocity,
            Severity::Medium,
            format!("{} transactions in 24 hours", profile.tx_count_24h),
        ));
    }

    if profile.amount > CTR_THRESHOLD {
        violations.push(Violation::new(
            ViolationKind::CtrRequired,
            Severity::Info,
            "Currency Transaction Report required for amount > $10,000",
        ));
    }

    violations
}

pub fn recommendations(
    risk_score: f64,
    violations: &[Violation],
    kyc: KycStatus,
    amount: f64,
) -> Vec<String> {
    let mut out = Vec::new();

    if risk_score > 0.6 {
        out.push("Consider filing SAR (Suspicious Activity Report)".to_string());
    }
    if kyc.is_incomplete() {
        out.push("Complete KYC verification before processing high-value transactions".to_string());
    }
    if amount > EDD_THRESHOLD {
        out.push("Enhanced Due Diligence (EDD) recommended".to_string());
    }
    for violation in violations {
        match violation.kind {
            ViolationKind::Structuring => {
                out.push("Investigate for potential money laundering activity".to_string())
            }
            ViolationKind::CtrRequired => out.push("File CTR within 15 days".to_string()),
            _ => {}
        }
    }

    out
}

// ============================================================================
// Merchants
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MerchantAssessment {
    pub merchant_id: String,
    pub passed: bool,
    /// `unknown` when the merchant does not exist
    pub risk_level: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_score: Option<f64>,
    pub violations: Vec<Violation>,
    pub recommendations: Vec<String>,
}

impl MerchantAssessment {
    pub fn not_found(merchant_id: impl Into<String>) -> Self {
        Self {
            merchant_id: merchant_id.into(),
            passed: false,
            risk_level: "unknown".to_string(),
            risk_score: None,
            violations: vec![Violation::new(
                ViolationKind::MerchantNotFound,
                Severity::Critical,
                "Merchant record not found",
            )],
            recommendations: Vec::new(),
        }
    }
}

/// Merchant KYC evaluation from the stored record
pub fn assess_merchant(
    merchant_id: impl Into<String>,
    kyc_status: KycStatus,
    business_type: &str,
) -> MerchantAssessment {
    let verified = kyc_status == KycStatus::Verified;
    let mut score: f64 = if verified { 0.3 } else { 0.7 };
    if HIGH_RISK_BUSINESS_TYPES.contains(&business_type) {
        score += 0.2;
    }
    let score = clamp_unit(score);

    let violations = if verified {
        Vec::new()
    } else {
        vec![Violation::new(
            ViolationKind::KycIncomplete,
            Severity::High,
            "Merchant KYC verification not completed",
        )]
    };
    let recommendations = if violations.is_empty() {
        Vec::new()
    } else {
        vec!["Complete KYC verification".to_string()]
    };

    MerchantAssessment {
        merchant_id: merchant_id.into(),
        passed: verified,
        risk_level: RiskLevel::from_score(score).as_str().to_string(),
        risk_score: Some(score),
        violations,
        recommendations,
    }
}
