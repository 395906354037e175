//! Agent identity types
//!
//! Addresses are derived deterministically from a seed phrase so that every
//! restart of the fleet produces the same routing keys.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::error::ProtocolError;

const ADDRESS_PREFIX: &str = "agent1q";
const ADDRESS_HEX_LEN: usize = 52;

/// Stable routing key of an agent
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentAddress(String);

impl AgentAddress {
    /// Derive the address for a seed phrase
    pub fn from_seed(seed: &str) -> Self {
        let digest = Sha256::digest(seed.as_bytes());
        let encoded = hex::encode(digest);
        Self(format!("{}{}", ADDRESS_PREFIX, &encoded[..ADDRESS_HEX_LEN]))
    }

    /// Wrap an address received from the outside (config, CLI)
    pub fn from_raw(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// Whether a string has the shape of a derived address
    pub fn looks_like_address(value: &str) -> bool {
        value.starts_with(ADDRESS_PREFIX) && value.len() == ADDRESS_PREFIX.len() + ADDRESS_HEX_LEN
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for AgentAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The specialized roles of the fleet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Compliance,
    Fraud,
    Treasury,
    Growth,
    Support,
}

impl AgentRole {
    pub const ALL: [AgentRole; 5] = [
        AgentRole::Compliance,
        AgentRole::Fraud,
        AgentRole::Treasury,
        AgentRole::Growth,
        AgentRole::Support,
    ];

    /// Short routing name used by the manager
    pub fn name(&self) -> &'static str {
        match self {
            Self::Compliance => "compliance",
            Self::Fraud => "fraud",
            Self::Treasury => "treasury",
            Self::Growth => "growth",
            Self::Support => "support",
        }
    }

    /// Human-facing agent name, reported as `agent_id` in responses
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Compliance => "ComplianceAgent",
            Self::Fraud => "FraudAgent",
            Self::Treasury => "TreasuryAgent",
            Self::Growth => "GrowthAgent",
            Self::Support => "SupportAgent",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Compliance => "AML/KYC monitoring and compliance risk scoring",
            Self::Fraud => "Transaction fraud detection and prevention",
            Self::Treasury => "Liquidity health and payment routing optimization",
            Self::Growth => "Merchant analytics and growth suggestions",
            Self::Support => "Customer support and chat query handling",
        }
    }

    /// Environment variable holding a role-specific seed
    pub fn seed_env(&self) -> &'static str {
        match self {
            Self::Compliance => "COMPLIANCE_AGENT_SEED",
            Self::Fraud => "FRAUD_AGENT_SEED",
            Self::Treasury => "TREASURY_AGENT_SEED",
            Self::Growth => "GROWTH_AGENT_SEED",
            Self::Support => "SUPPORT_AGENT_SEED",
        }
    }

    /// Seed used when neither a role seed nor a base seed is configured
    pub fn default_seed(&self) -> String {
        format!("{}_agent_seed_phrase", self.name())
    }

    /// Seed derived from a fleet-wide base seed
    pub fn seed_from_base(&self, base_seed: &str) -> String {
        format!("{}_{}", base_seed, self.name())
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AgentRole {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "compliance" | "complianceagent" => Ok(Self::Compliance),
            "fraud" | "fraudagent" => Ok(Self::Fraud),
            "treasury" | "treasuryagent" => Ok(Self::Treasury),
            "growth" | "growthagent" => Ok(Self::Growth),
            "support" | "supportagent" => Ok(Self::Support),
            other => Err(ProtocolError::UnknownRole(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_is_deterministic() {
        let a = AgentAddress::from_seed("neural_test_seed_12345_compliance");
        let b = AgentAddress::from_seed("neural_test_seed_12345_compliance");
        let c = AgentAddress::from_seed("neural_test_seed_12345_fraud");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(AgentAddress::looks_like_address(a.as_str()));
    }

    #[test]
    fn test_role_seeds() {
        assert_eq!(AgentRole::Treasury.default_seed(), "treasury_agent_seed_phrase");
        assert_eq!(AgentRole::Growth.seed_from_base("base"), "base_growth");
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("FraudAgent".parse::<AgentRole>().unwrap(), AgentRole::Fraud);
        assert_eq!("support".parse::<AgentRole>().unwrap(), AgentRole::Support);
        assert!("ledger".parse::<AgentRole>().is_err());
    }
}
