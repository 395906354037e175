//! Neural Oracle - Knowledge Oracle Adapter
//!
//! A capability-abstracted interface to an external reasoning engine that
//! answers a fixed set of named judgments (compliance risk, required action,
//! KYC compliance, fraud probability and classification, fraud action,
//! routing, liquidity health, growth health, churn risk).
//!
//! ## Oracles
//! - `UnavailableOracle` (default): fails fast on every call
//! - `RuleOracle`: local, answers with the deterministic rule engines
//! - `HttpOracle`: remote engine at `NEURAL_ORACLE_URL`
//!
//! ## Key Design Principles
//!
//! 1. Agents never branch on oracle availability; they call the [`Reasoner`]
//! 2. Any oracle failure falls back to the deterministic rule engine
//! 3. Oracle failures are logged and counted, never surfaced to callers

pub mod providers;
pub mod reasoner;
pub mod types;

pub use providers::*;
pub use reasoner::*;
pub use types::*;
