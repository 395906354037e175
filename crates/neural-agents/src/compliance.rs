//! Compliance Agent - AML/KYC checks
//!
//! Transaction checks score the sender's KYC level, amount, 24h velocity and
//! country, then run the violation checks independently of the score.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use neural_agent_kernel::{
    ttl, Agent, AgentContext, AgentKernel, AgentProfile, HandlerError, Lookup,
};
use neural_oracle::Reasoner;
use neural_rules::compliance::{
    self, ComplianceAction, KycStatus, MerchantAssessment, TransactionProfile, Violation,
};
use neural_rules::fraud::DEFAULT_AMOUNT;
use neural_rules::RiskLevel;
use neural_types::{
    event_types, AgentRequest, AgentRole, ComplianceCheckRequest, Event, MerchantFacts,
    RiskScoreQuery, RiskScoreResponse, TransactionFacts,
};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{json, Value};

use crate::{decode_map, register_dispatch, unsupported, RequestDispatch};

const DEFAULT_COUNTRY: &str = "US";
const HIGH_RISK_EVENT_THRESHOLD: f64 = 0.7;
const TRANSACTION_CONFIDENCE: f64 = 0.85;
const MERCHANT_CONFIDENCE: f64 = 0.90;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComplianceCounters {
    pub checks_performed: u64,
    pub high_risk_flags: u64,
    pub blocked_transactions: u64,
}

/// Result of a transaction compliance check
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionCheck {
    pub transaction_id: Option<String>,
    pub passed: bool,
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub action: ComplianceAction,
    pub violations: Vec<Violation>,
    pub recommendations: Vec<String>,
    pub reviewed_by: String,
    pub timestamp: DateTime<Utc>,
}

pub struct ComplianceAgent {
    profile: AgentProfile,
    ctx: AgentContext,
    reasoner: Arc<Reasoner>,
    counters: Mutex<ComplianceCounters>,
}

impl ComplianceAgent {
    pub fn new(ctx: AgentContext, reasoner: Arc<Reasoner>) -> Self {
        let profile = AgentProfile::for_role(AgentRole::Compliance, ctx.address().clone())
            .with_capabilities(&["compliance_check", "risk_score_query"]);
        Self {
            profile,
            ctx,
            reasoner,
            counters: Mutex::new(ComplianceCounters::default()),
        }
    }

    pub fn counters(&self) -> ComplianceCounters {
        self.counters.lock().clone()
    }

    /// Fill in facts the payload left out from the store
    async fn transaction_profile(&self, facts: &TransactionFacts) -> TransactionProfile {
        let kyc_status = match (&facts.kyc_status, &facts.sender) {
            (Some(status), _) => KycStatus::parse(status),
            (None, Some(sender)) => self.user_kyc_status(sender).await,
            (None, None) => KycStatus::NotVerified,
        };

        let needs_history = facts.tx_count_24h.is_none() || facts.recent_amounts.is_none();
        let history = match (&facts.sender, needs_history) {
            (Some(sender), true) => self
                .ctx
                .query_database(&Lookup::TransactionHistory {
                    user_id: sender.clone(),
                    hours: 24,
                })
                .await
                .unwrap_or_default(),
            _ => Vec::new(),
        };

        let tx_count_24h = facts
            .tx_count_24h
            .unwrap_or_else(|| u32::try_from(history.len()).unwrap_or(u32::MAX));
        let recent_amounts = facts.recent_amounts.clone().unwrap_or_else(|| {
            history
                .iter()
                .filter_map(|row| row.get("amount").and_then(Value::as_f64))
                .collect()
        });

        TransactionProfile {
            kyc_status,
            amount: facts
                .estimated_amount
                .filter(|a| *a > 0.0)
                .unwrap_or(DEFAULT_AMOUNT),
            tx_count_24h,
            country: facts
                .country
                .clone()
                .unwrap_or_else(|| DEFAULT_COUNTRY.to_string()),
            recent_amounts,
        }
    }

    /// Unknown users are treated as not verified
    async fn user_kyc_status(&self, user_id: &str) -> KycStatus {
        self.ctx
            .lookup_one(&Lookup::UserKycStatus {
                user_id: user_id.to_string(),
            })
            .await
            .and_then(|row| row.get("kyc_status").and_then(Value::as_str).map(KycStatus::parse))
            .unwrap_or(KycStatus::NotVerified)
    }

    pub async fn check_transaction(&self, facts: TransactionFacts) -> TransactionCheck {
        tracing::info!(
            agent = %self.profile.name,
            transaction_id = ?facts.transaction_id,
            "Checking transaction compliance"
        );
        let profile = self.transaction_profile(&facts).await;

        let risk_score = self
            .reasoner
            .compliance_risk(
                profile.kyc_status,
                profile.amount,
                profile.tx_count_24h,
                &profile.country,
            )
            .await;
        let action = self.reasoner.required_action(risk_score).await;
        let kyc_ok = self
            .reasoner
            .kyc_compliant(profile.kyc_status, profile.amount)
            .await;
        let violations = compliance::check_violations(&profile, kyc_ok);
        let recommendations =
            compliance::recommendations(
                risk_score,
                &violations,
                profile.kyc_status,
                profile.amount,
            );
        let risk_level = RiskLevel::from_score(risk_score);

        if risk_level.is_elevated() {
            let mut counters = self.counters.lock();
            counters.high_risk_flags += 1;
            if action == ComplianceAction::Block {
                counters.blocked_transactions += 1;
            }
        }

        let check = TransactionCheck {
            transaction_id: facts.transaction_id.clone(),
            passed: action.passes(),
            risk_score,
            risk_level,
            action,
            violations,
            recommendations,
            reviewed_by: self.profile.display_name.clone(),
            timestamp: Utc::now(),
        };

        if risk_score > HIGH_RISK_EVENT_THRESHOLD {
            self.ctx.publish(
                event_types::COMPLIANCE_HIGH_RISK,
                json!({
                    "transaction_id": check.transaction_id,
                    "risk_score": risk_score,
                    "action": action,
                    "violations": check.violations,
                }),
            );
        }

        if let Some(tx_id) = &check.transaction_id {
            match serde_json::to_value(&check) {
                Ok(value) => {
                    self.ctx
                        .cache_set(&format!("compliance:{}", tx_id), value, ttl::DECISION)
                        .await
                }
                Err(e) => {
                    tracing::warn!(agent = %self.profile.name, "Could not cache check: {}", e)
                }
            }
        }

        check
    }

    pub async fn check_merchant(&self, facts: MerchantFacts) -> MerchantAssessment {
        let merchant_id = facts.merchant_id.unwrap_or_default();
        tracing::info!(
            agent = %self.profile.name,
            merchant_id = %merchant_id,
            "Checking merchant KYC"
        );

        let merchant = self
            .ctx
            .lookup_one(&Lookup::MerchantDetails {
                merchant_id: merchant_id.clone(),
            })
            .await;
        let Some(merchant) = merchant else {
            return MerchantAssessment::not_found(merchant_id);
        };

        let kyc_status = merchant
            .get("kyc_status")
            .and_then(Value::as_str)
            .map(KycStatus::parse)
            .unwrap_or(KycStatus::Pending);
        let business_type = merchant
            .get("business_type")
            .and_then(Value::as_str)
            .unwrap_or("unknown");

        compliance::assess_merchant(merchant_id, kyc_status, business_type)
    }

    async fn compliance_check(
        &self,
        request: ComplianceCheckRequest,
    ) -> Result<Value, HandlerError> {
        let result = match request.entity_type.as_str() {
            "transaction" => {
                let mut facts: TransactionFacts = decode_map("compliance_check", request.data)?;
                if facts.transaction_id.is_none() && !request.entity_id.is_empty() {
                    facts.transaction_id = Some(request.entity_id);
                }
                serde_json::to_value(self.check_transaction(facts).await)?
            }
            "merchant" => {
                let mut facts: MerchantFacts = decode_map("compliance_check", request.data)?;
                if facts.merchant_id.is_none() && !request.entity_id.is_empty() {
                    facts.merchant_id = Some(request.entity_id);
                }
                serde_json::to_value(self.check_merchant(facts).await)?
            }
            other => json!({
                "passed": false,
                "error": format!("Unknown entity type: {}", other),
            }),
        };

        self.counters.lock().checks_performed += 1;
        Ok(result)
    }
}

#[async_trait]
impl RequestDispatch for ComplianceAgent {
    async fn dispatch(&self, message_type: &str, payload: Value) -> Result<Value, HandlerError> {
        match AgentRequest::parse(message_type, payload)? {
            AgentRequest::ComplianceCheck(request) => self.compliance_check(request).await,
            other => Err(unsupported(other.message_type())),
        }
    }
}

#[async_trait]
impl Agent for ComplianceAgent {
    fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    fn register_handlers(self: Arc<Self>, kernel: &mut AgentKernel) {
        register_dispatch(self, kernel, &["compliance_check"]);
    }

    fn subscriptions(&self) -> Vec<&'static str> {
        vec![event_types::TRANSACTION_CREATED, event_types::MERCHANT_SIGNUP]
    }

    async fn on_start(&self) -> Result<(), HandlerError> {
        tracing::info!(
            agent = %self.profile.name,
            oracle = %self.reasoner.kind(),
            "ComplianceAgent ready for monitoring"
        );
        Ok(())
    }

    async fn handle_api_request(
        &self,
        message_type: &str,
        data: Value,
    ) -> Result<Value, HandlerError> {
        self.dispatch(message_type, data).await
    }

    async fn assess_risk(&self, query: &RiskScoreQuery) -> Result<RiskScoreResponse, HandlerError> {
        tracing::info!(
            agent = %self.profile.name,
            entity_type = %query.entity_type,
            entity_id = %query.entity_id,
            "Computing risk score"
        );

        match query.entity_type.as_str() {
            "transaction" => {
                let data = match query.context.get("transaction_data") {
                    Some(Value::Object(map)) => map.clone(),
                    _ => Default::default(),
                };
                let mut facts: TransactionFacts = decode_map("risk_score_query", data)?;
                if facts.transaction_id.is_none() {
                    facts.transaction_id = Some(query.entity_id.clone());
                }
                let check = self.check_transaction(facts).await;
                let factors = check
                    .violations
                    .iter()
                    .map(|v| v.kind.as_str().to_string())
                    .collect();
                Ok(RiskScoreResponse::new(
                    query,
                    &self.profile.display_name,
                    check.risk_score,
                    check.risk_level.as_str(),
                    factors,
                    TRANSACTION_CONFIDENCE,
                ))
            }
            "merchant" => {
                let data = match query.context.get("merchant_data") {
                    Some(Value::Object(map)) => map.clone(),
                    _ => Default::default(),
                };
                let mut facts: MerchantFacts = decode_map("risk_score_query", data)?;
                if facts.merchant_id.is_none() {
                    facts.merchant_id = Some(query.entity_id.clone());
                }
                let assessment = self.check_merchant(facts).await;
                let factors = assessment
                    .violations
                    .iter()
                    .map(|v| v.kind.as_str().to_string())
                    .collect();
                Ok(RiskScoreResponse::new(
                    query,
                    &self.profile.display_name,
                    assessment.risk_score.unwrap_or(neural_types::NEUTRAL_SCORE),
                    assessment.risk_level,
                    factors,
                    MERCHANT_CONFIDENCE,
                ))
            }
            other => Ok(RiskScoreResponse::neutral(
                query,
                &self.profile.display_name,
                "unknown",
                format!("Unknown entity type: {}", other),
            )),
        }
    }

    async fn on_event(&self, event: Event) -> Result<(), HandlerError> {
        let Value::Object(data) = event.data else {
            return Err(HandlerError::failed(format!(
                "Event {} carries no object payload",
                event.event_type
            )));
        };
        match event.event_type.as_str() {
            event_types::TRANSACTION_CREATED => {
                let facts: TransactionFacts = decode_map(&event.event_type, data)?;
                self.check_transaction(facts).await;
            }
            event_types::MERCHANT_SIGNUP => {
                let facts: MerchantFacts = decode_map(&event.event_type, data)?;
                self.check_merchant(facts).await;
            }
            _ => {}
        }
        Ok(())
    }

    fn metrics(&self) -> Value {
        serde_json::to_value(self.counters()).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neural_agent_kernel::{InMemoryStore, SharedServices};
    use neural_types::AgentAddress;

    fn agent_with_store(store: InMemoryStore) -> ComplianceAgent {
        let services = SharedServices::in_memory().with_store(Arc::new(store));
        let ctx = AgentContext::new("compliance", AgentAddress::from_seed("c"), services);
        ComplianceAgent::new(ctx, Arc::new(Reasoner::fallback_only()))
    }

    #[tokio::test]
    async fn test_missing_facts_come_from_the_store() {
        let store = InMemoryStore::new();
        store.insert_user("alice", json!({"kyc_status": "verified"}));
        for (i, amount) in [4_000.0, 4_500.0, 3_000.0].iter().enumerate() {
            store.insert_transaction(
                format!("tx_{}", i),
                json!({"sender": "alice", "amount": amount}),
            );
        }
        let agent = agent_with_store(store);

        let facts = TransactionFacts {
            transaction_id: Some("tx_new".into()),
            sender: Some("alice".into()),
            estimated_amount: Some(2_000.0),
            ..Default::default()
        };
        let check = agent.check_transaction(facts).await;

        let kinds: Vec<_> = check.violations.iter().map(|v| v.kind.as_str()).collect();
        assert_eq!(kinds, vec!["structuring"]);
        assert!(check
            .recommendations
            .iter()
            .any(|r| r.contains("money laundering")));
    }

    #[tokio::test]
    async fn test_unknown_user_is_not_verified() {
        let agent = agent_with_store(InMemoryStore::new());
        let facts = TransactionFacts {
            sender: Some("ghost".into()),
            estimated_amount: Some(2_000.0),
            ..Default::default()
        };
        let check = agent.check_transaction(facts).await;
        assert!(check
            .violations
            .iter()
            .any(|v| v.kind.as_str() == "kyc_limit_exceeded"));
    }

    #[tokio::test]
    async fn test_merchant_high_risk_business() {
        let store = InMemoryStore::new();
        store.insert_merchant("m1", json!({"kyc_status": "verified", "business_type": "gambling"}));
        let agent = agent_with_store(store);

        let assessment = agent
            .check_merchant(MerchantFacts {
                merchant_id: Some("m1".into()),
            })
            .await;
        assert!(assessment.passed);
        assert_eq!(assessment.risk_level, "medium");
        assert!((assessment.risk_score.unwrap() - 0.5).abs() < 1e-9);
    }
}
