//! Fraud Agent - real-time fraud scoring
//!
//! The probability is an ensemble of the rule score (oracle or fallback) and
//! a pluggable anomaly model. Training the model is not this agent's job; it
//! is handed an [`AnomalyScorer`] that is already fitted, or the neutral one.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Timelike, Utc};
use neural_agent_kernel::{
    ttl, Agent, AgentContext, AgentKernel, AgentProfile, HandlerError, Lookup,
};
use neural_oracle::Reasoner;
use neural_rules::fraud::{
    self, AnomalyScorer, FraudAction, FraudSignals, NeutralScorer, DEFAULT_AMOUNT,
    DEFAULT_AVG_AMOUNT, DEFAULT_MINUTES_SINCE_LAST_TX, DEFAULT_THRESHOLD,
};
use neural_types::{
    clamp_unit, event_types, round_to, AgentRequest, AgentRole, Event, FalsePositiveReport,
    FraudAnalysisRequest, FraudFactor, FraudScoreQuery, FraudScoreResponse,
};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{json, Value};

use crate::{decode_map, register_dispatch, unsupported, RequestDispatch};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FraudCounters {
    pub analyses_performed: u64,
    pub fraud_detected: u64,
    pub false_positives: u64,
    pub blocked_count: u64,
    pub model_trained: bool,
}

/// Result of one fraud analysis
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FraudAnalysis {
    pub transaction_id: String,
    pub fraud_probability: f64,
    pub fraud_type: Option<String>,
    pub confidence: f64,
    pub factors: Vec<FraudFactor>,
    pub action_recommended: FraudAction,
    pub rule_score: f64,
    pub model_score: f64,
    pub timestamp: DateTime<Utc>,
}

pub struct FraudAgent {
    profile: AgentProfile,
    ctx: AgentContext,
    reasoner: Arc<Reasoner>,
    scorer: Arc<dyn AnomalyScorer>,
    threshold: f64,
    counters: Mutex<FraudCounters>,
}

impl FraudAgent {
    pub fn new(ctx: AgentContext, reasoner: Arc<Reasoner>) -> Self {
        let profile = AgentProfile::for_role(AgentRole::Fraud, ctx.address().clone())
            .with_capabilities(&["fraud_analysis", "report_false_positive", "fraud_score_query"]);
        Self {
            profile,
            ctx,
            reasoner,
            scorer: Arc::new(NeutralScorer),
            threshold: DEFAULT_THRESHOLD,
            counters: Mutex::new(FraudCounters::default()),
        }
    }

    pub fn with_scorer(mut self, scorer: Arc<dyn AnomalyScorer>) -> Self {
        self.counters.lock().model_trained = scorer.is_trained();
        self.scorer = scorer;
        self
    }

    /// Detection threshold, clamped into `[0, 1]`
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = clamp_unit(threshold);
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn counters(&self) -> FraudCounters {
        self.counters.lock().clone()
    }

    /// Request values win over store lookups, which win over defaults
    async fn extract_signals(&self, request: &FraudAnalysisRequest) -> FraudSignals {
        let supplied = request.historical_data.clone().unwrap_or_default();

        let needs_history =
            supplied.tx_count_24h.is_none() || supplied.minutes_since_last_tx.is_none();
        let history = if needs_history {
            self.ctx
                .query_database(&Lookup::TransactionHistory {
                    user_id: request.user_id.clone(),
                    hours: 24,
                })
                .await
                .unwrap_or_default()
        } else {
            Vec::new()
        };

        let avg_amount = match supplied.avg_amount {
            Some(avg) => avg,
            None => self
                .ctx
                .lookup_one(&Lookup::UserProfile {
                    user_id: request.user_id.clone(),
                })
                .await
                .and_then(|row| row.get("avg_tx_amount").and_then(Value::as_f64))
                .filter(|avg| *avg > 0.0)
                .unwrap_or(DEFAULT_AVG_AMOUNT),
        };

        let minutes_since_last_tx = supplied.minutes_since_last_tx.unwrap_or_else(|| {
            history
                .first()
                .and_then(|row| row.get("created_at"))
                .and_then(Value::as_str)
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|ts| (Utc::now() - ts.with_timezone(&Utc)).num_seconds() as f64 / 60.0)
                .unwrap_or(DEFAULT_MINUTES_SINCE_LAST_TX)
        });

        FraudSignals {
            amount: request.estimated_amount.unwrap_or(DEFAULT_AMOUNT),
            avg_amount,
            tx_count_24h: supplied
                .tx_count_24h
                .unwrap_or_else(|| u32::try_from(history.len()).unwrap_or(u32::MAX)),
            hour: request.hour.unwrap_or_else(|| Utc::now().hour()),
            new_device: request.transaction_pattern.new_device,
            new_location: request.transaction_pattern.new_location,
            minutes_since_last_tx,
        }
    }

    pub async fn analyze(&self, request: &FraudAnalysisRequest) -> FraudAnalysis {
        tracing::info!(
            agent = %self.profile.name,
            transaction_id = %request.transaction_id,
            "Analyzing fraud"
        );
        let signals = self.extract_signals(request).await;

        let rule_score = self.reasoner.fraud_rule_score(&signals).await;
        let model_score = clamp_unit(self.scorer.score(&signals));
        let probability = fraud::ensemble(rule_score, model_score);
        let fraud_type = self.reasoner.classify_fraud(&signals, probability).await;
        let action = self.reasoner.fraud_action(probability).await;

        if action == FraudAction::Block {
            self.counters.lock().blocked_count += 1;
        }

        let analysis = FraudAnalysis {
            transaction_id: request.transaction_id.clone(),
            fraud_probability: round_to(probability, 3),
            fraud_type,
            confidence: round_to(fraud::confidence(rule_score, model_score), 3),
            factors: fraud::fraud_factors(&signals),
            action_recommended: action,
            rule_score: round_to(rule_score, 3),
            model_score: round_to(model_score, 3),
            timestamp: Utc::now(),
        };

        match serde_json::to_value(&analysis) {
            Ok(value) => {
                self.ctx
                    .cache_set(&format!("fraud:{}", analysis.transaction_id), value, ttl::DECISION)
                    .await
            }
            Err(e) => tracing::warn!(agent = %self.profile.name, "Could not cache analysis: {}", e),
        }

        analysis
    }

    async fn fraud_analysis(&self, request: FraudAnalysisRequest) -> Result<Value, HandlerError> {
        let analysis = self.analyze(&request).await;
        {
            let mut counters = self.counters.lock();
            counters.analyses_performed += 1;
            if analysis.fraud_probability > self.threshold {
                counters.fraud_detected += 1;
            }
        }
        Ok(serde_json::to_value(analysis)?)
    }

    fn report_false_positive(&self, report: FalsePositiveReport) -> Value {
        let total = {
            let mut counters = self.counters.lock();
            counters.false_positives += 1;
            counters.false_positives
        };
        tracing::info!(
            agent = %self.profile.name,
            transaction_id = %report.transaction_id,
            reason = ?report.reason,
            "False positive reported"
        );
        json!({
            "transaction_id": report.transaction_id,
            "recorded": true,
            "false_positives": total,
        })
    }
}

#[async_trait]
impl RequestDispatch for FraudAgent {
    async fn dispatch(&self, message_type: &str, payload: Value) -> Result<Value, HandlerError> {
        match AgentRequest::parse(message_type, payload)? {
            AgentRequest::FraudAnalysis(request) => self.fraud_analysis(request).await,
            AgentRequest::ReportFalsePositive(report) => Ok(self.report_false_positive(report)),
            other => Err(unsupported(other.message_type())),
        }
    }
}

#[async_trait]
impl Agent for FraudAgent {
    fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    fn register_handlers(self: Arc<Self>, kernel: &mut AgentKernel) {
        register_dispatch(self, kernel, &["fraud_analysis", "report_false_positive"]);
    }

    fn subscriptions(&self) -> Vec<&'static str> {
        vec![event_types::TRANSACTION_CREATED]
    }

    async fn on_start(&self) -> Result<(), HandlerError> {
        tracing::info!(
            agent = %self.profile.name,
            model = %self.scorer.name(),
            trained = self.scorer.is_trained(),
            threshold = self.threshold,
            "FraudAgent ready for real-time detection"
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

    async fn assess_fraud(
        &self,
        query: &FraudScoreQuery,
    ) -> Result<FraudScoreResponse, HandlerError> {
        tracing::info!(
            agent = %self.profile.name,
            transaction_id = %query.transaction_id,
            "Computing fraud score"
        );
        let mut request = FraudAnalysisRequest::new(&query.transaction_id, &query.user_id);
        request.estimated_amount = query.context.get("estimated_amount").and_then(Value::as_f64);

        let analysis = self.analyze(&request).await;
        Ok(FraudScoreResponse {
            query_id: query.query_id.clone(),
            transaction_id: query.transaction_id.clone(),
            fraud_probability: analysis.fraud_probability,
            fraud_type: analysis.fraud_type,
            factors: if query.include_factors {
                analysis.factors
            } else {
                Vec::new()
            },
            recommendation: analysis.action_recommended.as_str().to_string(),
            confidence: analysis.confidence,
            responding_agent: self.profile.display_name.clone(),
            timestamp: Utc::now(),
        })
    }

    async fn on_event(&self, event: Event) -> Result<(), HandlerError> {
        if event.event_type != event_types::TRANSACTION_CREATED {
            return Ok(());
        }
        let Value::Object(data) = event.data else {
            return Err(HandlerError::failed("transaction.created carries no object payload"));
        };
        let request: FraudAnalysisRequest = decode_map(&event.event_type, data)?;
        let analysis = self.analyze(&request).await;

        if analysis.fraud_probability > self.threshold {
            tracing::warn!(
                agent = %self.profile.name,
                transaction_id = %analysis.transaction_id,
                probability = analysis.fraud_probability,
                "Fraud detected"
            );
            self.ctx.publish(
                event_types::FRAUD_DETECTED,
                json!({
                    "transaction_id": analysis.transaction_id,
                    "fraud_probability": analysis.fraud_probability,
                    "fraud_type": analysis.fraud_type,
                    "action_recommended": analysis.action_recommended,
                }),
            );
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
    use neural_agent_kernel::SharedServices;
    use neural_types::{AgentAddress, FraudHistory, TransactionPattern};

    /// Fitted model stand-in with a fixed score
    struct FixedScorer(f64);

    impl AnomalyScorer for FixedScorer {
        fn name(&self) -> &str {
            "fixed"
        }

        fn is_trained(&self) -> bool {
            true
        }

        fn score(&self, _signals: &FraudSignals) -> f64 {
            self.0
        }
    }

    fn agent() -> FraudAgent {
        let ctx =
            AgentContext::new("fraud", AgentAddress::from_seed("f"), SharedServices::in_memory());
        FraudAgent::new(ctx, Arc::new(Reasoner::fallback_only()))
    }

    fn suspicious_request() -> FraudAnalysisRequest {
        let mut request = FraudAnalysisRequest::new("tx_1", "u1");
        request.estimated_amount = Some(1_000.0);
        request.hour = Some(2);
        request.transaction_pattern = TransactionPattern {
            new_device: true,
            ..Default::default()
        };
        request.historical_data = Some(FraudHistory {
            avg_amount: Some(500.0),
            tx_count_24h: Some(25),
            minutes_since_last_tx: Some(3.0),
        });
        request
    }

    #[tokio::test]
    async fn test_neutral_model_challenges() {
        let analysis = agent().analyze(&suspicious_request()).await;
        assert!(analysis.rule_score > 0.9);
        assert_eq!(analysis.model_score, 0.5);
        assert_eq!(analysis.action_recommended, FraudAction::Challenge);
        assert!(analysis.fraud_type.is_some());
    }

    #[tokio::test]
    async fn test_confident_model_blocks() {
        let agent = agent().with_scorer(Arc::new(FixedScorer(1.0)));
        assert!(agent.counters().model_trained);

        let analysis = agent.analyze(&suspicious_request()).await;
        assert_eq!(analysis.action_recommended, FraudAction::Block);
        assert_eq!(agent.counters().blocked_count, 1);
    }

    #[tokio::test]
    async fn test_false_positive_reports_are_counted() {
        let agent = agent();
        let value = agent
            .dispatch("report_false_positive", json!({"transaction_id": "tx_9"}))
            .await
            .unwrap();
        assert_eq!(value["false_positives"], 1);
        assert_eq!(agent.counters().false_positives, 1);
    }

    #[tokio::test]
    async fn test_query_honours_include_factors() {
        let agent = agent();
        let mut query = FraudScoreQuery::new("tx_2", "u2");
        query.include_factors = false;
        let response = agent.assess_fraud(&query).await.unwrap();
        assert_eq!(response.query_id, query.query_id);
        assert!(response.factors.is_empty());
        assert!(response.confidence > 0.0);
    }
}
