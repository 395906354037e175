//! Growth Agent - merchant performance analysis and growth suggestions

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use neural_agent_kernel::{ttl, Agent, AgentContext, AgentKernel, AgentProfile, HandlerError};
use neural_oracle::Reasoner;
use neural_rules::growth::{
    self, PerformanceAnalysis, Suggestion, SuggestionKind, AVG_TX_FREQUENCY_DAYS,
};
use neural_types::{event_types, AgentRequest, AgentRole, Event, GrowthSuggestionRequest};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;

use crate::{register_dispatch, unsupported, RequestDispatch};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GrowthCounters {
    pub suggestions_generated: u64,
    pub milestones: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GrowthReport {
    pub merchant_id: String,
    pub performance_analysis: PerformanceAnalysis,
    pub suggestions: Vec<Suggestion>,
    pub predicted_impact: BTreeMap<SuggestionKind, f64>,
    pub priority_ranking: Vec<SuggestionKind>,
    pub implementation_difficulty: BTreeMap<SuggestionKind, &'static str>,
    pub timeframe_analyzed: String,
    pub timestamp: DateTime<Utc>,
}

pub struct GrowthAgent {
    profile: AgentProfile,
    ctx: AgentContext,
    reasoner: Arc<Reasoner>,
    counters: Mutex<GrowthCounters>,
}

impl GrowthAgent {
    pub fn new(ctx: AgentContext, reasoner: Arc<Reasoner>) -> Self {
        let profile = AgentProfile::for_role(AgentRole::Growth, ctx.address().clone())
            .with_capabilities(&["growth_suggestion"]);
        Self {
            profile,
            ctx,
            reasoner,
            counters: Mutex::new(GrowthCounters::default()),
        }
    }

    pub fn counters(&self) -> GrowthCounters {
        self.counters.lock().clone()
    }

    pub async fn suggest(&self, request: &GrowthSuggestionRequest) -> GrowthReport {
        tracing::info!(
            agent = %self.profile.name,
            merchant_id = %request.merchant_id,
            "Generating growth suggestions"
        );
        let metrics = &request.metrics;

        let is_healthy = self
            .reasoner
            .healthy_growth(metrics.revenue, metrics.previous_revenue)
            .await;
        let churn = self
            .reasoner
            .churn_risk(metrics.days_since_last_transaction, AVG_TX_FREQUENCY_DAYS)
            .await;
        let analysis = growth::analyze(metrics, is_healthy, churn);

        let suggestions = growth::suggestions_for_goals(&request.goals, metrics, &analysis);
        let predicted_impact = growth::predict_impact(&suggestions, metrics.revenue);
        let priority_ranking = growth::rank(&suggestions, &predicted_impact);
        let implementation_difficulty = growth::difficulty(&suggestions);

        self.counters.lock().suggestions_generated += suggestions.len() as u64;

        let report = GrowthReport {
            merchant_id: request.merchant_id.clone(),
            performance_analysis: analysis,
            suggestions,
            predicted_impact,
            priority_ranking,
            implementation_difficulty,
            timeframe_analyzed: request.timeframe.clone(),
            timestamp: Utc::now(),
        };
        if let Ok(value) = serde_json::to_value(&report) {
            self.ctx
                .cache_set(&format!("growth:{}", report.merchant_id), value, ttl::SHORT)
                .await;
        }
        report
    }
}

#[async_trait]
impl RequestDispatch for GrowthAgent {
    async fn dispatch(&self, message_type: &str, payload: Value) -> Result<Value, HandlerError> {
        match AgentRequest::parse(message_type, payload)? {
            AgentRequest::GrowthSuggestion(request) => {
                Ok(serde_json::to_value(self.suggest(&request).await)?)
            }
            other => Err(unsupported(other.message_type())),
        }
    }
}

#[async_trait]
impl Agent for GrowthAgent {
    fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    fn register_handlers(self: Arc<Self>, kernel: &mut AgentKernel) {
        register_dispatch(self, kernel, &["growth_suggestion"]);
    }

    fn subscriptions(&self) -> Vec<&'static str> {
        vec![event_types::MERCHANT_MILESTONE]
    }

    async fn handle_api_request(
        &self,
        message_type: &str,
        data: Value,
    ) -> Result<Value, HandlerError> {
        self.dispatch(message_type, data).await
    }

    async fn on_event(&self, event: Event) -> Result<(), HandlerError> {
        if event.event_type == event_types::MERCHANT_MILESTONE {
            self.counters.lock().milestones += 1;
            tracing::info!(agent = %self.profile.name, data = %event.data, "Merchant milestone");
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
    use neural_types::{AgentAddress, GrowthGoal, MerchantMetrics};
    use serde_json::json;

    fn agent() -> GrowthAgent {
        let ctx =
            AgentContext::new("growth", AgentAddress::from_seed("g"), SharedServices::in_memory());
        GrowthAgent::new(ctx, Arc::new(Reasoner::fallback_only()))
    }

    #[tokio::test]
    async fn test_quiet_merchant_gets_re_engagement() {
        let agent = agent();
        let request = GrowthSuggestionRequest {
            merchant_id: "m-1".to_string(),
            metrics: MerchantMetrics {
                transactions: 10,
                revenue: 2_000.0,
                customers: 8,
                previous_revenue: 2_000.0,
                days_since_last_transaction: 30.0,
            },
            timeframe: "30d".to_string(),
            goals: vec![GrowthGoal::ReduceChurn, GrowthGoal::ImproveConversion],
        };

        let report = agent.suggest(&request).await;
        assert!(!report.performance_analysis.is_healthy_growth);
        assert_eq!(report.performance_analysis.churn_risk, 0.8);
        assert_eq!(
            report.priority_ranking,
            vec![
                SuggestionKind::ReEngagement,
                SuggestionKind::CustomerSupport,
                SuggestionKind::CheckoutOptimization
            ]
        );
        assert_eq!(agent.counters().suggestions_generated, 3);
    }

    #[tokio::test]
    async fn test_report_wire_shape() {
        let value = agent()
            .dispatch(
                "growth_suggestion",
                json!({
                    "merchant_id": "m-2",
                    "metrics": {
                        "transactions": 100,
                        "revenue": 5000.0,
                        "customers": 150,
                        "previous_revenue": 4000.0
                    }
                }),
            )
            .await
            .unwrap();
        assert_eq!(value["predicted_impact"]["loyalty_program"], 1_000.0);
        assert_eq!(value["priority_ranking"][0], "loyalty_program");
        assert_eq!(value["timeframe_analyzed"], "30d");
    }

    #[tokio::test]
    async fn test_milestones_are_counted() {
        let agent = agent();
        agent
            .on_event(Event::new(
                "gateway",
                event_types::MERCHANT_MILESTONE,
                json!({"merchant_id": "m-1"}),
            ))
            .await
            .unwrap();
        assert_eq!(agent.counters().milestones, 1);
    }
}
