//! Treasury Agent - liquidity health, payment routing and liquidity allocation
//!
//! Allocation is the one multi-agent flow in the fleet: before sizing an
//! allocation the treasury asks the compliance and fraud agents for their
//! view of the transaction over the query protocol.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use neural_agent_kernel::{Agent, AgentContext, AgentKernel, AgentProfile, HandlerError};
use neural_oracle::Reasoner;
use neural_rules::treasury::{
    self, Lane, LiquidityHealth, LiquidityPosition, RoutingPlan, TreasuryRecommendation,
};
use neural_types::{
    event_types, round_to, AgentRequest, AgentRole, Event, FraudScoreQuery,
    LiquidityAllocationRequest, RiskScoreQuery, TreasuryOptimizationRequest,
};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{json, Value};

use crate::{register_dispatch, unsupported, RequestDispatch};

const COMPLIANCE_TARGET: &str = "compliance";
const FRAUD_TARGET: &str = "fraud";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TreasuryCounters {
    pub optimizations_performed: u64,
    pub total_savings_estimated: f64,
    pub allocations_performed: u64,
    pub low_liquidity_alerts: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreasuryReport {
    pub merchant_id: String,
    pub liquidity_health: LiquidityHealth,
    pub routing_plan: RoutingPlan,
    pub estimated_savings: f64,
    pub recommendations: Vec<TreasuryRecommendation>,
    pub risk_assessment: &'static str,
    pub time_horizon: String,
    pub timestamp: DateTime<Utc>,
}

/// Allocation sized from the compliance and fraud views of a transaction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationReport {
    pub merchant_id: String,
    pub transaction_id: String,
    pub amount: f64,
    pub base_allocation: f64,
    pub compliance_risk: f64,
    pub compliance_level: String,
    pub fraud_probability: f64,
    pub fraud_recommendation: String,
    pub combined_risk: f64,
    pub multiplier: f64,
    pub allocation: f64,
    pub lane: Lane,
    /// Agents whose answer was a zero-confidence stand-in
    pub degraded: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

pub struct TreasuryAgent {
    profile: AgentProfile,
    ctx: AgentContext,
    reasoner: Arc<Reasoner>,
    counters: Mutex<TreasuryCounters>,
}

impl TreasuryAgent {
    pub fn new(ctx: AgentContext, reasoner: Arc<Reasoner>) -> Self {
        let profile = AgentProfile::for_role(AgentRole::Treasury, ctx.address().clone())
            .with_capabilities(&["treasury_optimization", "liquidity_allocation"]);
        Self {
            profile,
            ctx,
            reasoner,
            counters: Mutex::new(TreasuryCounters::default()),
        }
    }

    pub fn counters(&self) -> TreasuryCounters {
        self.counters.lock().clone()
    }

    async fn liquidity_health(&self, request: &TreasuryOptimizationRequest) -> LiquidityHealth {
        let position = LiquidityPosition::from_balances(&request.current_liquidity);
        let oracle_healthy = if position.total_balance > 0.0 {
            self.reasoner
                .liquidity_healthy(position.liquid_balance, position.total_balance)
                .await
        } else {
            false
        };
        LiquidityHealth::assess(position, oracle_healthy)
    }

    async fn routing_plan(&self, request: &TreasuryOptimizationRequest) -> RoutingPlan {
        let goal = request.optimization_goal;
        let mut plan = RoutingPlan::new(goal);
        for payment in &request.upcoming_payments {
            let lane = self
                .reasoner
                .recommend_lane(payment.amount, payment.urgency, goal)
                .await;
            plan.push(payment, lane);
        }
        plan
    }

    pub async fn optimize(&self, request: &TreasuryOptimizationRequest) -> TreasuryReport {
        tracing::info!(
            agent = %self.profile.name,
            merchant_id = %request.merchant_id,
            goal = request.optimization_goal.as_str(),
            payments = request.upcoming_payments.len(),
            "Optimizing treasury"
        );
        let health = self.liquidity_health(request).await;
        let plan = self.routing_plan(request).await;
        let savings = round_to(plan.estimated_savings(), 4);
        let recommendations = treasury::recommendations(&health, &plan, request.optimization_goal);

        {
            let mut counters = self.counters.lock();
            counters.optimizations_performed += 1;
            counters.total_savings_estimated += savings;
        }

        TreasuryReport {
            merchant_id: request.merchant_id.clone(),
            risk_assessment: health.status.risk_assessment(),
            liquidity_health: health,
            routing_plan: plan,
            estimated_savings: savings,
            recommendations,
            time_horizon: request.time_horizon.clone(),
            timestamp: Utc::now(),
        }
    }

    pub async fn allocate(&self, request: &LiquidityAllocationRequest) -> AllocationReport {
        tracing::info!(
            agent = %self.profile.name,
            merchant_id = %request.merchant_id,
            transaction_id = %request.transaction_id,
            "Consulting compliance and fraud for allocation"
        );

        let mut transaction_data = request.transaction_data.clone();
        transaction_data
            .entry("transaction_id")
            .or_insert_with(|| json!(request.transaction_id));
        transaction_data
            .entry("sender")
            .or_insert_with(|| json!(request.user_id));
        transaction_data
            .entry("estimated_amount")
            .or_insert_with(|| json!(request.amount));

        let risk_query = RiskScoreQuery::new("transaction", &request.transaction_id)
            .with_context("transaction_data", Value::Object(transaction_data));
        let fraud_query = FraudScoreQuery::new(&request.transaction_id, &request.user_id)
            .with_context("estimated_amount", json!(request.amount));

        let (risk, fraud) = tokio::join!(
            self.ctx.query_risk(COMPLIANCE_TARGET, risk_query),
            self.ctx.query_fraud(FRAUD_TARGET, fraud_query),
        );

        let mut degraded = Vec::new();
        if risk.is_degraded() {
            tracing::warn!(
                agent = %self.profile.name,
                level = %risk.risk_level,
                "Compliance answer degraded"
            );
            degraded.push(COMPLIANCE_TARGET.to_string());
        }
        if fraud.is_degraded() {
            tracing::warn!(agent = %self.profile.name, "Fraud answer degraded");
            degraded.push(FRAUD_TARGET.to_string());
        }

        let combined = treasury::combined_risk(risk.risk_score, fraud.fraud_probability);
        let multiplier = treasury::allocation_multiplier(combined);
        let base = request.base_allocation.unwrap_or(request.amount);

        self.counters.lock().allocations_performed += 1;

        AllocationReport {
            merchant_id: request.merchant_id.clone(),
            transaction_id: request.transaction_id.clone(),
            amount: request.amount,
            base_allocation: base,
            compliance_risk: risk.risk_score,
            compliance_level: risk.risk_level,
            fraud_probability: fraud.fraud_probability,
            fraud_recommendation: fraud.recommendation,
            combined_risk: round_to(combined, 3),
            multiplier,
            allocation: round_to(base * multiplier, 2),
            lane: treasury::allocation_lane(request.amount),
            degraded,
            timestamp: Utc::now(),
        }
    }
}

#[async_trait]
impl RequestDispatch for TreasuryAgent {
    async fn dispatch(&self, message_type: &str, payload: Value) -> Result<Value, HandlerError> {
        match AgentRequest::parse(message_type, payload)? {
            AgentRequest::TreasuryOptimization(request) => {
                Ok(serde_json::to_value(self.optimize(&request).await)?)
            }
            AgentRequest::LiquidityAllocation(request) => {
                Ok(serde_json::to_value(self.allocate(&request).await)?)
            }
            other => Err(unsupported(other.message_type())),
        }
    }
}

#[async_trait]
impl Agent for TreasuryAgent {
    fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    fn register_handlers(self: Arc<Self>, kernel: &mut AgentKernel) {
        register_dispatch(self, kernel, &["treasury_optimization", "liquidity_allocation"]);
    }

    fn subscriptions(&self) -> Vec<&'static str> {
        vec![event_types::LIQUIDITY_LOW]
    }

    async fn on_start(&self) -> Result<(), HandlerError> {
        tracing::info!(
            agent = %self.profile.name,
            oracle = self.reasoner.oracle_name(),
            "TreasuryAgent ready"
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

    async fn on_event(&self, event: Event) -> Result<(), HandlerError> {
        if event.event_type != event_types::LIQUIDITY_LOW {
            return Ok(());
        }
        let merchant_id = event
            .data
            .get("merchant_id")
            .and_then(Value::as_str)
            .ok_or_else(|| HandlerError::failed("liquidity.low without merchant_id"))?;

        tracing::warn!(agent = %self.profile.name, merchant_id, "Low liquidity reported");
        self.counters.lock().low_liquidity_alerts += 1;
        self.ctx.publish(
            event_types::TREASURY_OPTIMIZATION_NEEDED,
            json!({"merchant_id": merchant_id, "reason": "low_liquidity"}),
        );
        Ok(())
    }

    fn metrics(&self) -> Value {
        serde_json::to_value(self.counters()).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use neural_agent_kernel::SharedServices;
    use neural_rules::treasury::LiquidityStatus;
    use neural_types::{AgentAddress, PendingPayment, RoutingGoal};
    use std::collections::BTreeMap;

    fn agent(services: SharedServices) -> TreasuryAgent {
        let ctx = AgentContext::new("treasury", AgentAddress::from_seed("t"), services);
        TreasuryAgent::new(ctx, Arc::new(Reasoner::fallback_only()))
    }

    #[tokio::test]
    async fn test_cost_goal_routing() {
        let agent = agent(SharedServices::in_memory());
        let request = TreasuryOptimizationRequest {
            merchant_id: "m-1".to_string(),
            current_liquidity: BTreeMap::from([
                ("available".to_string(), 40.0),
                ("reserved".to_string(), 960.0),
            ]),
            upcoming_payments: vec![PendingPayment::new(10.0, 5), PendingPayment::new(200.0, 1)],
            time_horizon: "7d".to_string(),
            optimization_goal: RoutingGoal::Cost,
        };

        let report = agent.optimize(&request).await;
        assert_eq!(report.routing_plan.payments[0].lane, Lane::Fast);
        assert_eq!(report.routing_plan.payments[1].lane, Lane::Standard);
        assert!(report.estimated_savings > 0.0);
        assert_eq!(report.liquidity_health.status, LiquidityStatus::Critical);
        assert_eq!(report.risk_assessment, "high");
        let actions: Vec<_> = report.recommendations.iter().map(|r| r.action.as_str()).collect();
        assert_eq!(actions, vec!["increase_liquidity", "delay_non_urgent"]);
        assert_eq!(agent.counters().optimizations_performed, 1);
    }

    #[tokio::test]
    async fn test_allocation_without_peers_is_degraded() {
        let agent = agent(SharedServices::in_memory());
        let request = LiquidityAllocationRequest {
            merchant_id: "m-1".to_string(),
            transaction_id: "tx_1".to_string(),
            user_id: "u1".to_string(),
            amount: 20_000.0,
            base_allocation: Some(1_000.0),
            transaction_data: Default::default(),
        };

        let report = agent.allocate(&request).await;
        assert_eq!(report.degraded, vec!["compliance", "fraud"]);
        assert_eq!(report.combined_risk, 0.5);
        assert_eq!(report.multiplier, 1.5);
        assert_eq!(report.allocation, 1_500.0);
        assert_eq!(report.lane, Lane::Standard);
    }

    #[tokio::test]
    async fn test_low_liquidity_requests_optimization() {
        let services = SharedServices::in_memory();
        let mut needed = services.bus.subscribe(&[event_types::TREASURY_OPTIMIZATION_NEEDED]);
        let agent = agent(services.clone());

        agent
            .on_event(Event::new(
                "gateway",
                event_types::LIQUIDITY_LOW,
                json!({"merchant_id": "m-9"}),
            ))
            .await
            .unwrap();

        let event = needed.next().await.unwrap();
        assert_eq!(event.data["merchant_id"], "m-9");
        assert_eq!(event.data["reason"], "low_liquidity");
    }
}
