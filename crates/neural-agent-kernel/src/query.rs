//! Inter-agent query client
//!
//! A query always resolves: a missing target, a dead agent, a timeout or a
//! mismatched answer all degrade to a neutral response with confidence 0.

use std::sync::Arc;
use std::time::Duration;

use neural_types::{FraudScoreQuery, FraudScoreResponse, RiskScoreQuery, RiskScoreResponse};

use crate::directory::AgentDirectory;
use crate::error::KernelError;

pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct QueryClient {
    requester: String,
    directory: Arc<AgentDirectory>,
    timeout: Duration,
}

impl QueryClient {
    pub fn new(
        requester: impl Into<String>,
        directory: Arc<AgentDirectory>,
        timeout: Duration,
    ) -> Self {
        Self {
            requester: requester.into(),
            directory,
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn record(&self, kind: &'static str, outcome: &'static str) {
        metrics::counter!(
            "neural_agent_queries_total",
            "agent" => self.requester.clone(),
            "side" => "requester",
            "kind" => kind,
            "outcome" => outcome
        )
        .increment(1);
    }

    pub async fn risk_score(&self, target: &str, query: RiskScoreQuery) -> RiskScoreResponse {
        let Some(handle) = self.directory.resolve(target) else {
            tracing::warn!(requester = %self.requester, target, "Risk query target not found");
            self.record("risk", "unreachable");
            return RiskScoreResponse::neutral(
                &query,
                target,
                "unreachable",
                format!("Agent not found: {}", target),
            );
        };

        match tokio::time::timeout(self.timeout, handle.risk_query(query.clone())).await {
            Ok(Ok(response)) if response.query_id == query.query_id => {
                self.record("risk", "answered");
                response
            }
            Ok(Ok(response)) => {
                tracing::warn!(
                    requester = %self.requester,
                    target,
                    expected = %query.query_id,
                    got = %response.query_id,
                    "Risk answer does not match the query"
                );
                self.record("risk", "mismatch");
                RiskScoreResponse::neutral(
                    &query,
                    handle.display_name(),
                    "error",
                    "Mismatched query id",
                )
            }
            Ok(Err(e)) => {
                self.record("risk", "unreachable");
                RiskScoreResponse::neutral(
                    &query,
                    handle.display_name(),
                    "unreachable",
                    unreachable_factor(&e),
                )
            }
            Err(_) => {
                tracing::warn!(
                    requester = %self.requester,
                    target,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Risk query timed out"
                );
                self.record("risk", "timeout");
                RiskScoreResponse::neutral(
                    &query,
                    handle.display_name(),
                    "timeout",
                    format!("Query timed out after {}ms", self.timeout.as_millis()),
                )
            }
        }
    }

    pub async fn fraud_score(&self, target: &str, query: FraudScoreQuery) -> FraudScoreResponse {
        let Some(handle) = self.directory.resolve(target) else {
            tracing::warn!(requester = %self.requester, target, "Fraud query target not found");
            self.record("fraud", "unreachable");
            return FraudScoreResponse::neutral(
                &query,
                target,
                format!("Agent not found: {}", target),
            );
        };

        match tokio::time::timeout(self.timeout, handle.fraud_query(query.clone())).await {
            Ok(Ok(response)) if response.query_id == query.query_id => {
                self.record("fraud", "answered");
                response
            }
            Ok(Ok(_)) => {
                self.record("fraud", "mismatch");
                FraudScoreResponse::neutral(&query, handle.display_name(), "Mismatched query id")
            }
            Ok(Err(e)) => {
                self.record("fraud", "unreachable");
                FraudScoreResponse::neutral(&query, handle.display_name(), unreachable_factor(&e))
            }
            Err(_) => {
                tracing::warn!(
                    requester = %self.requester,
                    target,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Fraud query timed out"
                );
                self.record("fraud", "timeout");
                FraudScoreResponse::neutral(
                    &query,
                    handle.display_name(),
                    format!("Query timed out after {}ms", self.timeout.as_millis()),
                )
            }
        }
    }
}

fn unreachable_factor(err: &KernelError) -> String {
    format!("Error: {}", err)
}
