//! Support Agent - query classification and answers
//!
//! Serves two message types: `support_query` from the gateway and
//! `chat_message` from conversational clients. A chat fault still answers,
//! with an apology at confidence 0.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use neural_agent_kernel::{Agent, AgentContext, AgentKernel, AgentProfile, HandlerError, Lookup};
use neural_rules::support::{self, QueryCategory, SupportAnswer};
use neural_types::{
    round_to, AgentRequest, AgentRole, ChatAcknowledgement, ChatMessage, SupportQueryRequest,
};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::{register_dispatch, unsupported, RequestDispatch};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SupportCounters {
    pub queries_handled: u64,
    pub escalations: u64,
}

impl SupportCounters {
    pub fn escalation_rate(&self) -> f64 {
        round_to(self.escalations as f64 / self.queries_handled.max(1) as f64, 3)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SupportReply {
    pub query_id: String,
    pub category: QueryCategory,
    pub answer: String,
    pub confidence: f64,
    pub sources: Vec<String>,
    pub escalate: bool,
    pub suggested_actions: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

pub struct SupportAgent {
    profile: AgentProfile,
    ctx: AgentContext,
    counters: Mutex<SupportCounters>,
}

impl SupportAgent {
    pub fn new(ctx: AgentContext) -> Self {
        let profile = AgentProfile::for_role(AgentRole::Support, ctx.address().clone())
            .with_capabilities(&["support_query", "chat_message"]);
        Self {
            profile,
            ctx,
            counters: Mutex::new(SupportCounters::default()),
        }
    }

    pub fn counters(&self) -> SupportCounters {
        self.counters.lock().clone()
    }

    async fn first_row(&self, lookup: &Lookup) -> Result<Option<Map<String, Value>>, HandlerError> {
        Ok(self.ctx.query_database(lookup).await?.into_iter().next())
    }

    async fn transaction_answer(
        &self,
        context: &Map<String, Value>,
    ) -> Result<SupportAnswer, HandlerError> {
        let Some(tx_id) = context.get("transaction_id").and_then(Value::as_str) else {
            return Ok(support::transaction_help());
        };
        let row = self
            .first_row(&Lookup::TransactionDetails {
                transaction_id: tx_id.to_string(),
            })
            .await?;
        Ok(match row {
            Some(tx) => {
                let status = tx.get("status").and_then(Value::as_str).unwrap_or("unknown");
                support::transaction_status_answer(tx_id, status)
            }
            None => support::transaction_not_found(tx_id),
        })
    }

    async fn account_answer(
        &self,
        query: &str,
        user_id: &str,
    ) -> Result<SupportAnswer, HandlerError> {
        let row = self
            .first_row(&Lookup::UserKycStatus {
                user_id: user_id.to_string(),
            })
            .await?;
        Ok(match row {
            Some(user) => {
                let kyc = user
                    .get("kyc_status")
                    .and_then(Value::as_str)
                    .unwrap_or("not_verified");
                support::account_answer(query, user_id, kyc)
            }
            None => support::account_not_found(),
        })
    }

    /// Classify then answer; an explicit `query_type` hint wins over keywords
    pub async fn answer(
        &self,
        text: &str,
        user_id: &str,
        hint: Option<&str>,
        context: &Map<String, Value>,
    ) -> Result<(QueryCategory, SupportAnswer), HandlerError> {
        let category = hint
            .and_then(QueryCategory::from_label)
            .unwrap_or_else(|| QueryCategory::classify(text));
        tracing::debug!(
            agent = %self.profile.name,
            category = category.as_str(),
            "Answering query"
        );

        let answer = match category {
            QueryCategory::TransactionStatus => self.transaction_answer(context).await?,
            QueryCategory::Account => self.account_answer(text, user_id).await?,
            QueryCategory::Faq => support::faq_answer(text),
            QueryCategory::General => support::general_answer(),
        };
        Ok((category, answer))
    }

    async fn support_query(
        &self,
        request: SupportQueryRequest,
    ) -> Result<SupportReply, HandlerError> {
        let (category, answer) = self
            .answer(
                &request.query_text,
                &request.user_id,
                request.query_type.as_deref(),
                &request.context,
            )
            .await?;
        let escalate = support::should_escalate(answer.confidence, request.urgency);

        {
            let mut counters = self.counters.lock();
            counters.queries_handled += 1;
            if escalate {
                counters.escalations += 1;
            }
        }
        if escalate {
            tracing::info!(
                agent = %self.profile.name,
                query_id = %request.query_id,
                "Escalating to human support"
            );
        }

        Ok(SupportReply {
            query_id: request.query_id,
            category,
            answer: answer.answer,
            confidence: answer.confidence,
            sources: answer.sources,
            escalate,
            suggested_actions: support::suggest_actions(&request.query_text),
            timestamp: Utc::now(),
        })
    }

    pub async fn chat(&self, message: ChatMessage) -> ChatAcknowledgement {
        let answer = match self
            .answer(&message.message, &message.user_id, None, &message.context)
            .await
        {
            Ok((_, answer)) => {
                self.counters.lock().queries_handled += 1;
                answer
            }
            Err(e) => {
                tracing::error!(
                    agent = %self.profile.name,
                    user_id = %message.user_id,
                    "Chat failed: {}",
                    e
                );
                support::chat_error_answer()
            }
        };
        ChatAcknowledgement {
            message: answer.answer,
            confidence: answer.confidence,
            sources: answer.sources,
        }
    }
}

#[async_trait]
impl RequestDispatch for SupportAgent {
    async fn dispatch(&self, message_type: &str, payload: Value) -> Result<Value, HandlerError> {
        match AgentRequest::parse(message_type, payload)? {
            AgentRequest::SupportQuery(request) => {
                Ok(serde_json::to_value(self.support_query(request).await?)?)
            }
            AgentRequest::ChatMessage(message) => {
                Ok(serde_json::to_value(self.chat(message).await)?)
            }
            other => Err(unsupported(other.message_type())),
        }
    }
}

#[async_trait]
impl Agent for SupportAgent {
    fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    fn register_handlers(self: Arc<Self>, kernel: &mut AgentKernel) {
        register_dispatch(self, kernel, &["support_query", "chat_message"]);
    }

    async fn on_start(&self) -> Result<(), HandlerError> {
        tracing::info!(
            agent = %self.profile.name,
            address = %self.profile.address,
            "SupportAgent ready for chat"
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

    fn metrics(&self) -> Value {
        let counters = self.counters();
        json!({
            "queries_handled": counters.queries_handled,
            "escalations": counters.escalations,
            "escalation_rate": counters.escalation_rate(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neural_agent_kernel::{DataStore, InMemoryStore, Row, SharedServices, StoreError};
    use neural_types::AgentAddress;

    struct BrokenStore;

    #[async_trait]
    impl DataStore for BrokenStore {
        async fn query(&self, _lookup: &Lookup) -> Result<Vec<Row>, StoreError> {
            Err(StoreError::Unavailable {
                message: "connection refused".to_string(),
            })
        }
    }

    fn agent_with(store: Arc<dyn DataStore>) -> SupportAgent {
        let services = SharedServices::in_memory().with_store(store);
        SupportAgent::new(AgentContext::new("support", AgentAddress::from_seed("s"), services))
    }

    #[tokio::test]
    async fn test_transaction_status_from_store() {
        let store = InMemoryStore::new();
        store.insert_transaction(
            "tx_7",
            json!({"user_id": "u1", "status": "COMPLETED", "amount": 10.0}),
        );
        let agent = agent_with(Arc::new(store));

        let value = agent
            .dispatch(
                "support_query",
                json!({
                    "user_id": "u1",
                    "query_text": "What is the status of my payment?",
                    "context": {"transaction_id": "tx_7"}
                }),
            )
            .await
            .unwrap();
        assert_eq!(value["category"], "transaction_status");
        assert_eq!(value["confidence"], 0.9);
        assert_eq!(value["escalate"], false);
        assert!(value["answer"].as_str().unwrap().contains("successfully completed"));
    }

    #[tokio::test]
    async fn test_critical_urgency_escalates() {
        let agent = agent_with(Arc::new(InMemoryStore::new()));
        let value = agent
            .dispatch(
                "support_query",
                json!({"user_id": "u1", "query_text": "hello there", "urgency": "critical"}),
            )
            .await
            .unwrap();
        assert_eq!(value["escalate"], true);
        assert_eq!(agent.metrics()["escalation_rate"], 1.0);
    }

    #[tokio::test]
    async fn test_kyc_question_for_known_user() {
        let store = InMemoryStore::new();
        store.insert_user("u2", json!({"kyc_status": "pending"}));
        let agent = agent_with(Arc::new(store));

        let ack = agent
            .chat(ChatMessage {
                message: "Is my account kyc done?".to_string(),
                user_id: "u2".to_string(),
                context: Map::new(),
            })
            .await;
        assert_eq!(ack.confidence, 0.85);
        assert!(ack.message.contains("pending review"));
        assert_eq!(ack.sources, vec!["user:u2", "kyc_info"]);
    }

    #[tokio::test]
    async fn test_chat_fault_apologises() {
        let agent = agent_with(Arc::new(BrokenStore));
        let ack = agent
            .chat(ChatMessage {
                message: "check my wallet balance".to_string(),
                user_id: "u3".to_string(),
                context: Map::new(),
            })
            .await;
        assert_eq!(ack.confidence, 0.0);
        assert_eq!(ack.message, support::CHAT_ERROR_MESSAGE);
        assert_eq!(agent.counters().queries_handled, 0);
    }
}
