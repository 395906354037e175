//! Shared services and the per-agent capability handle

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use neural_types::{
    AgentAddress, Event, FraudScoreQuery, FraudScoreResponse, RiskScoreQuery, RiskScoreResponse,
};
use serde_json::Value;

use crate::bus::{EventBus, Subscription};
use crate::cache::{self, CacheBackend, MemoryCache};
use crate::directory::AgentDirectory;
use crate::error::StoreError;
use crate::query::{QueryClient, DEFAULT_QUERY_TIMEOUT};
use crate::store::{DataStore, Lookup, NoStore, Row};

/// Process-wide services shared by every agent
#[derive(Clone)]
pub struct SharedServices {
    pub bus: Arc<EventBus>,
    pub cache: Arc<dyn CacheBackend>,
    pub store: Arc<dyn DataStore>,
    pub directory: Arc<AgentDirectory>,
    pub query_timeout: Duration,
}

impl SharedServices {
    pub fn new(bus: EventBus, cache: Arc<dyn CacheBackend>, store: Arc<dyn DataStore>) -> Self {
        Self {
            bus: Arc::new(bus),
            cache,
            store,
            directory: Arc::new(AgentDirectory::new()),
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    /// Default bus, memory cache, empty store
    pub fn in_memory() -> Self {
        Self::new(EventBus::default(), Arc::new(MemoryCache::new()), Arc::new(NoStore))
    }

    pub fn with_store(mut self, store: Arc<dyn DataStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }
}

impl std::fmt::Debug for SharedServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedServices")
            .field("namespace", &self.bus.namespace())
            .field("agents", &self.directory.len())
            .field("query_timeout", &self.query_timeout)
            .finish()
    }
}

/// Everything an agent may touch outside its own state
#[derive(Clone, Debug)]
pub struct AgentContext {
    name: String,
    address: AgentAddress,
    services: SharedServices,
    queries: QueryClient,
}

impl AgentContext {
    pub fn new(name: impl Into<String>, address: AgentAddress, services: SharedServices) -> Self {
        let name = name.into();
        let queries = QueryClient::new(
            name.clone(),
            services.directory.clone(),
            services.query_timeout,
        );
        Self {
            name,
            address,
            services,
            queries,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &AgentAddress {
        &self.address
    }

    pub fn services(&self) -> &SharedServices {
        &self.services
    }

    /// Publish an event as this agent
    pub fn publish(&self, event_type: &str, data: Value) -> usize {
        self.services
            .bus
            .publish(Event::new(&self.name, event_type, data))
    }

    pub fn subscribe<F, Fut>(&self, event_types: &[&str], callback: F) -> Subscription
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.services
            .bus
            .spawn_listener(&self.name, event_types, callback)
    }

    /// Cache read; a failing backend reads as a miss
    pub async fn cache_get(&self, key: &str) -> Option<Value> {
        let key = cache::agent_key(&self.name, key);
        match self.services.cache.get(&key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(agent = %self.name, key = %key, "Cache read failed: {}", e);
                None
            }
        }
    }

    /// Cache write; failures are logged and ignored
    pub async fn cache_set(&self, key: &str, value: Value, ttl: Duration) {
        let key = cache::agent_key(&self.name, key);
        if let Err(e) = self.services.cache.set(&key, value, ttl).await {
            tracing::warn!(agent = %self.name, key = %key, "Cache write failed: {}", e);
        }
    }

    pub async fn query_database(&self, lookup: &Lookup) -> Result<Vec<Row>, StoreError> {
        let result = self.services.store.query(lookup).await;
        if let Err(e) = &result {
            tracing::warn!(agent = %self.name, lookup = lookup.name(), "Store query failed: {}", e);
        }
        result
    }

    /// First row of a lookup; store errors read as "no row"
    pub async fn lookup_one(&self, lookup: &Lookup) -> Option<Row> {
        self.query_database(lookup)
            .await
            .ok()
            .and_then(|rows| rows.into_iter().next())
    }

    pub async fn query_risk(&self, target: &str, query: RiskScoreQuery) -> RiskScoreResponse {
        self.queries.risk_score(target, query).await
    }

    pub async fn query_fraud(&self, target: &str, query: FraudScoreQuery) -> FraudScoreResponse {
        self.queries.fraud_score(target, query).await
    }
}
