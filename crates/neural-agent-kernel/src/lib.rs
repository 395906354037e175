//! Neural AgentKernel - runtime for the neural agent fleet
//!
//! The kernel owns each agent's event loop: handler dispatch, inter-agent
//! queries with timeouts, the topic event bus, the cache and store
//! capabilities, and replayable traces.
//!
//! # Runtime Invariants
//!
//! 1. An agent processes one envelope at a time
//! 2. A handler error or panic becomes a failure response, never a crash
//! 3. Every inter-agent query resolves, degrading to a neutral answer

pub mod agent;
pub mod bus;
pub mod cache;
pub mod context;
pub mod directory;
pub mod error;
pub mod factory;
pub mod io;
pub mod kernel;
pub mod query;
pub mod runtime;
pub mod store;
pub mod trace;

pub use agent::{Agent, AgentProfile};
pub use bus::{EventBus, EventStream, Subscription};
pub use cache::{agent_key, ttl, CacheBackend, MemoryCache};
pub use context::{AgentContext, SharedServices};
pub use directory::{AgentDirectory, AgentHandle};
pub use error::{CacheError, HandlerError, KernelError, StoreError};
pub use factory::{AgentFactory, AgentSpec};
pub use io::{Envelope, Inbox};
pub use kernel::{AgentKernel, HandleOutcome, Handler, KernelConfig};
pub use query::{QueryClient, DEFAULT_QUERY_TIMEOUT};
pub use runtime::{
    AgentRuntime, RunningAgent, RuntimeConfig, RuntimeStats, StatusSnapshot, StopOutcome,
};
pub use store::{DataStore, InMemoryStore, Lookup, NoStore, Row};
pub use trace::{KernelStage, KernelTrace, KernelTraceEvent};
