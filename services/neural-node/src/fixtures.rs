//! Seed data for the in-memory store
//!
//! ```json
//! {
//!   "users": {"u1": {"kyc_status": "verified", "avg_tx_amount": 300.0}},
//!   "merchants": {"m1": {"kyc_status": "verified", "business_type": "retail"}},
//!   "transactions": {"tx_1": {"user_id": "u1", "amount": 120.0, "status": "completed"}}
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use neural_agent_kernel::InMemoryStore;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Fixtures {
    pub users: BTreeMap<String, Value>,
    pub merchants: BTreeMap<String, Value>,
    pub transactions: BTreeMap<String, Value>,
}

impl Fixtures {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading store fixtures from {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("parsing store fixtures in {}", path.display()))
    }

    pub fn len(&self) -> usize {
        self.users.len() + self.merchants.len() + self.transactions.len()
    }

    pub fn into_store(self) -> InMemoryStore {
        let store = InMemoryStore::new();
        for (id, row) in self.users {
            store.insert_user(id, row);
        }
        for (id, row) in self.merchants {
            store.insert_merchant(id, row);
        }
        for (id, row) in self.transactions {
            store.insert_transaction(id, row);
        }
        store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neural_agent_kernel::{DataStore, Lookup};
    use serde_json::json;

    #[tokio::test]
    async fn test_fixtures_populate_store() {
        let fixtures: Fixtures = serde_json::from_value(json!({
            "users": {"u1": {"kyc_status": "pending"}},
            "transactions": {"tx_1": {"user_id": "u1", "amount": 50.0}}
        }))
        .unwrap();
        assert_eq!(fixtures.len(), 2);

        let store = fixtures.into_store();
        let kyc = store
            .query(&Lookup::UserKycStatus { user_id: "u1".to_string() })
            .await
            .unwrap();
        assert_eq!(kyc[0]["kyc_status"], "pending");

        let tx = store
            .query(&Lookup::TransactionDetails { transaction_id: "tx_1".to_string() })
            .await
            .unwrap();
        assert_eq!(tx.len(), 1);
    }
}
