//! Read-only data store capability
//!
//! Agents ask for a fixed set of lookups; rows come back as JSON objects.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::StoreError;

pub type Row = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "lookup", rename_all = "snake_case")]
pub enum Lookup {
    UserKycStatus { user_id: String },
    /// Most recent first
    TransactionHistory { user_id: String, hours: u32 },
    MerchantDetails { merchant_id: String },
    TransactionDetails { transaction_id: String },
    UserProfile { user_id: String },
}

impl Lookup {
    pub fn name(&self) -> &'static str {
        match self {
            Self::UserKycStatus { .. } => "user_kyc_status",
            Self::TransactionHistory { .. } => "transaction_history",
            Self::MerchantDetails { .. } => "merchant_details",
            Self::TransactionDetails { .. } => "transaction_details",
            Self::UserProfile { .. } => "user_profile",
        }
    }
}

#[async_trait]
pub trait DataStore: Send + Sync {
    async fn query(&self, lookup: &Lookup) -> Result<Vec<Row>, StoreError>;
}

/// Store with no data; every lookup is empty
#[derive(Debug, Default, Clone, Copy)]
pub struct NoStore;

#[async_trait]
impl DataStore for NoStore {
    async fn query(&self, _lookup: &Lookup) -> Result<Vec<Row>, StoreError> {
        Ok(Vec::new())
    }
}

/// In-memory store keyed the way agents look things up
#[derive(Debug, Default)]
pub struct InMemoryStore {
    users: DashMap<String, Row>,
    merchants: DashMap<String, Row>,
    transactions: DashMap<String, Row>,
    history: DashMap<String, Vec<Row>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a user row (`kyc_status`, profile fields)
    pub fn insert_user(&self, user_id: impl Into<String>, row: Value) {
        let user_id = user_id.into();
        let mut row = as_row(row);
        row.insert("user_id".to_string(), Value::String(user_id.clone()));
        self.users.insert(user_id, row);
    }

    pub fn insert_merchant(&self, merchant_id: impl Into<String>, row: Value) {
        let merchant_id = merchant_id.into();
        let mut row = as_row(row);
        row.insert("merchant_id".to_string(), Value::String(merchant_id.clone()));
        self.merchants.insert(merchant_id, row);
    }

    /// Insert a transaction; it also joins its sender's history
    pub fn insert_transaction(&self, transaction_id: impl Into<String>, row: Value) {
        let transaction_id = transaction_id.into();
        let mut row = as_row(row);
        row.insert("transaction_id".to_string(), Value::String(transaction_id.clone()));

        let owner = row
            .get("user_id")
            .or_else(|| row.get("sender"))
            .and_then(Value::as_str)
            .map(str::to_string);
        if let Some(owner) = owner {
            self.history.entry(owner).or_default().insert(0, row.clone());
        }
        self.transactions.insert(transaction_id, row);
    }
}

fn as_row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        other => {
            let mut row = Row::new();
            row.insert("value".to_string(), other);
            row
        }
    }
}

/// Rows without a parseable `created_at` are always in the window
fn within_window(row: &Row, hours: u32, now: DateTime<Utc>) -> bool {
    let created_at = row
        .get("created_at")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok());
    match created_at {
        Some(ts) => now - ts.with_timezone(&Utc) <= ChronoDuration::hours(i64::from(hours)),
        None => true,
    }
}

#[async_trait]
impl DataStore for InMemoryStore {
    async fn query(&self, lookup: &Lookup) -> Result<Vec<Row>, StoreError> {
        let rows = match lookup {
            Lookup::UserKycStatus { user_id } => self
                .users
                .get(user_id)
                .map(|user| {
                    let mut row = Row::new();
                    if let Some(status) = user.get("kyc_status") {
                        row.insert("kyc_status".to_string(), status.clone());
                    }
                    vec![row]
                })
                .unwrap_or_default(),
            Lookup::UserProfile { user_id } => {
                self.users.get(user_id).map(|u| vec![u.clone()]).unwrap_or_default()
            }
            Lookup::MerchantDetails { merchant_id } => self
                .merchants
                .get(merchant_id)
                .map(|m| vec![m.clone()])
                .unwrap_or_default(),
            Lookup::TransactionDetails { transaction_id } => self
                .transactions
                .get(transaction_id)
                .map(|t| vec![t.clone()])
                .unwrap_or_default(),
            Lookup::TransactionHistory { user_id, hours } => {
                let now = Utc::now();
                self.history
                    .get(user_id)
                    .map(|rows| {
                        rows.iter()
                            .filter(|row| within_window(row, *hours, now))
                            .cloned()
                            .collect()
                    })
                    .unwrap_or_default()
            }
        };
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_history_is_most_recent_first_and_windowed() {
        let store = InMemoryStore::new();
        let old = (Utc::now() - ChronoDuration::hours(48)).to_rfc3339();
        store.insert_transaction(
            "tx_old",
            json!({"user_id": "u1", "amount": 10, "created_at": old}),
        );
        store.insert_transaction("tx_a", json!({"user_id": "u1", "amount": 20}));
        store.insert_transaction("tx_b", json!({"sender": "u1", "amount": 30}));

        let rows = store
            .query(&Lookup::TransactionHistory {
                user_id: "u1".into(),
                hours: 24,
            })
            .await
            .unwrap();
        let ids: Vec<_> = rows
            .iter()
            .map(|r| r["transaction_id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["tx_b", "tx_a"]);
    }

    #[tokio::test]
    async fn test_kyc_lookup_projects_status() {
        let store = InMemoryStore::new();
        store.insert_user("u1", json!({"kyc_status": "verified", "email": "u1@example.com"}));

        let rows = store
            .query(&Lookup::UserKycStatus { user_id: "u1".into() })
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("kyc_status"), Some(&json!("verified")));
        assert!(rows[0].get("email").is_none());

        let missing = store
            .query(&Lookup::UserKycStatus { user_id: "nobody".into() })
            .await
            .unwrap();
        assert!(missing.is_empty());
    }

    #[test]
    fn test_lookup_serializes_with_tag() {
        let lookup = Lookup::MerchantDetails {
            merchant_id: "m1".into(),
        };
        let value = serde_json::to_value(&lookup).unwrap();
        assert_eq!(value["lookup"], "merchant_details");
        assert_eq!(lookup.name(), "merchant_details");
    }
}
