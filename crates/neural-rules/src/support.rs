//! Support answer rules
//!
//! Keyword classification plus canned answers. Store lookups happen in the
//! agent; these functions only turn lookup results into answers.

use neural_types::Urgency;
use serde::{Deserialize, Serialize};

/// Answers below this confidence are escalated to a human
pub const ESCALATION_CONFIDENCE: f64 = 0.5;

pub const CHAT_ERROR_MESSAGE: &str = "I apologize, but I encountered an error processing your \
    request. Please try again or contact human support.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryCategory {
    TransactionStatus,
    Account,
    Faq,
    General,
}

impl QueryCategory {
    /// First matching keyword group wins
    pub fn classify(text: &str) -> Self {
        let lower = text.to_lowercase();
        let mentions = |words: &[&str]| words.iter().any(|w| lower.contains(w));

        if mentions(&["transaction", "payment", "transfer", "status"]) {
            Self::TransactionStatus
        } else if mentions(&["account", "balance", "wallet", "kyc"]) {
            Self::Account
        } else if mentions(&["how", "what", "why", "when", "where"]) {
            Self::Faq
        } else {
            Self::General
        }
    }

    /// Decode an explicit `query_type` hint
    pub fn from_label(label: &str) -> Option<Self> {
        match label.to_lowercase().as_str() {
            "transaction_status" | "transaction" => Some(Self::TransactionStatus),
            "account" => Some(Self::Account),
            "faq" => Some(Self::Faq),
            "general" => Some(Self::General),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TransactionStatus => "transaction_status",
            Self::Account => "account",
            Self::Faq => "faq",
            Self::General => "general",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportAnswer {
    pub answer: String,
    pub confidence: f64,
    pub sources: Vec<String>,
}

impl SupportAnswer {
    pub fn new(answer: impl Into<String>, confidence: f64, sources: Vec<String>) -> Self {
        Self {
            answer: answer.into(),
            confidence,
            sources,
        }
    }
}

pub fn transaction_status_answer(tx_id: &str, status: &str) -> SupportAnswer {
    let mut answer = format!("Your transaction (ID: {}) is currently {}. ", tx_id, status);
    match status {
        "PENDING" => answer.push_str("It should be confirmed within a few minutes."),
        "COMPLETED" => answer.push_str("The transaction has been successfully completed."),
        "FAILED" => answer.push_str(
            "Unfortunately, the transaction failed. Please contact support for more details.",
        ),
        _ => {}
    }
    SupportAnswer::new(answer, 0.9, vec![format!("transaction:{}", tx_id)])
}

pub fn transaction_not_found(tx_id: &str) -> SupportAnswer {
    SupportAnswer::new(
        format!(
            "I couldn't find transaction {}. Please verify the transaction ID.",
            tx_id
        ),
        0.7,
        Vec::new(),
    )
}

pub fn transaction_help() -> SupportAnswer {
    SupportAnswer::new(
        "I can help you track your transaction status. Please provide your transaction ID, \
            and I'll look it up for you.",
        0.8,
        vec!["transaction_help".to_string()],
    )
}

fn asks_about_kyc(query: &str) -> bool {
    let lower = query.to_lowercase();
    lower.contains("kyc") || lower.contains("verify")
}

/// Answer for a known user
pub fn account_answer(query: &str, user_id: &str, kyc_status: &str) -> SupportAnswer {
    if !asks_about_kyc(query) {
        return SupportAnswer::new(
            "How can I help you with your account? You can ask about your balance, KYC status, \
                or account settings.",
            0.75,
            vec!["account_help".to_string()],
        );
    }

    let answer = match kyc_status {
        "verified" => "Your account is fully verified. You have access to all features.",
        "pending" => {
            "Your KYC verification is pending review. This typically takes 1-2 business days."
        }
        _ => {
            "Your account is not yet verified. Please complete KYC verification to access \
                all features."
        }
    };
    SupportAnswer::new(
        answer,
        0.85,
        vec![format!("user:{}", user_id), "kyc_info".to_string()],
    )
}

pub fn account_not_found() -> SupportAnswer {
    SupportAnswer::new(
        "I couldn't find your account information. Please ensure you're logged in.",
        0.6,
        Vec::new(),
    )
}

struct FaqEntry {
    key: &'static str,
    answer: &'static str,
    confidence: f64,
    source: &'static str,
}

const FAQ: [FaqEntry; 4] = [
    FaqEntry {
        key: "how does payment work",
        answer: "Payments are submitted to the network and settled on either the standard lane \
            (lowest fees) or the fast lane (quickest settlement). Every payment is screened for \
            compliance and fraud before it is released.",
        confidence: 0.9,
        source: "payment_how_it_works",
    },
    FaqEntry {
        key: "what are fees",
        answer: "Standard-lane payments cost a fraction of a cent. Fast-lane payments cost about \
            $0.02 flat in exchange for quicker settlement.",
        confidence: 0.95,
        source: "fee_structure",
    },
    FaqEntry {
        key: "how long confirmation",
        answer: "Standard-lane payments typically confirm in under a second. Fast-lane payments \
            confirm in tens of milliseconds.",
        confidence: 0.9,
        source: "confirmation_time",
    },
    FaqEntry {
        key: "is it safe",
        answer: "Yes. Funds are held with distributed key custody, and every transaction is \
            screened by the compliance and fraud agents before settlement.",
        confidence: 0.95,
        source: "security",
    },
];

/// First entry sharing any keyword with the query
pub fn faq_answer(query: &str) -> SupportAnswer {
    let lower = query.to_lowercase();
    FAQ.iter()
        .find(|entry| entry.key.split_whitespace().any(|word| lower.contains(word)))
        .map(|entry| {
            SupportAnswer::new(entry.answer, entry.confidence, vec![entry.source.to_string()])
        })
        .unwrap_or_else(|| {
            SupportAnswer::new(
                "I don't have specific information about that. Please rephrase your question \
                    or contact our support team for assistance.",
                0.4,
                Vec::new(),
            )
        })
}

pub fn general_answer() -> SupportAnswer {
    SupportAnswer::new(
        "I'm here to help with your account and transactions. You can ask me about:\n\n\
         • Transaction status and history\n\
         • Account verification (KYC)\n\
         • Payment fees and confirmation times\n\
         • Security and privacy features\n\n\
         What would you like to know?",
        0.8,
        vec!["general_help".to_string()],
    )
}

pub fn chat_error_answer() -> SupportAnswer {
    SupportAnswer::new(CHAT_ERROR_MESSAGE, 0.0, Vec::new())
}

pub fn should_escalate(confidence: f64, urgency: Urgency) -> bool {
    confidence < ESCALATION_CONFIDENCE || urgency == Urgency::Critical
}

pub fn suggest_actions(query: &str) -> Vec<String> {
    let lower = query.to_lowercase();
    let mut actions = Vec::new();
    if lower.contains("transaction") {
        actions.push("view_transaction_history".to_string());
    }
    if asks_about_kyc(&lower) {
        actions.push("complete_kyc_verification".to_string());
    }
    if lower.contains("fail") || lower.contains("error") {
        actions.push("contact_support".to_string());
    }
    actions
}
