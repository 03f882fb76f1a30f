//! Common test utilities and fixtures

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use wagerhub_client::common::types::{BetSelection, MatchPhase};
use wagerhub_client::gateway::{RestClient, StaticTokenProvider};

/// Create an authenticated REST client against the given base URL
pub fn authed_client(base_url: &str) -> Arc<RestClient> {
    Arc::new(
        RestClient::new(base_url, Arc::new(StaticTokenProvider::new("test-token")))
            .expect("Failed to create REST client"),
    )
}

/// Create a sample prematch selection
pub fn sample_selection(match_id: &str, market: &str, odds: Decimal) -> BetSelection {
    BetSelection {
        match_id: match_id.to_string(),
        phase: MatchPhase::Prematch,
        market_key: market.to_string(),
        bet_type: "home".to_string(),
        odds,
        match_label: Some("Home FC vs Away United".to_string()),
    }
}

/// A pair of selections matching the balance-100 end-to-end scenario
pub fn scenario_selections() -> Vec<BetSelection> {
    vec![
        sample_selection("m1", "1x2", dec!(1.5)),
        sample_selection("m2", "1x2", dec!(2.0)),
    ]
}

/// Sample live-channel frames
pub mod ws_frames {
    /// Absolute balance push
    pub const BALANCE_UPDATE: &str = r#"{"type":"balance_update","balance":"125.50"}"#;

    /// Transaction push with the nested record
    pub const TRANSACTION: &str = r#"{
        "type": "transaction",
        "transaction": {
            "id": "tx_001",
            "sender_id": "u1",
            "receiver_id": "u2",
            "amount": "25.00",
            "type": "deposit",
            "created_at": "2026-01-15T10:00:00Z"
        }
    }"#;

    /// Withdrawal resolution push
    pub const WITHDRAWAL_APPROVED: &str =
        r#"{"type":"withdrawal_approved","id":"w_001","amount":"50.00"}"#;

    /// Not JSON at all; the dispatcher must drop it without dying
    pub const MALFORMED: &str = "{{{{ not json";

    /// Valid JSON with no type field
    pub const UNTYPED: &str = r#"{"balance":"10.00"}"#;
}

/// Sample REST response bodies
pub mod api_responses {
    use serde_json::json;

    pub fn balance(amount: &str, username: &str) -> serde_json::Value {
        json!({ "balance": amount, "username": username })
    }

    pub fn transactions_page(total: u64, ids: &[&str]) -> serde_json::Value {
        let transactions: Vec<serde_json::Value> = ids
            .iter()
            .map(|id| {
                json!({
                    "id": id,
                    "sender_id": "u1",
                    "receiver_id": "u2",
                    "amount": "10.00",
                    "type": "deposit",
                    "created_at": "2026-01-15T10:00:00Z"
                })
            })
            .collect();
        json!({ "transactions": transactions, "totalCount": total })
    }
}
