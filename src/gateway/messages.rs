//! Wire types for the platform REST API and live channel

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::common::types::{BetSelection, Transaction, WithdrawalRequest};

// ============================================================================
// Live channel frames
// ============================================================================

/// First outbound frame on every connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthFrame {
    #[serde(rename = "type")]
    pub frame_type: String,
    pub token: String,
}

impl AuthFrame {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            frame_type: "auth".to_string(),
            token: token.into(),
        }
    }
}

/// Absolute balance push; not a delta
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceUpdateFrame {
    pub balance: Decimal,
}

/// A transaction pushed onto the feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionPushFrame {
    pub transaction: Transaction,
}

/// A withdrawal request left the pending state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalResolvedFrame {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub amount: Option<Decimal>,
}

/// Frame types the dispatcher knows about
pub mod topics {
    pub const BALANCE_UPDATE: &str = "balance_update";
    pub const TRANSACTION: &str = "transaction";
    pub const WITHDRAWAL_APPROVED: &str = "withdrawal_approved";
    pub const WITHDRAWAL_REJECTED: &str = "withdrawal_rejected";
    pub const USERS_UPDATE: &str = "users_update";
}

// ============================================================================
// REST bodies
// ============================================================================

/// Error body returned on any non-2xx response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub status: Option<u16>,
    /// Short machine-readable code (e.g. "insufficient_balance")
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// GET /wallet/balance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub balance: Decimal,
    pub username: String,
}

/// POST /wallet/transfer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRequest {
    #[serde(rename = "receiverUsername")]
    pub receiver_username: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferResponse {
    /// Echoed balance after the transfer, applied synchronously when present
    #[serde(default)]
    pub sender_new_balance: Option<Decimal>,
}

/// POST /wallet/credit and /wallet/debit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjustRequest {
    #[serde(rename = "targetUsername")]
    pub target_username: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjustResponse {
    #[serde(default, rename = "newBalance")]
    pub new_balance: Option<Decimal>,
}

/// POST /bets/place
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceBetRequest {
    pub bets: Vec<BetSelection>,
    pub stake: Decimal,
    #[serde(rename = "accumulatorOdds")]
    pub accumulator_odds: Decimal,
    #[serde(rename = "potentialWin")]
    pub potential_win: Decimal,
    #[serde(skip_serializing_if = "Option::is_none", rename = "promoCode")]
    pub promo_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceBetResponse {
    /// Server-confirmed balance after stake deduction
    #[serde(default, rename = "newBalance")]
    pub new_balance: Option<Decimal>,
}

/// GET /rbac/transactions?page&pageSize
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionsPage {
    pub transactions: Vec<Transaction>,
    #[serde(rename = "totalCount")]
    pub total_count: u64,
}

/// POST /rbac/users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserRequest {
    #[serde(rename = "targetRole")]
    pub target_role: String,
}

/// PATCH /rbac/users/:id/password
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangePasswordRequest {
    #[serde(rename = "newPassword")]
    pub new_password: String,
}

/// POST /withdrawals
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateWithdrawalRequest {
    #[serde(rename = "targetUsername")]
    pub target_username: String,
    pub amount: Decimal,
}

/// GET /withdrawals/pending and /withdrawals/sent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalsResponse {
    pub withdrawals: Vec<WithdrawalRequest>,
}

// ============================================================================
// Presence bodies
// ============================================================================

/// Coarse location resolved from the caller's IP
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IpGeo {
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

/// Precise fix from the device, only with user permission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpsFix {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub accuracy: Option<f64>,
}

/// POST /presence/heartbeat
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceHeartbeatRequest {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    #[serde(rename = "deviceId")]
    pub device_id: String,
    #[serde(skip_serializing_if = "Option::is_none", rename = "ipData")]
    pub ip_data: Option<IpGeo>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "gpsData")]
    pub gps_data: Option<GpsFix>,
}

/// POST /presence/end
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceEndRequest {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub reason: String,
}

/// GET /presence/active
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivePresence {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    #[serde(rename = "deviceId")]
    pub device_id: String,
    #[serde(default, rename = "lastSeen")]
    pub last_seen: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_auth_frame_shape() {
        let frame = AuthFrame::new("tok_123");
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "auth");
        assert_eq!(json["token"], "tok_123");
    }

    #[test]
    fn test_balance_update_parses() {
        let frame: BalanceUpdateFrame =
            serde_json::from_str(r#"{"type":"balance_update","balance":"125.50"}"#).unwrap();
        assert_eq!(frame.balance, dec!(125.50));
    }

    #[test]
    fn test_place_bet_request_field_names() {
        let request = PlaceBetRequest {
            bets: vec![],
            stake: dec!(20),
            accumulator_odds: dec!(3.0),
            potential_win: dec!(60),
            promo_code: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("accumulatorOdds").is_some());
        assert!(json.get("potentialWin").is_some());
        assert!(json.get("promoCode").is_none());
    }

    #[test]
    fn test_error_body_tolerates_missing_fields() {
        let body: ApiErrorBody = serde_json::from_str(r#"{"error":"user_not_found"}"#).unwrap();
        assert_eq!(body.error.as_deref(), Some("user_not_found"));
        assert!(body.message.is_none());
    }
}
