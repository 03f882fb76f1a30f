//! Domain types shared across the wallet, bet slip and feed services

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::history::Keyed;

/// Whether a selection was taken from the prematch book or in-play
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPhase {
    Prematch,
    Live,
}

impl std::fmt::Display for MatchPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchPhase::Prematch => write!(f, "prematch"),
            MatchPhase::Live => write!(f, "live"),
        }
    }
}

/// Identity of a market within a slip
///
/// Selecting a new outcome for an already-selected market replaces the old
/// one; this key is what "same market" means.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SelectionKey {
    pub match_id: String,
    pub phase: MatchPhase,
    pub market_key: String,
}

/// One leg of a bet slip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetSelection {
    /// Match identifier on the platform
    #[serde(rename = "matchId")]
    pub match_id: String,
    /// Prematch or live
    #[serde(rename = "matchType")]
    pub phase: MatchPhase,
    /// Market identifier within the match (e.g. "1x2", "over_under_2.5")
    #[serde(rename = "marketKey")]
    pub market_key: String,
    /// The picked outcome within the market
    #[serde(rename = "betType")]
    pub bet_type: String,
    /// Decimal odds, strictly greater than 1.0
    pub odds: Decimal,
    /// Display label for the match (home vs away)
    #[serde(default, rename = "matchLabel")]
    pub match_label: Option<String>,
}

impl BetSelection {
    pub fn key(&self) -> SelectionKey {
        SelectionKey {
            match_id: self.match_id.clone(),
            phase: self.phase,
            market_key: self.market_key.clone(),
        }
    }
}

/// Normalized transaction category
///
/// The server's `type` field is an open set; anything unrecognized lands in
/// `Other` so new server-side types never break the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Deposit,
    Withdraw,
    Other,
}

impl TransactionKind {
    pub fn normalize(raw: &str) -> Self {
        match raw.to_lowercase().as_str() {
            "deposit" | "credit" | "topup" => TransactionKind::Deposit,
            "withdraw" | "withdrawal" | "debit" => TransactionKind::Withdraw,
            _ => TransactionKind::Other,
        }
    }
}

/// Immutable ledger record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub amount: Decimal,
    /// Raw server-side type string
    #[serde(rename = "type")]
    pub raw_type: String,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Normalized category for display grouping
    pub fn kind(&self) -> TransactionKind {
        TransactionKind::normalize(&self.raw_type)
    }
}

impl Keyed for Transaction {
    fn key(&self) -> &str {
        &self.id
    }
}

/// Withdrawal request lifecycle state
///
/// Transitions out of `Pending` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalStatus {
    Pending,
    Approved,
    Rejected,
    Expired,
}

impl WithdrawalStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, WithdrawalStatus::Pending)
    }
}

/// A withdrawal awaiting (or past) approval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    pub id: String,
    pub requester_id: String,
    pub target_user_id: String,
    pub amount: Decimal,
    pub status: WithdrawalStatus,
    #[serde(default)]
    pub approved_by: Option<String>,
    #[serde(default)]
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Keyed for WithdrawalRequest {
    fn key(&self) -> &str {
        &self.id
    }
}

/// In-app notification derived from push frames
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    /// Frame type that produced this notification
    pub topic: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl Keyed for Notification {
    fn key(&self) -> &str {
        &self.id
    }
}

/// Events emitted by the wallet layer toward any UI binding
#[derive(Debug, Clone)]
pub enum WalletEvent {
    /// Authoritative balance changed (push, fetch, or confirmed mutation)
    BalanceChanged(Decimal),
    /// A new transaction landed on the feed
    TransactionReceived(Transaction),
    /// A withdrawal moved to a terminal state
    WithdrawalResolved {
        id: String,
        status: WithdrawalStatus,
    },
    /// Admin user list changed (role grants, deletions)
    UsersChanged,
}
