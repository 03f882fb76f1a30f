//! WagerHub Client Library
//!
//! A Rust client for the WagerHub betting platform: wallet balance
//! synchronization across REST and the live push channel, bet slip
//! aggregation, bounded activity feeds and presence heartbeats.

pub mod common;
pub mod config;
pub mod gateway;
pub mod presence;
pub mod wallet;

// Re-export commonly used types
pub use common::cancel::CancelFlag;
pub use common::errors::{ClientError, ErrorKind, Result, ServiceError, ServiceResult};
pub use common::history::{BoundedHistory, Keyed};
pub use common::cache::{LruCache, TtlCache};
pub use common::dedup::RequestDeduplicator;
pub use common::retry::{
    with_retry, with_retry_and_breaker, BreakerState, CircuitBreaker, RetryConfig,
};
pub use common::types::{
    BetSelection, MatchPhase, Notification, SelectionKey, Transaction, TransactionKind,
    WalletEvent, WithdrawalRequest, WithdrawalStatus,
};
pub use config::types::AppConfig;
pub use gateway::rest::RestClient;
pub use gateway::websocket::{GatewayConfig, GatewayState, WsGateway};
pub use gateway::{StaticTokenProvider, TokenProvider};
pub use presence::PresenceSession;
pub use wallet::{BetSlipAggregator, SlipPhase, TransactionFeed, WalletBalanceStore};
