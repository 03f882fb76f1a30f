//! Wallet state, bet slip and feed services

pub mod betslip;
pub mod feeds;
pub mod store;

pub use betslip::{BetSlipAggregator, SlipPhase, MIN_STAKE};
pub use feeds::{NotificationFeed, TransactionFeed};
pub use store::{WalletBalanceStore, WalletSnapshot};
