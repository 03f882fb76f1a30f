//! Authoritative balance state, reconciled from REST and the live channel
//!
//! Two independent sources update the balance: REST snapshots and push
//! frames. The ordering rule is a single sentence: the most recent value
//! applied through `apply_confirmed` wins, regardless of which source it
//! came from. Pushes carry absolute balances and overwrite unconditionally;
//! no merge logic exists against in-flight fetches.

use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::common::cancel::CancelFlag;
use crate::common::dedup::RequestDeduplicator;
use crate::common::errors::{ServiceError, ServiceResult};
use crate::common::retry::{with_retry, RetryConfig};
use crate::gateway::messages::{topics, BalanceUpdateFrame, BalanceResponse};
use crate::gateway::websocket::{ListenerId, WsGateway};
use crate::gateway::RestClient;

/// Snapshot of the wallet state handed to subscribers
///
/// A failed refresh leaves `balance` at its previous (stale but displayable)
/// value and sets `error`; it never zeroes the balance.
#[derive(Debug, Clone, Default)]
pub struct WalletSnapshot {
    pub balance: Option<Decimal>,
    pub username: Option<String>,
    pub loading: bool,
    pub error: Option<ServiceError>,
}

type Subscriber = Arc<dyn Fn(&WalletSnapshot) + Send + Sync>;

/// Identifier returned by `subscribe`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

/// Single source of truth for the user's balance
///
/// UI surfaces read and subscribe; they never mutate. The only writers are
/// the gateway's push listener and completed REST calls, both of which land
/// in `apply_confirmed`.
pub struct WalletBalanceStore {
    rest: Arc<RestClient>,
    state: RwLock<WalletSnapshot>,
    subscribers: RwLock<Vec<(u64, Subscriber)>>,
    next_subscriber_id: AtomicU64,
    dedup: RequestDeduplicator<ServiceResult<BalanceResponse>>,
    retry: RetryConfig,
}

impl WalletBalanceStore {
    pub fn new(rest: Arc<RestClient>) -> Self {
        Self {
            rest,
            state: RwLock::new(WalletSnapshot::default()),
            subscribers: RwLock::new(Vec::new()),
            next_subscriber_id: AtomicU64::new(1),
            dedup: RequestDeduplicator::new(),
            retry: RetryConfig::api(),
        }
    }

    /// Current state
    pub fn snapshot(&self) -> WalletSnapshot {
        self.state.read().clone()
    }

    /// Convenience accessor for the balance value
    pub fn balance(&self) -> Option<Decimal> {
        self.state.read().balance
    }

    /// Subscribe to state changes; the callback also fires immediately with
    /// the current snapshot
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&WalletSnapshot) + Send + Sync + 'static,
    {
        let id = self.next_subscriber_id.fetch_add(1, Ordering::SeqCst);
        let callback: Subscriber = Arc::new(callback);
        callback(&self.snapshot());
        self.subscribers.write().push((id, callback));
        SubscriptionId(id)
    }

    pub fn unsubscribe(&self, subscription: SubscriptionId) {
        self.subscribers
            .write()
            .retain(|(id, _)| *id != subscription.0);
    }

    /// Apply a server-confirmed absolute balance
    ///
    /// This is the single write path. The last call through here wins; no
    /// timestamps, no source comparison.
    pub fn apply_confirmed(&self, balance: Decimal) {
        debug!(%balance, "Applying confirmed balance");
        {
            let mut state = self.state.write();
            state.balance = Some(balance);
            state.error = None;
        }
        self.notify();
    }

    /// Apply the echoed balance from a mutating call, when the server sent one
    ///
    /// Saves a round trip of stale display after transfers and debits.
    pub fn apply_mutation_echo(&self, new_balance: Option<Decimal>) {
        if let Some(balance) = new_balance {
            self.apply_confirmed(balance);
        }
    }

    /// Fetch the balance snapshot from REST
    ///
    /// Concurrent calls collapse into one request. A cancelled caller
    /// discards the result instead of committing it; the fetch itself is
    /// not aborted.
    pub async fn refresh(&self, cancel: &CancelFlag) -> ServiceResult<Decimal> {
        {
            let mut state = self.state.write();
            state.loading = true;
        }
        self.notify();

        let rest = self.rest.clone();
        let retry = self.retry;
        let result = self
            .dedup
            .run("wallet/balance", move || async move {
                with_retry(&retry, || {
                    let rest = rest.clone();
                    async move { rest.get_balance().await }
                })
                .await
                .map_err(ServiceError::from)
            })
            .await;

        if cancel.is_cancelled() {
            debug!("Refresh result discarded: caller torn down");
            // Another live caller of the same deduplicated fetch commits it.
            return result.map(|r| r.balance);
        }

        match result {
            Ok(response) => {
                {
                    let mut state = self.state.write();
                    state.balance = Some(response.balance);
                    state.username = Some(response.username.clone());
                    state.loading = false;
                    state.error = None;
                }
                self.notify();
                Ok(response.balance)
            }
            Err(err) => {
                warn!(error = %err, "Balance refresh failed, keeping stale value");
                {
                    let mut state = self.state.write();
                    state.loading = false;
                    state.error = Some(err.clone());
                }
                self.notify();
                Err(err)
            }
        }
    }

    /// Wire this store to the gateway's balance pushes
    ///
    /// Pushes carry the server's most current view and overwrite
    /// unconditionally on receipt.
    pub fn attach(self: &Arc<Self>, gateway: &WsGateway) -> ListenerId {
        let store = Arc::downgrade(self);
        gateway.subscribe(topics::BALANCE_UPDATE, move |value| {
            let Some(store) = store.upgrade() else {
                return;
            };
            match serde_json::from_value::<BalanceUpdateFrame>(value.clone()) {
                Ok(frame) => store.apply_confirmed(frame.balance),
                Err(e) => debug!(error = %e, "Ignoring unparseable balance_update"),
            }
        })
    }

    /// Clear the error flag after the UI has shown it
    pub fn dismiss_error(&self) {
        {
            let mut state = self.state.write();
            state.error = None;
        }
        self.notify();
    }

    fn notify(&self) {
        let snapshot = self.snapshot();
        let subscribers: Vec<Subscriber> = self
            .subscribers
            .read()
            .iter()
            .map(|(_, s)| s.clone())
            .collect();
        for subscriber in subscribers {
            subscriber(&snapshot);
        }
    }
}

impl std::fmt::Debug for WalletBalanceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletBalanceStore")
            .field("state", &self.snapshot())
            .finish()
    }
}
