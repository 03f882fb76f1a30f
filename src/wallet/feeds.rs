//! Transaction and notification feeds
//!
//! Each feed owns its own bounded buffer; nothing is shared across features.
//! REST pages fill the tail, push frames land at the front, and a fetch
//! failure leaves whatever was already loaded on display.

use chrono::Utc;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::common::errors::{ServiceError, ServiceResult};
use crate::common::history::BoundedHistory;
use crate::common::retry::{with_retry, RetryConfig};
use crate::common::types::{Notification, Transaction};
use crate::gateway::messages::{topics, TransactionPushFrame, WithdrawalResolvedFrame};
use crate::gateway::websocket::{ListenerId, WsGateway};
use crate::gateway::RestClient;

/// Paged transaction history merged with live pushes
pub struct TransactionFeed {
    rest: Arc<RestClient>,
    state: RwLock<TransactionFeedState>,
    retry: RetryConfig,
}

#[derive(Debug)]
struct TransactionFeedState {
    history: BoundedHistory<Transaction>,
    total_count: u64,
    loading: bool,
    error: Option<ServiceError>,
}

impl TransactionFeed {
    pub fn new(rest: Arc<RestClient>, capacity: usize) -> Self {
        Self {
            rest,
            state: RwLock::new(TransactionFeedState {
                history: BoundedHistory::new(capacity),
                total_count: 0,
                loading: false,
                error: None,
            }),
            retry: RetryConfig::api(),
        }
    }

    /// Newest-first view of the buffered feed
    pub fn items(&self) -> Vec<Transaction> {
        self.state.read().history.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.state.read().history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().history.is_empty()
    }

    /// Total record count reported by the server, across all pages
    pub fn total_count(&self) -> u64 {
        self.state.read().total_count
    }

    pub fn error(&self) -> Option<ServiceError> {
        self.state.read().error.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.read().loading
    }

    /// Fetch a page and merge it into the buffer
    ///
    /// Page zero refreshes the head of the feed; later pages extend the
    /// tail. A failure keeps the stale buffer and flags the error.
    pub async fn load_page(&self, page: u32, page_size: u32) -> ServiceResult<usize> {
        self.state.write().loading = true;

        let result = with_retry(&self.retry, || {
            let rest = self.rest.clone();
            async move { rest.get_transactions(page, page_size).await }
        })
        .await;

        match result {
            Ok(response) => {
                let mut state = self.state.write();
                state.total_count = response.total_count;
                let merged = if page == 0 {
                    state.history.add_batch(response.transactions)
                } else {
                    state.history.extend_tail(response.transactions)
                };
                state.loading = false;
                state.error = None;
                Ok(merged)
            }
            Err(err) => {
                warn!(error = %err, "Transaction page fetch failed, keeping stale feed");
                let service_err = ServiceError::from(err);
                let mut state = self.state.write();
                state.loading = false;
                state.error = Some(service_err.clone());
                Err(service_err)
            }
        }
    }

    /// Wire this feed to pushed transactions
    pub fn attach(self: &Arc<Self>, gateway: &WsGateway) -> ListenerId {
        let feed = Arc::downgrade(self);
        gateway.subscribe(topics::TRANSACTION, move |value| {
            let Some(feed) = feed.upgrade() else {
                return;
            };
            match serde_json::from_value::<TransactionPushFrame>(value.clone()) {
                Ok(frame) => {
                    let mut state = feed.state.write();
                    if state.history.add(frame.transaction) {
                        state.total_count = state.total_count.saturating_add(1);
                    }
                }
                Err(e) => debug!(error = %e, "Ignoring unparseable transaction frame"),
            }
        })
    }
}

impl std::fmt::Debug for TransactionFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("TransactionFeed")
            .field("len", &state.history.len())
            .field("total_count", &state.total_count)
            .finish()
    }
}

/// Notifications distilled from withdrawal and admin push frames
pub struct NotificationFeed {
    state: RwLock<BoundedHistory<Notification>>,
}

impl NotificationFeed {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: RwLock::new(BoundedHistory::new(capacity)),
        }
    }

    pub fn items(&self) -> Vec<Notification> {
        self.state.read().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.state.read().len()
    }

    pub fn dismiss(&self, id: &str) -> bool {
        self.state.write().remove(id).is_some()
    }

    /// Wire this feed to the frame types that produce notifications
    pub fn attach(self: &Arc<Self>, gateway: &WsGateway) -> Vec<ListenerId> {
        let mut ids = Vec::new();
        for (topic, text) in [
            (topics::WITHDRAWAL_APPROVED, "withdrawal approved"),
            (topics::WITHDRAWAL_REJECTED, "withdrawal rejected"),
        ] {
            let feed = Arc::downgrade(self);
            ids.push(gateway.subscribe(topic, move |value| {
                let Some(feed) = feed.upgrade() else {
                    return;
                };
                let frame: WithdrawalResolvedFrame =
                    serde_json::from_value(value.clone()).unwrap_or(WithdrawalResolvedFrame {
                        id: None,
                        amount: None,
                    });
                let id = frame
                    .id
                    .map(|wid| format!("{}:{}", topic, wid))
                    .unwrap_or_else(|| format!("{}:{}", topic, Utc::now().timestamp_millis()));
                feed.push(Notification {
                    id,
                    topic: topic.to_string(),
                    message: text.to_string(),
                    created_at: Utc::now(),
                });
            }));
        }

        let feed = Arc::downgrade(self);
        ids.push(gateway.subscribe(topics::USERS_UPDATE, move |_| {
            let Some(feed) = feed.upgrade() else {
                return;
            };
            feed.push(Notification {
                id: format!("users_update:{}", Utc::now().timestamp_millis()),
                topic: topics::USERS_UPDATE.to_string(),
                message: "user list changed".to_string(),
                created_at: Utc::now(),
            });
        }));
        ids
    }

    fn push(&self, notification: Notification) {
        self.state.write().add(notification);
    }
}

impl std::fmt::Debug for NotificationFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationFeed")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::StaticTokenProvider;
    use rust_decimal_macros::dec;

    fn transaction(id: &str) -> Transaction {
        Transaction {
            id: id.to_string(),
            sender_id: "u1".to_string(),
            receiver_id: "u2".to_string(),
            amount: dec!(10),
            raw_type: "deposit".to_string(),
            created_at: Utc::now(),
        }
    }

    fn feed(capacity: usize) -> TransactionFeed {
        let rest = Arc::new(
            RestClient::new(
                "http://localhost:3001",
                Arc::new(StaticTokenProvider::new("tok")),
            )
            .unwrap(),
        );
        TransactionFeed::new(rest, capacity)
    }

    #[test]
    fn test_push_dedupes_by_id() {
        let feed = feed(10);
        {
            let mut state = feed.state.write();
            assert!(state.history.add(transaction("t1")));
            assert!(!state.history.add(transaction("t1")));
        }
        assert_eq!(feed.len(), 1);
    }

    #[test]
    fn test_feed_capacity_holds_under_push_storm() {
        let feed = feed(5);
        {
            let mut state = feed.state.write();
            for i in 0..50 {
                state.history.add(transaction(&format!("t{}", i)));
            }
        }
        assert_eq!(feed.len(), 5);
        // Newest first
        assert_eq!(feed.items()[0].id, "t49");
    }

    #[test]
    fn test_notification_dismiss() {
        let feed = NotificationFeed::new(10);
        feed.push(Notification {
            id: "n1".to_string(),
            topic: "withdrawal_approved".to_string(),
            message: "withdrawal approved".to_string(),
            created_at: Utc::now(),
        });
        assert_eq!(feed.len(), 1);
        assert!(feed.dismiss("n1"));
        assert!(!feed.dismiss("n1"));
        assert_eq!(feed.len(), 0);
    }
}
