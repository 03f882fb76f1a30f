//! REST API client for the platform

use reqwest::{Client, RequestBuilder, Response};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

use super::auth::TokenProvider;
use super::messages::*;
use crate::common::errors::{ClientError, Result};
use crate::common::types::WithdrawalRequest;

/// REST API client
///
/// Transport-level: methods return `ClientError` so the retry layer can
/// inspect failures; service structs convert to `ServiceError` at their
/// boundary.
#[derive(Clone)]
pub struct RestClient {
    /// HTTP client
    client: Client,
    /// Base URL for the platform API
    base_url: String,
    /// Bearer token source; header is omitted when no token is present
    tokens: Arc<dyn TokenProvider>,
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl RestClient {
    /// Create a new REST client
    pub fn new(base_url: &str, tokens: Arc<dyn TokenProvider>) -> Result<Self> {
        Self::with_timeout(base_url, tokens, Duration::from_secs(30))
    }

    /// Create a new REST client with custom timeout
    pub fn with_timeout(
        base_url: &str,
        tokens: Arc<dyn TokenProvider>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Internal(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether a bearer token is currently available
    pub fn has_token(&self) -> bool {
        self.tokens.token().is_some()
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.tokens.token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Map a response to `T`, surfacing non-2xx as a structured API error
    async fn handle<T: DeserializeOwned>(&self, response: Response) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }
        Err(Self::error_from(status.as_u16(), response.text().await.ok()))
    }

    /// Like `handle`, for endpoints whose success body we discard
    async fn handle_empty(&self, response: Response) -> Result<()> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        Err(Self::error_from(status.as_u16(), response.text().await.ok()))
    }

    fn error_from(status: u16, body: Option<String>) -> ClientError {
        let parsed: Option<ApiErrorBody> = body
            .as_deref()
            .and_then(|text| serde_json::from_str(text).ok());
        match parsed {
            Some(api) => ClientError::Api {
                status,
                code: api.error.unwrap_or_else(|| format!("http_{}", status)),
                message: api.message,
            },
            None => match status {
                401 => ClientError::Authentication(format!("status {}", status)),
                403 => ClientError::Authorization(format!("status {}", status)),
                _ => ClientError::Api {
                    status,
                    code: format!("http_{}", status),
                    message: body,
                },
            },
        }
    }

    // ========================================================================
    // Wallet
    // ========================================================================

    /// Current balance and username for the authenticated user
    #[instrument(skip(self))]
    pub async fn get_balance(&self) -> Result<BalanceResponse> {
        let url = format!("{}/wallet/balance", self.base_url);
        debug!("Fetching balance from: {}", url);
        let response = self.authed(self.client.get(&url)).send().await?;
        self.handle(response).await
    }

    /// Transfer funds to another user
    #[instrument(skip(self))]
    pub async fn transfer(&self, receiver_username: &str, amount: Decimal) -> Result<TransferResponse> {
        let url = format!("{}/wallet/transfer", self.base_url);
        let body = TransferRequest {
            receiver_username: receiver_username.to_string(),
            amount,
        };
        let response = self.authed(self.client.post(&url)).json(&body).send().await?;
        self.handle(response).await
    }

    /// Credit a target user's wallet (admin)
    #[instrument(skip(self))]
    pub async fn credit(&self, target_username: &str, amount: Decimal) -> Result<AdjustResponse> {
        self.adjust("credit", target_username, amount).await
    }

    /// Debit a target user's wallet (admin)
    #[instrument(skip(self))]
    pub async fn debit(&self, target_username: &str, amount: Decimal) -> Result<AdjustResponse> {
        self.adjust("debit", target_username, amount).await
    }

    async fn adjust(&self, op: &str, target_username: &str, amount: Decimal) -> Result<AdjustResponse> {
        let url = format!("{}/wallet/{}", self.base_url, op);
        let body = AdjustRequest {
            target_username: target_username.to_string(),
            amount,
        };
        let response = self.authed(self.client.post(&url)).json(&body).send().await?;
        self.handle(response).await
    }

    // ========================================================================
    // Bets
    // ========================================================================

    /// Submit a bet slip
    ///
    /// The server recomputes odds and payout authoritatively; the echoed
    /// `newBalance` is the value to trust.
    #[instrument(skip(self, request))]
    pub async fn place_bets(&self, request: &PlaceBetRequest) -> Result<PlaceBetResponse> {
        let url = format!("{}/bets/place", self.base_url);
        debug!(legs = request.bets.len(), "Placing bet slip");
        let response = self
            .authed(self.client.post(&url))
            .json(request)
            .send()
            .await?;
        self.handle(response).await
    }

    // ========================================================================
    // RBAC / admin
    // ========================================================================

    /// Paged transaction history
    #[instrument(skip(self))]
    pub async fn get_transactions(&self, page: u32, page_size: u32) -> Result<TransactionsPage> {
        let url = format!(
            "{}/rbac/transactions?page={}&pageSize={}",
            self.base_url, page, page_size
        );
        let response = self.authed(self.client.get(&url)).send().await?;
        self.handle(response).await
    }

    /// Create a user with the given role
    #[instrument(skip(self))]
    pub async fn create_user(&self, target_role: &str) -> Result<()> {
        let url = format!("{}/rbac/users", self.base_url);
        let body = CreateUserRequest {
            target_role: target_role.to_string(),
        };
        let response = self.authed(self.client.post(&url)).json(&body).send().await?;
        self.handle_empty(response).await
    }

    /// Change a user's password
    #[instrument(skip(self, new_password))]
    pub async fn change_password(&self, user_id: &str, new_password: &str) -> Result<()> {
        let url = format!("{}/rbac/users/{}/password", self.base_url, user_id);
        let body = ChangePasswordRequest {
            new_password: new_password.to_string(),
        };
        let response = self.authed(self.client.patch(&url)).json(&body).send().await?;
        self.handle_empty(response).await
    }

    /// Delete a user
    #[instrument(skip(self))]
    pub async fn delete_user(&self, user_id: &str) -> Result<()> {
        let url = format!("{}/rbac/users/{}", self.base_url, user_id);
        let response = self.authed(self.client.delete(&url)).send().await?;
        self.handle_empty(response).await
    }

    // ========================================================================
    // Withdrawals
    // ========================================================================

    /// Request a withdrawal on behalf of a target user
    #[instrument(skip(self))]
    pub async fn create_withdrawal(
        &self,
        target_username: &str,
        amount: Decimal,
    ) -> Result<WithdrawalRequest> {
        let url = format!("{}/withdrawals", self.base_url);
        let body = CreateWithdrawalRequest {
            target_username: target_username.to_string(),
            amount,
        };
        let response = self.authed(self.client.post(&url)).json(&body).send().await?;
        self.handle(response).await
    }

    /// Approve a pending withdrawal; one-shot, conflicts are terminal
    #[instrument(skip(self))]
    pub async fn approve_withdrawal(&self, id: &str) -> Result<()> {
        let url = format!("{}/withdrawals/{}/approve", self.base_url, id);
        let response = self.authed(self.client.post(&url)).send().await?;
        self.handle_empty(response).await
    }

    /// Reject a pending withdrawal; one-shot, conflicts are terminal
    #[instrument(skip(self))]
    pub async fn reject_withdrawal(&self, id: &str) -> Result<()> {
        let url = format!("{}/withdrawals/{}/reject", self.base_url, id);
        let response = self.authed(self.client.post(&url)).send().await?;
        self.handle_empty(response).await
    }

    /// Withdrawals awaiting this user's approval
    #[instrument(skip(self))]
    pub async fn pending_withdrawals(&self) -> Result<Vec<WithdrawalRequest>> {
        let url = format!("{}/withdrawals/pending", self.base_url);
        let response = self.authed(self.client.get(&url)).send().await?;
        let parsed: WithdrawalsResponse = self.handle(response).await?;
        Ok(parsed.withdrawals)
    }

    /// Withdrawals this user has requested
    #[instrument(skip(self))]
    pub async fn sent_withdrawals(&self) -> Result<Vec<WithdrawalRequest>> {
        let url = format!("{}/withdrawals/sent", self.base_url);
        let response = self.authed(self.client.get(&url)).send().await?;
        let parsed: WithdrawalsResponse = self.handle(response).await?;
        Ok(parsed.withdrawals)
    }

    // ========================================================================
    // Presence
    // ========================================================================

    /// Periodic liveness ping with optional location data
    #[instrument(skip(self, request))]
    pub async fn presence_heartbeat(&self, request: &PresenceHeartbeatRequest) -> Result<()> {
        let url = format!("{}/presence/heartbeat", self.base_url);
        let response = self
            .authed(self.client.post(&url))
            .json(request)
            .send()
            .await?;
        self.handle_empty(response).await
    }

    /// Announce session end; the server also times sessions out on its own
    #[instrument(skip(self))]
    pub async fn presence_end(&self, session_id: &str, reason: &str) -> Result<()> {
        let url = format!("{}/presence/end", self.base_url);
        let body = PresenceEndRequest {
            session_id: session_id.to_string(),
            reason: reason.to_string(),
        };
        let response = self.authed(self.client.post(&url)).json(&body).send().await?;
        self.handle_empty(response).await
    }

    /// Sessions currently considered active
    #[instrument(skip(self))]
    pub async fn active_presence(&self) -> Result<Vec<ActivePresence>> {
        let url = format!("{}/presence/active", self.base_url);
        let response = self.authed(self.client.get(&url)).send().await?;
        self.handle(response).await
    }
}
