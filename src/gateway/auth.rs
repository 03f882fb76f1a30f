//! Token seam for authenticated requests
//!
//! Authentication itself lives outside this crate; callers hand us an opaque
//! bearer token through this trait so the REST client and gateway never know
//! where tokens come from.

/// Source of the current bearer token
pub trait TokenProvider: Send + Sync {
    /// The current token, or None when the user is signed out
    fn token(&self) -> Option<String>;
}

/// Fixed token, mostly for tests and CLI usage
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: Option<String>,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    pub fn anonymous() -> Self {
        Self { token: None }
    }
}

impl TokenProvider for StaticTokenProvider {
    fn token(&self) -> Option<String> {
        self.token.clone()
    }
}
