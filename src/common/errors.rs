//! Error types for the client

use thiserror::Error;

/// Result type alias using our ClientError
pub type Result<T> = std::result::Result<T, ClientError>;

/// Result type for service-boundary functions
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// Main error type for transport-level operations
#[derive(Error, Debug)]
pub enum ClientError {
    /// WebSocket connection errors
    #[error("WebSocket connection error: {0}")]
    WebSocketConnection(String),

    /// WebSocket send/receive errors
    #[error("WebSocket communication error: {0}")]
    WebSocketCommunication(String),

    /// HTTP request errors
    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Authentication errors (401)
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Authorization errors (403)
    #[error("Not authorized: {0}")]
    Authorization(String),

    /// API rejected the request with a structured error body
    #[error("API error ({status}): {code}")]
    Api {
        status: u16,
        /// Short server error code (e.g. "insufficient_balance")
        code: String,
        message: Option<String>,
    },

    /// Invalid API response
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    /// Circuit breaker is open for the named service
    #[error("Circuit breaker open for service: {0}")]
    CircuitOpen(String),

    /// Operation was cancelled by the caller; never retried
    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Timeout errors
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Channel send errors
    #[error("Channel send error: {0}")]
    ChannelSend(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        ClientError::WebSocketCommunication(err.to_string())
    }
}

impl ClientError {
    /// HTTP status carried by this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::HttpRequest(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Broad error classification used at the service boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Network,
    Validation,
    Authentication,
    Authorization,
    NotFound,
    Conflict,
    Server,
    Unknown,
}

impl ErrorKind {
    /// Classify from an HTTP status code
    pub fn from_status(status: u16) -> Self {
        match status {
            400 | 422 => ErrorKind::Validation,
            401 => ErrorKind::Authentication,
            403 => ErrorKind::Authorization,
            404 => ErrorKind::NotFound,
            409 => ErrorKind::Conflict,
            500..=599 => ErrorKind::Server,
            _ => ErrorKind::Unknown,
        }
    }

    /// Classify from a known server error code string
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "invalid_amount" | "invalid_request" => Some(ErrorKind::Validation),
            "insufficient_balance" => Some(ErrorKind::Validation),
            "user_not_found" | "request_not_found" => Some(ErrorKind::NotFound),
            "auth_required" | "invalid_token" => Some(ErrorKind::Authentication),
            "not_authorized" => Some(ErrorKind::Authorization),
            "already_processed" | "request_expired" => Some(ErrorKind::Conflict),
            _ => None,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::Network => "network",
            ErrorKind::Validation => "validation",
            ErrorKind::Authentication => "authentication",
            ErrorKind::Authorization => "authorization",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Server => "server",
            ErrorKind::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// Error surfaced by service-layer functions
///
/// Service functions never panic and never leak transport types to callers;
/// they return this tagged shape so the UI binding can map `code` to a
/// user-facing message. Clone is required so deduplicated in-flight requests
/// can hand the same failure to every waiter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct ServiceError {
    pub kind: ErrorKind,
    /// Short server error code, when the API supplied one
    pub code: Option<String>,
    pub message: String,
}

impl ServiceError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(kind: ErrorKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: Some(code.into()),
            message: message.into(),
        }
    }
}

impl From<ClientError> for ServiceError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Api {
                status,
                code,
                message,
            } => {
                let kind = ErrorKind::from_code(&code).unwrap_or(ErrorKind::from_status(status));
                ServiceError {
                    kind,
                    message: message.unwrap_or_else(|| code.clone()),
                    code: Some(code),
                }
            }
            ClientError::Authentication(msg) => ServiceError::new(ErrorKind::Authentication, msg),
            ClientError::Authorization(msg) => ServiceError::new(ErrorKind::Authorization, msg),
            ClientError::HttpRequest(e) => {
                let kind = e
                    .status()
                    .map(|s| ErrorKind::from_status(s.as_u16()))
                    .unwrap_or(ErrorKind::Network);
                ServiceError::new(kind, e.to_string())
            }
            ClientError::Timeout(msg) => ServiceError::new(ErrorKind::Network, msg),
            ClientError::WebSocketConnection(msg) | ClientError::WebSocketCommunication(msg) => {
                ServiceError::new(ErrorKind::Network, msg)
            }
            ClientError::CircuitOpen(service) => ServiceError::new(
                ErrorKind::Network,
                format!("service temporarily unavailable: {}", service),
            ),
            other => ServiceError::new(ErrorKind::Unknown, other.to_string()),
        }
    }
}
