//! Platform API surface: REST client, live channel gateway, auth seam

pub mod auth;
pub mod messages;
pub mod rest;
pub mod websocket;

pub use auth::{StaticTokenProvider, TokenProvider};
pub use rest::RestClient;
pub use websocket::{GatewayConfig, GatewayState, ListenerId, WsGateway};
