//! Presence heartbeat and device/session identity
//!
//! The presence record is "user is active", distinct from the auth session.
//! The server times out stale sessions on its own, which is why ending a
//! session here is best-effort only.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Notify;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::common::errors::Result;
use crate::common::retry::{with_retry, RetryConfig};
use crate::config::types::PresenceSettings;
use crate::gateway::messages::{GpsFix, IpGeo, PresenceHeartbeatRequest};
use crate::gateway::RestClient;

/// Persistence seam for the stable device identifier
///
/// The device id survives restarts; the session id never does.
pub trait IdentityStore: Send + Sync {
    fn load_device_id(&self) -> Option<String>;
    fn save_device_id(&self, id: &str) -> std::io::Result<()>;
}

/// File-backed identity store
#[derive(Debug, Clone)]
pub struct FileIdentityStore {
    path: PathBuf,
}

impl FileIdentityStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl IdentityStore for FileIdentityStore {
    fn load_device_id(&self) -> Option<String> {
        let contents = std::fs::read_to_string(&self.path).ok()?;
        let trimmed = contents.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    fn save_device_id(&self, id: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, id)
    }
}

/// In-memory identity store for tests
#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    id: Mutex<Option<String>>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn load_device_id(&self) -> Option<String> {
        self.id.lock().clone()
    }

    fn save_device_id(&self, id: &str) -> std::io::Result<()> {
        *self.id.lock() = Some(id.to_string());
        Ok(())
    }
}

/// Load the stable device id, minting and persisting one if absent
///
/// A failed save is logged and tolerated; the id is still used for this
/// process and will simply be re-minted next time.
pub fn get_or_create_device_id(store: &dyn IdentityStore) -> String {
    if let Some(id) = store.load_device_id() {
        return id;
    }
    let id = Uuid::new_v4().to_string();
    if let Err(e) = store.save_device_id(&id) {
        warn!(error = %e, "Could not persist device id");
    }
    id
}

/// Why a GPS fix could not be produced
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GpsError {
    /// The user declined the permission prompt; silent, non-fatal
    #[error("gps_denied")]
    Denied,
    #[error("gps unavailable")]
    Unavailable,
    #[error("gps timed out")]
    Timeout,
}

/// Coarse IP-based geolocation source
#[async_trait]
pub trait IpLocator: Send + Sync {
    async fn locate(&self) -> Result<IpGeo>;
}

/// Device GPS source, gated on user permission
#[async_trait]
pub trait GpsProvider: Send + Sync {
    async fn current_fix(&self) -> std::result::Result<GpsFix, GpsError>;
}

/// Heartbeat-driven presence session
pub struct PresenceSession {
    session_id: String,
    device_id: String,
    rest: Arc<RestClient>,
    settings: PresenceSettings,
    ip_locator: Option<Arc<dyn IpLocator>>,
    gps: Option<Arc<dyn GpsProvider>>,
    retry: RetryConfig,
    shutdown: Arc<Notify>,
    running: Arc<AtomicBool>,
}

impl PresenceSession {
    /// Create a session with a fresh session id and the stored device id
    pub fn new(rest: Arc<RestClient>, settings: PresenceSettings, identity: &dyn IdentityStore) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            device_id: get_or_create_device_id(identity),
            rest,
            settings,
            ip_locator: None,
            gps: None,
            retry: RetryConfig::background(),
            shutdown: Arc::new(Notify::new()),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_ip_locator(mut self, locator: Arc<dyn IpLocator>) -> Self {
        self.ip_locator = Some(locator);
        self
    }

    pub fn with_gps(mut self, gps: Arc<dyn GpsProvider>) -> Self {
        self.gps = Some(gps);
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Start the periodic heartbeat task
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            debug!("Presence heartbeat already running");
            return;
        }
        let session = self.clone();
        tokio::spawn(async move {
            let interval = Duration::from_secs(session.settings.heartbeat_interval_seconds);
            info!(
                session_id = %session.session_id,
                interval_s = session.settings.heartbeat_interval_seconds,
                "Presence heartbeat started"
            );
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = session.heartbeat_once().await {
                            // Retries are already inside; at this point the
                            // beat is lost and the next tick tries again.
                            warn!(error = %e, "Heartbeat failed");
                        }
                    }
                    _ = session.shutdown.notified() => {
                        break;
                    }
                }
            }
            session.running.store(false, Ordering::SeqCst);
            debug!("Presence heartbeat stopped");
        });
    }

    /// Send one heartbeat, bundling whatever location data resolves in time
    pub async fn heartbeat_once(&self) -> Result<()> {
        let geo_timeout = Duration::from_secs(self.settings.geo_timeout_seconds);

        let ip_data = match &self.ip_locator {
            Some(locator) => match tokio::time::timeout(geo_timeout, locator.locate()).await {
                Ok(Ok(geo)) => Some(geo),
                Ok(Err(e)) => {
                    debug!(error = %e, "IP geolocation unavailable");
                    None
                }
                Err(_) => {
                    debug!("IP geolocation timed out");
                    None
                }
            },
            None => None,
        };

        let gps_data = match &self.gps {
            Some(gps) => match tokio::time::timeout(geo_timeout, gps.current_fix()).await {
                Ok(Ok(fix)) => Some(fix),
                Ok(Err(GpsError::Denied)) => {
                    // Permission denial is an expected, silent path
                    debug!("gps_denied");
                    None
                }
                Ok(Err(e)) => {
                    debug!(error = %e, "GPS fix unavailable");
                    None
                }
                Err(_) => {
                    debug!("GPS fix timed out");
                    None
                }
            },
            None => None,
        };

        let request = PresenceHeartbeatRequest {
            session_id: self.session_id.clone(),
            device_id: self.device_id.clone(),
            ip_data,
            gps_data,
        };

        with_retry(&self.retry, || {
            let rest = self.rest.clone();
            let request = request.clone();
            async move { rest.presence_heartbeat(&request).await }
        })
        .await
    }

    /// Stop the heartbeat and tell the server the session ended
    ///
    /// Best-effort: a failed notification is swallowed because the server
    /// times out stale sessions anyway.
    pub async fn end(&self, reason: &str) {
        self.shutdown.notify_one();
        if let Err(e) = self.rest.presence_end(&self.session_id, reason).await {
            debug!(error = %e, "Presence end notification failed (ignored)");
        }
    }
}

impl std::fmt::Debug for PresenceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresenceSession")
            .field("session_id", &self.session_id)
            .field("device_id", &self.device_id)
            .finish()
    }
}
