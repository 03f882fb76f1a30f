//! Presence heartbeat and identity

pub mod session;

pub use session::{
    get_or_create_device_id, FileIdentityStore, GpsError, GpsProvider, IdentityStore, IpLocator,
    MemoryIdentityStore, PresenceSession,
};
