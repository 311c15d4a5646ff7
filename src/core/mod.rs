//! Hardware polling core
//!
//! - [`coordinator`]: the single-owner actor holding configuration and
//!   session state
//! - [`poller`]: one polling session against an open serial link
//! - [`bus`]: the typed messages and the [`HardwareHandle`] front door
//! - [`peer`]: outbound notifications
//! - [`persistence`]: configuration record and stores
pub mod bus;
pub mod coordinator;
pub mod peer;
pub mod persistence;
mod poller;

pub use bus::{HardwareHandle, PlaceChecked};
pub use coordinator::Coordinator;
pub use peer::{ChannelPeer, HardwareEvent, LoggingPeer, Peer, Reading};
pub use persistence::{ConfigStore, HardwareConfig, JsonFileStore, MemoryStore};
