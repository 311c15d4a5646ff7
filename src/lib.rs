//! ufo82: polling core for the ten-place sensitivity calibration rig
//!
//! Ten sensor places sit on two Modbus RTU boards sharing one serial bus. A
//! [`Coordinator`] owns the rig configuration (selected port, enabled places)
//! and runs at most one polling session at a time; the session reads a status
//! word and a float measurement from every enabled place in turn and reports
//! each [`Reading`] to a [`Peer`].
//!
//! Everything outside the core is a trait seam: [`Transport`] for the serial
//! link, [`ConfigStore`] for persistence, [`PortLister`] for port
//! enumeration, so tests can run the coordinator against fakes.

pub mod core;
pub mod error;
pub mod protocol;
pub mod transport;
pub mod utils;

pub use crate::core::{
    ChannelPeer, ConfigStore, Coordinator, HardwareConfig, HardwareEvent, HardwareHandle,
    JsonFileStore, LoggingPeer, MemoryStore, Peer, PlaceChecked, Reading,
};
pub use error::{ReadError, SessionError, TransportError};
pub use protocol::modbus::{Place, PLACE_COUNT};
pub use transport::{Interrupt, SerialLink, SerialSettings, SerialTransport, Transport};
pub use utils::{PortLister, PortWatcher, SystemPorts};
