//! Shared utilities
pub mod ports;

pub use ports::{sort_port_names, PortLister, PortWatcher, SystemPorts};
