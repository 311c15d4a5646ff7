//! Outbound notifications from the coordinator and the poller.
//!
//! [`Peer`] is the sink the IPC front end and persistence implement. Two stock
//! sinks are provided: [`ChannelPeer`] forwards everything as
//! [`HardwareEvent`] values over a flume channel, [`LoggingPeer`] only logs.
use chrono::{DateTime, Local};

use super::persistence::HardwareConfig;
use crate::{error::ReadError, protocol::modbus::Place};

/// Result of reading one place in one rotation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub place: Place,
    pub status: u16,
    pub value: f32,
    pub error: Option<ReadError>,
    pub taken_at: DateTime<Local>,
}

impl Reading {
    pub fn new(place: Place) -> Self {
        Self {
            place,
            status: 0,
            value: 0.0,
            error: None,
            taken_at: Local::now(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Sink for every externally observable hardware event. Called from both the
/// coordinator thread and the poller thread.
pub trait Peer: Send + Sync {
    fn connected(&self);
    fn disconnected(&self);
    fn connection_error(&self, message: &str);
    fn reading(&self, reading: &Reading);
    fn config_changed(&self, config: &HardwareConfig);
    /// `None` means no place is being read right now.
    fn current_place(&self, place: Option<Place>);
    fn available_ports(&self, ports: &[String]);
}

#[derive(Debug, Clone, PartialEq)]
pub enum HardwareEvent {
    Connected,
    Disconnected,
    ConnectionError(String),
    Reading(Reading),
    ConfigChanged(HardwareConfig),
    CurrentPlace(Option<Place>),
    AvailablePorts(Vec<String>),
}

/// Flume-based peer that forwards every notification as a [`HardwareEvent`].
pub struct ChannelPeer {
    sender: flume::Sender<HardwareEvent>,
}

impl ChannelPeer {
    pub fn new() -> (Self, flume::Receiver<HardwareEvent>) {
        let (sender, receiver) = flume::unbounded();
        (Self { sender }, receiver)
    }

    fn emit(&self, event: HardwareEvent) {
        if self.sender.send(event).is_err() {
            log::debug!("Hardware event dropped: receiver is gone");
        }
    }
}

impl Peer for ChannelPeer {
    fn connected(&self) {
        self.emit(HardwareEvent::Connected);
    }

    fn disconnected(&self) {
        self.emit(HardwareEvent::Disconnected);
    }

    fn connection_error(&self, message: &str) {
        self.emit(HardwareEvent::ConnectionError(message.to_string()));
    }

    fn reading(&self, reading: &Reading) {
        self.emit(HardwareEvent::Reading(reading.clone()));
    }

    fn config_changed(&self, config: &HardwareConfig) {
        self.emit(HardwareEvent::ConfigChanged(config.clone()));
    }

    fn current_place(&self, place: Option<Place>) {
        self.emit(HardwareEvent::CurrentPlace(place));
    }

    fn available_ports(&self, ports: &[String]) {
        self.emit(HardwareEvent::AvailablePorts(ports.to_vec()));
    }
}

/// Peer that writes everything to the log, used by the standalone binary.
pub struct LoggingPeer;

impl Peer for LoggingPeer {
    fn connected(&self) {
        log::info!("Hardware connected");
    }

    fn disconnected(&self) {
        log::info!("Hardware disconnected");
    }

    fn connection_error(&self, message: &str) {
        log::error!("Hardware connection error: {message}");
    }

    fn reading(&self, reading: &Reading) {
        match &reading.error {
            None => log::info!("Place {}: {}", reading.place, reading.value),
            Some(err) => log::warn!("Place {}: {err}", reading.place),
        }
    }

    fn config_changed(&self, config: &HardwareConfig) {
        let places: Vec<usize> = config
            .enabled_places
            .iter()
            .enumerate()
            .filter(|(_, enabled)| **enabled)
            .map(|(index, _)| index)
            .collect();
        log::info!("Hardware config: port={}, places={places:?}", config.port_name);
    }

    fn current_place(&self, place: Option<Place>) {
        if let Some(place) = place {
            log::debug!("Reading place {place}");
        }
    }

    fn available_ports(&self, ports: &[String]) {
        log::info!("Available ports: {ports:?}");
    }
}
