use anyhow::{anyhow, Result};

use super::persistence::HardwareConfig;
use crate::protocol::modbus::{Place, PLACE_COUNT};

/// Answer to a poller's per-place query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaceChecked {
    pub checked: bool,
    /// Whether any place at all is enabled.
    pub any_checked: bool,
}

/// Messages accepted by the coordinator thread.
pub(crate) enum Command {
    Start,
    Stop,
    Close,
    SetPortName(String),
    SetChecked {
        place: Place,
        enabled: bool,
    },
    /// The OS port list may have changed.
    PortsChanged,
    QueryConfig(oneshot::Sender<HardwareConfig>),
    QueryPlace {
        place: Place,
        reply: oneshot::Sender<PlaceChecked>,
    },
    QueryInterrupted(oneshot::Sender<bool>),
    /// Replace the interrupt subscription of `session`; `None` clears it.
    Subscribe {
        session: u64,
        interrupt: Option<flume::Sender<()>>,
    },
    PollerExited {
        session: u64,
    },
}

/// Cloneable front door to a running coordinator. Every method is a message
/// send; queries wait for the coordinator's reply and nothing else.
#[derive(Clone)]
pub struct HardwareHandle {
    sender: flume::Sender<Command>,
}

impl HardwareHandle {
    pub(crate) fn new(sender: flume::Sender<Command>) -> Self {
        Self { sender }
    }

    /// Start a polling session unless one is already running.
    pub fn start(&self) -> Result<()> {
        self.send(Command::Start)
    }

    /// Ask the running session to stop. Returns without waiting for it.
    pub fn stop(&self) -> Result<()> {
        self.send(Command::Stop)
    }

    /// Takes effect on the next `start`.
    pub fn set_port_name(&self, port_name: impl Into<String>) -> Result<()> {
        self.send(Command::SetPortName(port_name.into()))
    }

    pub fn set_checked(&self, place: usize, enabled: bool) -> Result<()> {
        let place = checked_place(place)?;
        self.send(Command::SetChecked { place, enabled })
    }

    /// Entry point for the port discovery feed.
    pub fn notify_ports_changed(&self) -> Result<()> {
        self.send(Command::PortsChanged)
    }

    pub fn config(&self) -> Result<HardwareConfig> {
        self.ask(Command::QueryConfig)
    }

    pub fn place_checked(&self, place: usize) -> Result<PlaceChecked> {
        let place = checked_place(place)?;
        self.ask(|reply| Command::QueryPlace { place, reply })
    }

    pub(crate) fn send(&self, command: Command) -> Result<()> {
        self.sender
            .send(command)
            .map_err(|_| anyhow!("Hardware coordinator is closed"))
    }

    pub(crate) fn ask<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.send(command(reply))?;
        response
            .recv()
            .map_err(|_| anyhow!("Hardware coordinator closed before replying"))
    }
}

fn checked_place(place: usize) -> Result<Place> {
    Place::new(place).ok_or_else(|| anyhow!("Place {place} is out of range 0..{PLACE_COUNT}"))
}

/// The poller's private view of the coordinator: snapshot queries and its
/// interrupt subscription, all tagged with the session it belongs to.
pub(crate) struct PollerLink {
    handle: HardwareHandle,
    session: u64,
}

impl PollerLink {
    pub(crate) fn new(handle: HardwareHandle, session: u64) -> Self {
        Self { handle, session }
    }

    pub(crate) fn session(&self) -> u64 {
        self.session
    }

    /// `None` once the coordinator is gone.
    pub(crate) fn place_checked(&self, place: Place) -> Option<PlaceChecked> {
        self.handle
            .ask(|reply| Command::QueryPlace { place, reply })
            .ok()
    }

    /// A vanished coordinator counts as an interrupt.
    pub(crate) fn work_interrupted(&self) -> bool {
        self.handle.ask(Command::QueryInterrupted).unwrap_or(true)
    }

    pub(crate) fn subscribe(&self, interrupt: Option<flume::Sender<()>>) {
        let command = Command::Subscribe {
            session: self.session,
            interrupt,
        };
        if self.handle.send(command).is_err() {
            log::debug!("Session {}: coordinator gone, subscription dropped", self.session);
        }
    }

    pub(crate) fn exited(&self) {
        let _ = self.handle.send(Command::PollerExited {
            session: self.session,
        });
    }
}
