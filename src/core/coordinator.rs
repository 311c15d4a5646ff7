//! Single owner of the hardware configuration and session state.
//!
//! The coordinator runs on its own thread and is reachable only through
//! [`HardwareHandle`] messages. It spawns at most one poller at a time,
//! answers the poller's snapshot queries, and delivers `Stop`/`Close` to the
//! running session through its interrupt subscription.
//!
//! ```text
//! Idle --start--> Running --poller exit--> Idle
//! Running --stop--> Running (interrupt raised, poller leaves on its own)
//! Running --close--> Draining --poller exit--> Terminated
//! Idle --close--> Terminated
//! ```
use anyhow::{anyhow, Context, Result};
use std::{ops::ControlFlow, sync::Arc, thread};

use super::{
    bus::{Command, HardwareHandle, PlaceChecked, PollerLink},
    peer::Peer,
    persistence::{load_or_default, ConfigStore, HardwareConfig},
    poller::Poller,
};
use crate::{protocol::modbus::Place, transport::Transport, utils::ports::PortLister};

/// Owning side of a running coordinator. Dropping it closes the coordinator.
pub struct Coordinator {
    handle: HardwareHandle,
    worker: Option<thread::JoinHandle<()>>,
}

impl Coordinator {
    /// Load the configuration from `store` and start the coordinator thread.
    pub fn spawn(
        peer: Arc<dyn Peer>,
        store: Box<dyn ConfigStore>,
        transport: Arc<dyn Transport>,
        ports: Arc<dyn PortLister>,
    ) -> Result<Self> {
        let (sender, receiver) = flume::unbounded();
        let handle = HardwareHandle::new(sender);
        let config = load_or_default(store.as_ref());

        let actor = CoordinatorActor {
            peer,
            store,
            transport,
            ports,
            handle: handle.clone(),
            config,
            started: false,
            current_work_interrupted: false,
            waiting_for_poller_exit: false,
            interrupt: None,
            session: 0,
        };
        let worker = thread::Builder::new()
            .name("hardware-coordinator".to_string())
            .spawn(move || actor.run(receiver))
            .context("Failed to spawn hardware coordinator thread")?;

        Ok(Self {
            handle,
            worker: Some(worker),
        })
    }

    pub fn handle(&self) -> &HardwareHandle {
        &self.handle
    }

    /// Interrupt any running session, wait until its poller has exited, and
    /// stop the coordinator thread.
    pub fn close(mut self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        // A failed send means the thread is already gone; joining still reaps it.
        let _ = self.handle.send(Command::Close);
        worker
            .join()
            .map_err(|_| anyhow!("Hardware coordinator thread panicked"))
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            log::error!("{err}");
        }
    }
}

struct CoordinatorActor {
    peer: Arc<dyn Peer>,
    store: Box<dyn ConfigStore>,
    transport: Arc<dyn Transport>,
    ports: Arc<dyn PortLister>,
    /// Cloned into each poller so it can reach back.
    handle: HardwareHandle,

    config: HardwareConfig,
    started: bool,
    current_work_interrupted: bool,
    waiting_for_poller_exit: bool,
    interrupt: Option<flume::Sender<()>>,
    /// Id of the latest poller; messages from older ones are ignored.
    session: u64,
}

impl CoordinatorActor {
    fn run(mut self, receiver: flume::Receiver<Command>) {
        log::info!("Hardware coordinator started, port {}", self.config.port_name);
        self.peer.config_changed(&self.config);

        while let Ok(command) = receiver.recv() {
            if self.handle_command(command).is_break() {
                break;
            }
        }
        log::info!("Hardware coordinator stopped");
    }

    fn handle_command(&mut self, command: Command) -> ControlFlow<()> {
        match command {
            Command::QueryInterrupted(reply) => {
                let _ = reply.send(self.current_work_interrupted);
            }
            Command::QueryPlace { place, reply } => {
                let _ = reply.send(PlaceChecked {
                    checked: self.config.is_enabled(place),
                    any_checked: self.config.any_enabled(),
                });
            }
            Command::QueryConfig(reply) => {
                let _ = reply.send(self.config.clone());
            }
            Command::Subscribe { session, interrupt } => {
                if session != self.session {
                    log::debug!("Ignoring subscription from stale session {session}");
                } else {
                    self.interrupt = interrupt;
                    // A stop that arrived before the poller subscribed must still reach it.
                    if self.started && self.current_work_interrupted {
                        self.signal_interrupt();
                    }
                }
            }
            Command::Close => {
                if self.started {
                    log::info!("Close requested, waiting for session {} to exit", self.session);
                    self.signal_interrupt();
                    self.current_work_interrupted = true;
                    self.waiting_for_poller_exit = true;
                } else {
                    return ControlFlow::Break(());
                }
            }
            Command::PortsChanged => self.refresh_ports(),
            Command::SetChecked { place, enabled } => self.set_checked(place, enabled),
            Command::SetPortName(port_name) => self.set_port_name(port_name),
            Command::PollerExited { session } => {
                if session == self.session {
                    self.interrupt = None;
                    if self.waiting_for_poller_exit {
                        return ControlFlow::Break(());
                    }
                    self.started = false;
                }
            }
            Command::Start => self.start(),
            Command::Stop => {
                self.signal_interrupt();
                self.current_work_interrupted = true;
            }
        }
        ControlFlow::Continue(())
    }

    fn start(&mut self) {
        if self.started {
            log::debug!("Start ignored: session {} is running", self.session);
            return;
        }
        self.session += 1;
        self.started = true;
        self.current_work_interrupted = false;
        self.interrupt = None;

        let poller = Poller {
            port_name: self.config.port_name.clone(),
            transport: Arc::clone(&self.transport),
            peer: Arc::clone(&self.peer),
            link: PollerLink::new(self.handle.clone(), self.session),
        };
        let spawned = thread::Builder::new()
            .name(format!("hardware-poller-{}", self.session))
            .spawn(move || poller.run());
        if let Err(err) = spawned {
            log::error!("Failed to spawn poller thread: {err}");
            self.peer
                .connection_error(&format!("failed to start polling: {err}"));
            self.started = false;
        }
    }

    fn signal_interrupt(&self) {
        if let Some(interrupt) = &self.interrupt {
            // Full means a signal is already pending; disconnected means the
            // poller is on its way out.
            let _ = interrupt.try_send(());
        }
    }

    fn set_port_name(&mut self, port_name: String) {
        if self.config.port_name == port_name {
            return;
        }
        log::info!("Port changed: {} -> {port_name}", self.config.port_name);
        self.config.port_name = port_name;
        self.commit_config();
    }

    fn set_checked(&mut self, place: Place, enabled: bool) {
        if self.config.set_enabled(place, enabled) {
            log::info!("Place {place} enabled={enabled}");
            self.commit_config();
        }
    }

    fn refresh_ports(&mut self) {
        let ports = match self.ports.available_ports() {
            Ok(ports) => ports,
            Err(err) => {
                log::warn!("Port enumeration failed: {err:#}");
                self.peer.connection_error(&format!("{err:#}"));
                Vec::new()
            }
        };
        self.peer.available_ports(&ports);

        if ports.contains(&self.config.port_name) {
            return;
        }
        if let Some(first) = ports.first() {
            log::info!(
                "Port {} disappeared, selecting {first}",
                self.config.port_name
            );
            self.config.port_name = first.clone();
            self.commit_config();
        }
    }

    /// Persist the configuration and tell the peer. Save failures are logged;
    /// the in-memory copy stays authoritative.
    fn commit_config(&mut self) {
        if let Err(err) = self.store.save(&self.config) {
            log::warn!("Failed to save hardware config: {err:#}");
        }
        self.peer.config_changed(&self.config);
    }
}
