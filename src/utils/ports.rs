use anyhow::{Context, Result};
use std::{sync::Arc, thread, time::Duration};

use crate::core::bus::HardwareHandle;

/// Source of the OS-visible serial port names.
pub trait PortLister: Send + Sync {
    fn available_ports(&self) -> Result<Vec<String>>;
}

/// Enumerates ports through `serialport`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPorts;

impl PortLister for SystemPorts {
    fn available_ports(&self) -> Result<Vec<String>> {
        let ports = serialport::available_ports().context("Failed to enumerate serial ports")?;
        Ok(sort_port_names(
            ports.into_iter().map(|port| port.port_name).collect(),
        ))
    }
}

/// Deduplicate and order port names: USB adapters first, then ACM devices,
/// then on-board serial ports, then everything else.
pub fn sort_port_names(mut names: Vec<String>) -> Vec<String> {
    fn priority(name: &str) -> i32 {
        let n = name.to_lowercase();
        if n.contains("ttyusb") || n.contains("usb") {
            0
        } else if n.contains("acm") {
            1
        } else if n.contains("ttys") || n.contains("serial") {
            2
        } else {
            10
        }
    }

    names.sort_by(|a, b| {
        priority(a)
            .cmp(&priority(b))
            .then_with(|| a.cmp(b))
    });
    names.dedup();
    names
}

/// Discovery feed: polls the port list and pokes the coordinator whenever it
/// changes, plus once right after start.
pub struct PortWatcher {
    stop: flume::Sender<()>,
    worker: Option<thread::JoinHandle<()>>,
}

impl PortWatcher {
    pub fn spawn(
        lister: Arc<dyn PortLister>,
        hardware: HardwareHandle,
        interval: Duration,
    ) -> Result<Self> {
        let (stop, stop_rx) = flume::bounded(1);
        let worker = thread::Builder::new()
            .name("port-watcher".to_string())
            .spawn(move || watch_ports(lister.as_ref(), &hardware, &stop_rx, interval))
            .context("Failed to spawn port watcher thread")?;
        Ok(Self {
            stop,
            worker: Some(worker),
        })
    }

    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = self.stop.try_send(());
            if worker.join().is_err() {
                log::error!("Port watcher thread panicked");
            }
        }
    }
}

impl Drop for PortWatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn watch_ports(
    lister: &dyn PortLister,
    hardware: &HardwareHandle,
    stop: &flume::Receiver<()>,
    interval: Duration,
) {
    let mut last: Option<Vec<String>> = None;
    loop {
        // Errors are reported by the coordinator when it re-enumerates.
        let current = lister.available_ports().unwrap_or_default();
        if last.as_ref() != Some(&current) {
            log::debug!("Port list changed: {current:?}");
            if hardware.notify_ports_changed().is_err() {
                break;
            }
            last = Some(current);
        }
        match stop.recv_timeout(interval) {
            Err(flume::RecvTimeoutError::Timeout) => continue,
            _ => break,
        }
    }
    log::debug!("Port watcher stopped");
}
