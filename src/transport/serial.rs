use std::{
    io::{self, Read, Write},
    time::{Duration, Instant},
};

use serialport::{ClearBuffer, SerialPort};

use super::{Interrupt, SerialLink, Transport};
use crate::{error::TransportError, protocol::modbus::hex};

/// Line and timing parameters of the rig's RS-485 bus.
#[derive(Debug, Clone)]
pub struct SerialSettings {
    pub baud_rate: u32,
    /// How long to wait for the first byte of a response.
    pub response_timeout: Duration,
    /// Silence after which a started response is considered complete.
    pub byte_timeout: Duration,
    /// Number of times a request is sent before a timeout is reported.
    pub attempts: u32,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            response_timeout: Duration::from_secs(1),
            byte_timeout: Duration::from_millis(50),
            attempts: 1,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SerialTransport {
    settings: SerialSettings,
}

impl SerialTransport {
    pub fn new(settings: SerialSettings) -> Self {
        Self { settings }
    }
}

impl Transport for SerialTransport {
    fn open(&self, port_name: &str) -> Result<Box<dyn SerialLink>, TransportError> {
        let port = open_serial_port(port_name, &self.settings)?;
        log::info!(
            "Opened {port_name} at {} baud",
            self.settings.baud_rate
        );
        Ok(Box::new(SerialPortLink {
            port_name: port_name.to_string(),
            port,
            settings: self.settings.clone(),
        }))
    }
}

/// Open a serial port with the inter-byte timeout as the read timeout,
/// enabling exclusive access on Unix systems.
fn open_serial_port(
    port_name: &str,
    settings: &SerialSettings,
) -> Result<Box<dyn SerialPort>, TransportError> {
    let failed = |reason: String| TransportError::ConnectionFailed {
        port: port_name.to_string(),
        reason,
    };
    let builder = serialport::new(port_name, settings.baud_rate).timeout(settings.byte_timeout);

    #[cfg(unix)]
    {
        let mut handle = builder.open_native().map_err(|err| failed(err.to_string()))?;
        handle
            .set_exclusive(true)
            .map_err(|err| failed(format!("no exclusive access: {err}")))?;
        Ok(Box::new(handle))
    }

    #[cfg(not(unix))]
    {
        builder.open().map_err(|err| failed(err.to_string()))
    }
}

struct SerialPortLink {
    port_name: String,
    port: Box<dyn SerialPort>,
    settings: SerialSettings,
}

impl SerialPortLink {
    fn connection_failed(&self, err: impl ToString) -> TransportError {
        TransportError::ConnectionFailed {
            port: self.port_name.clone(),
            reason: err.to_string(),
        }
    }

    fn send(&mut self, request: &[u8]) -> Result<(), TransportError> {
        self.port
            .clear(ClearBuffer::Input)
            .map_err(|err| self.connection_failed(err))?;
        self.port
            .write_all(request)
            .and_then(|_| self.port.flush())
            .map_err(|err| self.connection_failed(err))?;
        log::debug!("{} <- {}", self.port_name, hex(request));
        Ok(())
    }

    fn receive(&mut self, interrupt: &Interrupt) -> Result<Vec<u8>, TransportError> {
        let started = Instant::now();
        let mut frame = Vec::new();
        let mut buffer = [0u8; 256];

        loop {
            if interrupt.is_raised() {
                return Err(TransportError::Canceled);
            }
            match self.port.read(&mut buffer) {
                Ok(0) => {}
                Ok(n) => {
                    frame.extend_from_slice(&buffer[..n]);
                    continue;
                }
                Err(err) if err.kind() == io::ErrorKind::TimedOut => {}
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(self.connection_failed(err)),
            }

            if !frame.is_empty() {
                log::debug!("{} -> {}", self.port_name, hex(&frame));
                return Ok(frame);
            }
            if started.elapsed() >= self.settings.response_timeout {
                return Err(TransportError::Timeout {
                    waited_ms: started.elapsed().as_millis() as u64,
                });
            }
        }
    }
}

impl SerialLink for SerialPortLink {
    fn exchange(
        &mut self,
        request: &[u8],
        interrupt: &Interrupt,
    ) -> Result<Vec<u8>, TransportError> {
        let attempts = self.settings.attempts.max(1);
        let mut attempt = 1;
        loop {
            self.send(request)?;
            match self.receive(interrupt) {
                Err(TransportError::Timeout { .. }) if attempt < attempts => {
                    log::debug!(
                        "{}: no response, attempt {attempt} of {attempts}",
                        self.port_name
                    );
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    fn close(self: Box<Self>) -> Result<(), TransportError> {
        log::info!("Closed {}", self.port_name);
        Ok(())
    }
}
