//! One polling session: open the port, rotate over the enabled places, close.
//!
//! The poller never touches coordinator state directly. It asks for a
//! snapshot of each place before reading it and for the interrupt flag
//! between protocol steps, so a `Stop` is observed after at most one register
//! exchange.
use std::sync::Arc;

use super::{
    bus::PollerLink,
    peer::{Peer, Reading},
};
use crate::{
    error::{ReadError, SessionError},
    protocol::modbus::{
        generate_pull_get_status_request, generate_pull_get_value_request, parse_pull_get_status,
        parse_pull_get_value, Place, PlaceRequest,
    },
    transport::{Interrupt, SerialLink, Transport},
};

pub(crate) struct Poller {
    pub(crate) port_name: String,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) peer: Arc<dyn Peer>,
    pub(crate) link: PollerLink,
}

/// Tells the coordinator the session is over, however the poller leaves.
struct ExitGuard<'a> {
    link: &'a PollerLink,
}

impl Drop for ExitGuard<'_> {
    fn drop(&mut self) {
        self.link.subscribe(None);
        self.link.exited();
    }
}

/// An open link. Dropping it reports the disconnect and closes the port.
struct OpenSession<'a> {
    port: Option<Box<dyn SerialLink>>,
    peer: &'a dyn Peer,
}

impl OpenSession<'_> {
    fn port(&mut self) -> &mut dyn SerialLink {
        match self.port.as_deref_mut() {
            Some(port) => port,
            None => unreachable!("serial link used after close"),
        }
    }
}

impl Drop for OpenSession<'_> {
    fn drop(&mut self) {
        self.peer.disconnected();
        if let Some(port) = self.port.take() {
            if let Err(err) = port.close() {
                self.peer.connection_error(&err.to_string());
            }
        }
    }
}

impl Poller {
    pub(crate) fn run(self) {
        let _exit = ExitGuard { link: &self.link };
        let session_id = self.link.session();
        log::info!("Session {session_id}: opening {}", self.port_name);

        let port = match self.transport.open(&self.port_name) {
            Ok(port) => port,
            Err(source) => {
                let err = SessionError::Open { source };
                log::error!("Session {session_id}: {err}");
                self.peer.connection_error(&err.to_string());
                return;
            }
        };
        self.peer.connected();

        let (interrupt_tx, interrupt) = Interrupt::channel();
        self.link.subscribe(Some(interrupt_tx));

        let mut session = OpenSession {
            port: Some(port),
            peer: &*self.peer,
        };
        match self.rotate(&mut session, &interrupt) {
            Ok(()) => log::info!("Session {session_id}: stopped"),
            Err(err) => {
                log::error!("Session {session_id}: {err}");
                self.peer.connection_error(&err.to_string());
            }
        }
    }

    /// Cycle over all places until the session is stopped or fails.
    fn rotate(
        &self,
        session: &mut OpenSession<'_>,
        interrupt: &Interrupt,
    ) -> Result<(), SessionError> {
        loop {
            for place in Place::all() {
                let Some(checked) = self.link.place_checked(place) else {
                    return Ok(());
                };
                if !checked.any_checked {
                    return Err(SessionError::NoPlacesSelected);
                }
                if !checked.checked {
                    continue;
                }

                self.peer.current_place(Some(place));
                let reading = self.read_place(session.port(), place, interrupt);
                self.peer.current_place(None);

                self.peer.reading(&reading);
                if reading.error.as_ref().is_some_and(ReadError::is_canceled) {
                    return Ok(());
                }

                if let Some(ReadError::Transport { source }) = reading.error {
                    if source.is_connection_failed() {
                        return Err(SessionError::ConnectionLost { source });
                    }
                }
                if self.link.work_interrupted() {
                    return Ok(());
                }
            }
        }
    }

    fn read_place(
        &self,
        port: &mut dyn SerialLink,
        place: Place,
        interrupt: &Interrupt,
    ) -> Reading {
        let mut reading = Reading::new(place);
        if let Err(err) = self.fetch_place(port, interrupt, &mut reading) {
            if !err.is_canceled() {
                log::warn!("Place {place}: {err}");
            }
            reading.error = Some(err);
        }
        reading
    }

    fn fetch_place(
        &self,
        port: &mut dyn SerialLink,
        interrupt: &Interrupt,
        reading: &mut Reading,
    ) -> Result<(), ReadError> {
        let request = generate_pull_get_status_request(reading.place)?;
        let response = exchange(port, &request, interrupt)?;
        match parse_pull_get_status(&response) {
            Ok(status) => reading.status = status,
            Err(err) => {
                if let ReadError::DeviceStatus { status } = &err {
                    reading.status = *status;
                }
                return Err(err);
            }
        }

        if self.link.work_interrupted() {
            return Err(ReadError::Interrupted);
        }

        let request = generate_pull_get_value_request(reading.place)?;
        let response = exchange(port, &request, interrupt)?;
        match parse_pull_get_value(&response) {
            Ok(value) => {
                reading.value = value;
                Ok(())
            }
            Err(err) => {
                if let ReadError::ValueOutOfRange { value } = &err {
                    reading.value = *value;
                }
                Err(err)
            }
        }
    }
}

fn exchange(
    port: &mut dyn SerialLink,
    request: &PlaceRequest,
    interrupt: &Interrupt,
) -> Result<Vec<u8>, ReadError> {
    let response = port.exchange(request.frame(), interrupt)?;
    request.check_response(&response)?;
    Ok(response)
}
