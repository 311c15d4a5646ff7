#![allow(dead_code)]

use parking_lot::Mutex;
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use ufo82::{
    ChannelPeer, Coordinator, HardwareEvent, Interrupt, MemoryStore, PortLister, SerialLink,
    Transport, TransportError,
};

pub const WAIT: Duration = Duration::from_secs(5);

pub type Responder = Arc<dyn Fn(&[u8]) -> Result<Vec<u8>, TransportError> + Send + Sync>;

/// Modbus RTU CRC16, low byte first on the wire.
pub fn crc16(data: &[u8]) -> [u8; 2] {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc ^= u16::from(byte);
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ 0xA001;
            } else {
                crc >>= 1;
            }
        }
    }
    crc.to_le_bytes()
}

pub fn holdings_reply(unit: u8, payload: &[u8]) -> Vec<u8> {
    let mut frame = vec![unit, 0x03, payload.len() as u8];
    frame.extend_from_slice(payload);
    let crc = crc16(&frame);
    frame.extend_from_slice(&crc);
    frame
}

/// Which place and which register kind a request addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Status(usize),
    Value(usize),
}

pub fn decode_request(request: &[u8]) -> Target {
    let bank = if request[0] == 17 { 0 } else { 5 };
    let register = u16::from_be_bytes([request[2], request[3]]) as usize;
    let place = bank + register / 6;
    match register % 6 {
        2 => Target::Status(place),
        4 => Target::Value(place),
        other => panic!("unexpected register offset {other}"),
    }
}

/// A rig where every place is healthy and reads `10 + place`.
pub fn healthy_rig() -> Responder {
    Arc::new(|request: &[u8]| {
        Ok(match decode_request(request) {
            Target::Status(_) => holdings_reply(request[0], &[0, 0]),
            Target::Value(place) => holdings_reply(request[0], &(10.0 + place as f32).to_be_bytes()),
        })
    })
}

pub struct FakeTransport {
    responder: Responder,
    open_error: Option<TransportError>,
    close_error: Option<TransportError>,
    open_delay: Duration,
    delay: Duration,
    honors_interrupt: bool,
    opens: AtomicUsize,
    requests: Arc<Mutex<Vec<Target>>>,
}

impl FakeTransport {
    pub fn new(responder: Responder) -> Self {
        Self {
            responder,
            open_error: None,
            close_error: None,
            open_delay: Duration::ZERO,
            delay: Duration::from_millis(1),
            honors_interrupt: true,
            opens: AtomicUsize::new(0),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing_open(reason: &str) -> Self {
        let mut transport = Self::new(healthy_rig());
        transport.open_error = Some(TransportError::ConnectionFailed {
            port: "COM1".to_string(),
            reason: reason.to_string(),
        });
        transport
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = delay;
        self
    }

    /// Exchanges run to completion regardless of the interrupt, like a
    /// transport without a cancellation point inside its I/O.
    pub fn ignoring_interrupt(mut self) -> Self {
        self.honors_interrupt = false;
        self
    }

    pub fn failing_close(mut self, reason: &str) -> Self {
        self.close_error = Some(TransportError::ConnectionFailed {
            port: "COM1".to_string(),
            reason: reason.to_string(),
        });
        self
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<Target> {
        self.requests.lock().clone()
    }
}

impl Transport for FakeTransport {
    fn open(&self, _port_name: &str) -> Result<Box<dyn SerialLink>, TransportError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        thread::sleep(self.open_delay);
        if let Some(err) = &self.open_error {
            return Err(err.clone());
        }
        Ok(Box::new(FakeLink {
            responder: Arc::clone(&self.responder),
            delay: self.delay,
            honors_interrupt: self.honors_interrupt,
            close_error: self.close_error.clone(),
            requests: Arc::clone(&self.requests),
        }))
    }
}

struct FakeLink {
    responder: Responder,
    delay: Duration,
    honors_interrupt: bool,
    close_error: Option<TransportError>,
    requests: Arc<Mutex<Vec<Target>>>,
}

impl SerialLink for FakeLink {
    fn exchange(
        &mut self,
        request: &[u8],
        interrupt: &Interrupt,
    ) -> Result<Vec<u8>, TransportError> {
        self.requests.lock().push(decode_request(request));
        let deadline = Instant::now() + self.delay;
        while Instant::now() < deadline {
            if self.honors_interrupt && interrupt.is_raised() {
                return Err(TransportError::Canceled);
            }
            thread::sleep(Duration::from_millis(1));
        }
        (self.responder)(request)
    }

    fn close(self: Box<Self>) -> Result<(), TransportError> {
        match self.close_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Port lister whose answer the test can change.
#[derive(Default)]
pub struct FakePorts {
    answer: Mutex<Option<Vec<String>>>,
}

impl FakePorts {
    pub fn set(&self, ports: &[&str]) {
        *self.answer.lock() = Some(ports.iter().map(|p| p.to_string()).collect());
    }

    pub fn fail(&self) {
        *self.answer.lock() = None;
    }
}

impl PortLister for FakePorts {
    fn available_ports(&self) -> anyhow::Result<Vec<String>> {
        self.answer
            .lock()
            .clone()
            .ok_or_else(|| anyhow::anyhow!("enumeration failed"))
    }
}

pub struct Rig {
    pub coordinator: Coordinator,
    pub events: flume::Receiver<HardwareEvent>,
    pub transport: Arc<FakeTransport>,
    pub ports: Arc<FakePorts>,
    pub store: MemoryStore,
}

pub fn spawn_rig(transport: FakeTransport, store: MemoryStore) -> Rig {
    let (peer, events) = ChannelPeer::new();
    let transport = Arc::new(transport);
    let ports = Arc::new(FakePorts::default());
    let coordinator = Coordinator::spawn(
        Arc::new(peer),
        Box::new(store.clone()),
        transport.clone(),
        ports.clone(),
    )
    .unwrap();
    Rig {
        coordinator,
        events,
        transport,
        ports,
        store,
    }
}

/// Collect events until one satisfies `done`; the matching event is the last
/// element of the returned vector.
pub fn collect_until(
    events: &flume::Receiver<HardwareEvent>,
    done: impl Fn(&HardwareEvent) -> bool,
) -> Vec<HardwareEvent> {
    let deadline = Instant::now() + WAIT;
    let mut seen = Vec::new();
    loop {
        let left = deadline.saturating_duration_since(Instant::now());
        match events.recv_timeout(left) {
            Ok(event) => {
                let finished = done(&event);
                seen.push(event);
                if finished {
                    return seen;
                }
            }
            Err(_) => panic!("timed out waiting for event, saw {seen:?}"),
        }
    }
}

pub fn count(events: &[HardwareEvent], matches: impl Fn(&HardwareEvent) -> bool) -> usize {
    events.iter().filter(|event| matches(event)).count()
}

/// Send `start` until a new session connects. A start that races the
/// previous poller's exit is ignored by the coordinator, so it is retried.
pub fn start_session(rig: &Rig) {
    let deadline = Instant::now() + WAIT;
    loop {
        assert!(Instant::now() < deadline, "no session connected");
        rig.coordinator.handle().start().unwrap();
        match rig.events.recv_timeout(Duration::from_millis(50)) {
            Ok(HardwareEvent::Connected) => return,
            Ok(other) => panic!("unexpected event before connect: {other:?}"),
            Err(_) => continue,
        }
    }
}
