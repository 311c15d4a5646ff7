//! Serial transport capability used by the poller.
//!
//! A [`Transport`] opens a [`SerialLink`] for a port name; the link performs
//! request/response exchanges until it is closed. Errors are classified by
//! [`TransportError`] so the poller can tell a dead link from a single bad
//! exchange or a cancellation.
mod serial;

use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::TransportError;

pub use serial::{SerialSettings, SerialTransport};

pub trait Transport: Send + Sync {
    fn open(&self, port_name: &str) -> Result<Box<dyn SerialLink>, TransportError>;
}

pub trait SerialLink: Send {
    /// Send `request` and collect the response frame. Implementations may
    /// poll `interrupt` while waiting and return [`TransportError::Canceled`]
    /// once it is raised; the poller checks it again between exchanges.
    fn exchange(&mut self, request: &[u8], interrupt: &Interrupt)
        -> Result<Vec<u8>, TransportError>;

    fn close(self: Box<Self>) -> Result<(), TransportError>;
}

/// Receiving end of an interrupt subscription. Once raised it stays raised.
pub struct Interrupt {
    receiver: flume::Receiver<()>,
    raised: AtomicBool,
}

impl Interrupt {
    /// Create a subscription. The sender is handed to whoever may cancel the
    /// session; sending never blocks because at most one signal is kept.
    pub fn channel() -> (flume::Sender<()>, Interrupt) {
        let (sender, receiver) = flume::bounded(1);
        let interrupt = Interrupt {
            receiver,
            raised: AtomicBool::new(false),
        };
        (sender, interrupt)
    }

    pub fn is_raised(&self) -> bool {
        if self.raised.load(Ordering::Acquire) {
            return true;
        }
        if self.receiver.try_recv().is_ok() {
            self.raised.store(true, Ordering::Release);
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interrupt_latches() {
        let (sender, interrupt) = Interrupt::channel();
        assert!(!interrupt.is_raised());
        sender.try_send(()).unwrap();
        assert!(sender.try_send(()).is_err());
        assert!(interrupt.is_raised());
        assert!(interrupt.is_raised());
    }

    #[test]
    fn test_dropped_sender_is_not_an_interrupt() {
        let (sender, interrupt) = Interrupt::channel();
        drop(sender);
        assert!(!interrupt.is_raised());
    }
}
