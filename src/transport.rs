//! Collaborator seams: the wireless link and the operator event log.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;

use log::info;

use crate::error::TransportError;

/// A single short-payload characteristic link to one cap.
///
/// Inbound data is not returned from these methods. Implementations push
/// every received frame, in order, through the [`InboundSender`] they were
/// built with.
pub trait Transport {
    /// Whether the link is up.
    fn is_connected(&self) -> bool;

    /// Whether a connection attempt is in progress.
    fn is_connecting(&self) -> bool;

    /// Establish the link.
    fn connect(&mut self) -> Result<(), TransportError>;

    /// Tear the link down. Never fails.
    fn disconnect(&mut self);

    /// Write one frame to the device.
    fn write(&mut self, payload: &str) -> Result<(), TransportError>;

    /// Ask for the characteristic's value; it arrives on the inbound channel.
    fn read(&mut self) -> Result<(), TransportError>;

    /// Largest frame the link currently accepts, in bytes.
    fn max_payload_length(&self) -> usize;
}

/// Append-only, ordered sink for operator-visible messages.
pub trait EventLog {
    /// Record one message.
    fn append(&mut self, message: &str);
}

/// [`EventLog`] that forwards to the `log` facade only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogFacade;

impl EventLog for LogFacade {
    fn append(&mut self, message: &str) {
        info!("{}", message);
    }
}

/// A notification from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// One complete received frame.
    Frame(String),
    /// The link dropped.
    Disconnected,
}

/// Transport-side handle of the inbound channel.
#[derive(Debug, Clone)]
pub struct InboundSender(Sender<Inbound>);

impl InboundSender {
    /// Deliver a received frame. Ignored once the receiver is gone.
    pub fn frame(&self, frame: impl Into<String>) {
        let _ = self.0.send(Inbound::Frame(frame.into()));
    }

    /// Report that the link dropped.
    pub fn disconnected(&self) {
        let _ = self.0.send(Inbound::Disconnected);
    }
}

/// Orchestrator-side handle of the inbound channel.
#[derive(Debug)]
pub struct InboundReceiver(Receiver<Inbound>);

pub(crate) enum Recv {
    Message(Inbound),
    Empty,
    Closed,
}

impl InboundReceiver {
    pub(crate) fn try_next(&self) -> Recv {
        match self.0.try_recv() {
            Ok(msg) => Recv::Message(msg),
            Err(TryRecvError::Empty) => Recv::Empty,
            Err(TryRecvError::Disconnected) => Recv::Closed,
        }
    }

    pub(crate) fn next_within(&self, timeout: Duration) -> Recv {
        match self.0.recv_timeout(timeout) {
            Ok(msg) => Recv::Message(msg),
            Err(RecvTimeoutError::Timeout) => Recv::Empty,
            Err(RecvTimeoutError::Disconnected) => Recv::Closed,
        }
    }
}

/// Create the ordered transport-to-orchestrator channel.
pub fn inbound_channel() -> (InboundSender, InboundReceiver) {
    let (tx, rx) = mpsc::channel();
    (InboundSender(tx), InboundReceiver(rx))
}
