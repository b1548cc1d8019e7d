//! Error types for the command protocol and sync session.

use std::time::Duration;

/// A frame was rejected because it does not start with the command prefix.
///
/// The whole frame is discarded; nothing from it is applied.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Malformed frame {frame:?} (expected leading '_')")]
pub struct FormatError {
    /// The rejected frame text.
    pub frame: String,
}

impl FormatError {
    pub(crate) fn new(frame: &str) -> Self {
        Self {
            frame: frame.to_owned(),
        }
    }
}

/// Failures reported by a [`Transport`](crate::Transport) implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// No link to the device is established.
    #[error("Device not connected")]
    NotConnected,

    /// Establishing the link failed.
    #[error("Connect failed: {0}")]
    ConnectFailed(String),

    /// A characteristic write was not confirmed.
    #[error("Write failed: {0}")]
    WriteFailed(String),

    /// A characteristic read could not be issued.
    #[error("Read failed: {0}")]
    ReadFailed(String),
}

/// Errors surfaced by [`SyncOrchestrator`](crate::SyncOrchestrator).
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// An inbound frame did not carry the command prefix.
    #[error(transparent)]
    Format(#[from] FormatError),

    /// The encoded command does not fit in one transport write.
    #[error("Command is {len} bytes but the link accepts at most {max}")]
    PayloadTooLarge {
        /// Length of the encoded command.
        len: usize,
        /// The transport's current maximum payload length.
        max: usize,
    },

    /// The transport rejected a connect, read or write.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The operation needs a connected device.
    #[error("Device not connected")]
    NotConnected,

    /// No frame arrived within the configured read timeout.
    #[error("No frame received within {0:?}")]
    ReadTimeout(Duration),

    /// The link dropped while a frame was still expected.
    #[error("Device disconnected while a frame was outstanding")]
    Disconnected,

    /// Every [`InboundSender`](crate::InboundSender) has been dropped.
    #[error("Inbound channel closed")]
    ChannelClosed,
}
