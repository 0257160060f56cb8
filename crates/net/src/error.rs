//! Error type shared by the transport, router and coordinator layers.

use std::io;

/// Everything that can go wrong on a connection.
///
/// None of these are fatal to a running game: transport faults drop the connection,
/// decode faults drop the frame, and timeouts feed the elimination policy.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("connection lost")]
    ConnectionLost,
    #[error("invalid frame length: {0} bytes")]
    FrameLength(u32),
    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to decode message: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("connection rejected: {0}")]
    Rejected(String),
    #[error("host disconnected")]
    HostDisconnected,
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),
    #[error("shutdown requested")]
    Cancelled,
}

impl NetError {
    /// Map an I/O error from a stream read/write to the right variant.
    pub(crate) fn from_stream(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => NetError::ConnectionLost,
            _ => NetError::Io(err),
        }
    }

    /// The connection is unusable after this error.
    pub fn is_connection_fault(&self) -> bool {
        matches!(
            self,
            NetError::Io(_)
                | NetError::ConnectionLost
                | NetError::FrameLength(_)
                | NetError::HostDisconnected
        )
    }

    /// The frame was consumed whole, so the stream can keep going.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, NetError::Decode(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eof_is_connection_lost() {
        let err = NetError::from_stream(io::Error::new(io::ErrorKind::UnexpectedEof, "eof"));
        assert!(matches!(err, NetError::ConnectionLost));
        assert!(err.is_connection_fault());
        assert!(!err.is_recoverable());
    }

    #[test]
    fn decode_errors_are_recoverable() {
        let json_err = serde_json::from_str::<u32>("nope").unwrap_err();
        let err = NetError::Decode(json_err);
        assert!(err.is_recoverable());
        assert!(!err.is_connection_fault());
    }
}
