use thiserror::Error;

use skychat_shared::{PeerId, RepositoryError, Route};

/// Errors while reading or writing a single frame.
#[derive(Error, Debug)]
pub enum FrameError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended cleanly between two frames.
    #[error("Connection closed")]
    Closed,

    #[error("Truncated length prefix: got {got} of 4 bytes")]
    TruncatedPrefix { got: usize },

    #[error("Truncated frame: expected {expected} bytes, got {got}")]
    Truncated { expected: usize, got: usize },

    #[error("Frame of {0} bytes exceeds the size limit")]
    TooLarge(usize),
}

#[derive(Error, Debug)]
pub enum NetError {
    #[error("Frame error on connection to {peer}: {source}")]
    Frame { peer: PeerId, source: FrameError },

    #[error("Malformed message from {peer}: {source}")]
    Decode {
        peer: PeerId,
        source: serde_json::Error,
    },

    #[error("Message encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Message from {peer} claims foreign root {root}")]
    SpoofedRoot { peer: PeerId, root: Route },

    #[error("Dial to {peer} failed after {attempts} attempts: {source}")]
    DialExhausted {
        peer: PeerId,
        attempts: u32,
        source: std::io::Error,
    },

    #[error("Cannot listen on port {port}: {source}")]
    Listen { port: u16, source: std::io::Error },

    #[error("Accept failed: {0}")]
    Accept(std::io::Error),

    #[error("Write to {peer} failed: {source}")]
    Write { peer: PeerId, source: FrameError },

    #[error("Refusing to dial the local visor")]
    SelfDial,

    #[error("Persisting sent message failed: {0}")]
    Persist(#[from] RepositoryError),
}
