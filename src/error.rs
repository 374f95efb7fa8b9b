//! Error types for the Minewire server.

use thiserror::Error;

/// Result type alias for Minewire operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the Minecraft framing primitives.
///
/// The codec is pure: these never carry I/O state.
#[derive(Error, Debug)]
pub enum CodecError {
    /// Packet data ended before the value was complete
    #[error("unexpected end of packet data")]
    Truncated,

    /// A VarInt ran past five bytes without terminating
    #[error("varint exceeds five bytes")]
    Overlong,

    /// A declared length exceeds the protocol cap
    #[error("declared length exceeds protocol limit")]
    TooLarge,

    /// String bytes were not valid UTF-8
    #[error(transparent)]
    Utf8(#[from] std::str::Utf8Error),
}

/// Errors that can occur while serving connections.
#[derive(Error, Debug)]
pub enum Error {
    /// Outer or inner packet framing violation
    #[error("framing error: {0}")]
    Codec(#[from] CodecError),

    /// Network I/O error
    #[error("network error: {0}")]
    Network(#[from] std::io::Error),

    /// Cryptographic operation failed
    #[error("cryptographic error: {0}")]
    Crypto(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Stream multiplexer protocol violation
    #[error("multiplexer error: {0}")]
    Mux(String),

    /// Status JSON serialization failed
    #[error("status serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a new cryptographic error
    pub fn crypto(msg: impl Into<String>) -> Self {
        Error::Crypto(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a new multiplexer error
    pub fn mux(msg: impl Into<String>) -> Self {
        Error::Mux(msg.into())
    }

    /// True when the error is the peer simply hanging up.
    pub fn is_disconnect(&self) -> bool {
        matches!(
            self,
            Error::Network(e) if e.kind() == std::io::ErrorKind::UnexpectedEof
        )
    }
}
