//! The disguised tunnel.
//!
//! Everything past a successful login lives here: the byte-exact disguise
//! payloads ([`disguise`]), the encrypted byte transport hidden inside them
//! ([`transport`]), and the per-connection session that wires the transport,
//! the housekeeping timers, and the stream multiplexer together
//! ([`session`]).

pub mod disguise;
pub mod session;
pub mod transport;
