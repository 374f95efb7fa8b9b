//! # Minewire
//!
//! A TCP tunneling proxy that masquerades as a Minecraft Java Edition server.
//!
//! To anything probing the listen port — a server list ping, a vanilla
//! client, a port scanner — this is an ordinary Minecraft server: it answers
//! the handshake, serves a status JSON with a live-looking player count, and
//! completes the login exchange. Clients that log in with a name derived
//! from a shared secret instead get an encrypted, stream-multiplexed tunnel:
//! outbound tunnel bytes ride inside fabricated Chunk Data packets and
//! inbound tunnel bytes arrive as Plugin Message packets.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Stream Proxy (per-stream destination dial + copy)      │
//! ├─────────────────────────────────────────────────────────┤
//! │  Mux Session (credit-windowed stream multiplexer)       │
//! ├─────────────────────────────────────────────────────────┤
//! │  Disguised Transport (AES-GCM inside Chunk Data /       │
//! │  Plugin Message packets, ambient Keep-Alive + motion)   │
//! ├─────────────────────────────────────────────────────────┤
//! │  Protocol Front (Handshake → Status / Login machine)    │
//! ├─────────────────────────────────────────────────────────┤
//! │  Codec (VarInt, strings, NBT prefix, packet framing)    │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! The disguise is shallow by design: it defeats passive probes and casual
//! inspection, not an adversary replaying deep protocol state.

pub mod auth;
pub mod codec;
pub mod crypto;
pub mod error;
pub mod motion;
pub mod mux;
pub mod protocol;
pub mod proxy;
pub mod server;
pub mod tunnel;

pub use error::{Error, Result};

/// Version reported by `minewire-server --version`.
pub const SERVER_VERSION: &str = "25.12.4";

/// Largest inbound packet body accepted on the outer connection.
/// Anything larger closes the connection.
pub const MAX_PACKET_LEN: usize = 1_048_576;
