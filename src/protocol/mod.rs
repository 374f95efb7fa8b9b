//! Minecraft protocol surface.
//!
//! Packet identifiers for the slice of the Java Edition protocol the
//! disguise speaks, the status-response JSON model, and the per-connection
//! state machine in [`front`].

pub mod front;

use serde::Serialize;

/// Clientbound: status response (Status state)
pub const CB_STATUS_RESPONSE: i32 = 0x00;
/// Clientbound: pong (Status state)
pub const CB_PONG: i32 = 0x01;
/// Clientbound: disconnect (Login state)
pub const CB_LOGIN_DISCONNECT: i32 = 0x00;
/// Clientbound: login success
pub const CB_LOGIN_SUCCESS: i32 = 0x02;
/// Clientbound: keep alive
pub const CB_KEEP_ALIVE: i32 = 0x24;
/// Clientbound: chunk data — the disguise carrier
pub const CB_CHUNK_DATA: i32 = 0x25;
/// Clientbound: join game
pub const CB_JOIN_GAME: i32 = 0x29;
/// Clientbound: synchronize player position
pub const CB_PLAYER_POSITION: i32 = 0x3e;
/// Clientbound: time update
pub const CB_TIME_UPDATE: i32 = 0x62;

/// Serverbound: handshake / status request / login start, by state
pub const SB_INTENTION: i32 = 0x00;
/// Serverbound: ping (Status state)
pub const SB_PING: i32 = 0x01;
/// Serverbound: plugin message — the inbound tunnel carrier
pub const SB_PLUGIN_MESSAGE: i32 = 0x0d;

/// Where a connection is in the pre-tunnel exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Waiting for the initial handshake
    Handshake,
    /// Server list ping exchange
    Status,
    /// Login start expected next
    Login,
}

/// The status JSON a server list ping receives.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub version: StatusVersion,
    pub players: StatusPlayers,
    pub description: StatusDescription,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusVersion {
    pub name: String,
    pub protocol: i32,
}

#[derive(Debug, Serialize)]
pub struct StatusPlayers {
    pub max: i32,
    pub online: i32,
}

#[derive(Debug, Serialize)]
pub struct StatusDescription {
    pub text: String,
}
