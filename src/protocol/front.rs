//! Per-connection protocol state machine.
//!
//! Drives an accepted connection through Handshake → Status or Login,
//! answering the server list ping like any Minecraft server would. A login
//! with a name the [`Authenticator`](crate::auth::Authenticator) recognizes
//! hands the connection to the tunnel layer; every other login is turned
//! away with a vanilla-looking whitelist disconnect.
//!
//! Packets are read with exact-length frame reads, so when the connection
//! transitions into the tunnel no buffered bytes are left behind.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use super::{
    ConnectionState, StatusDescription, StatusPlayers, StatusResponse, StatusVersion,
    CB_LOGIN_DISCONNECT, CB_PONG, CB_STATUS_RESPONSE, SB_INTENTION, SB_PING,
};
use crate::codec::{self, Reader, Writer};
use crate::error::Result;
use crate::server::ServerState;
use crate::tunnel;
use crate::MAX_PACKET_LEN;

/// What a vanilla client sees when it tries to join.
const DISCONNECT_REASON: &str = "§cNot whitelisted!";

/// Run one connection until it disconnects, fails, or becomes a tunnel.
///
/// Generic over the stream so tests can drive it with an in-memory duplex;
/// TCP socket options are the accept loop's concern.
pub async fn drive_connection<S>(stream: S, state: Arc<ServerState>) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (mut rd, mut wr) = tokio::io::split(stream);
    let mut conn_state = ConnectionState::Handshake;

    loop {
        let body = match codec::read_frame(&mut rd, MAX_PACKET_LEN).await {
            Ok(body) => body,
            Err(e) if e.is_disconnect() => return Ok(()),
            Err(e) => return Err(e),
        };
        let mut r = Reader::new(&body);
        let packet_id = r.read_var_int()?;
        eprintln!("DIAG loop state={:?} id={}", conn_state, packet_id);

        match (conn_state, packet_id) {
            (ConnectionState::Handshake, SB_INTENTION) => {
                let _protocol_version = r.read_var_int()?;
                let _server_address = r.read_string()?;
                let _server_port = r.read_u16()?;
                conn_state = match r.read_var_int()? {
                    1 => ConnectionState::Status,
                    2 => ConnectionState::Login,
                    _ => return Ok(()),
                };
            }
            (ConnectionState::Status, SB_INTENTION) => {
                send_status(&mut wr, &state).await?;
            }
            (ConnectionState::Status, SB_PING) => {
                eprintln!("DIAG about to write pong, rest len={}", r.rest().len());
                wr.write_all(&codec::frame(CB_PONG, r.rest())).await?;
                eprintln!("DIAG wrote pong");
            }
            (ConnectionState::Login, SB_INTENTION) => {
                let name = r.read_string()?;
                let Some(secret) = state.auth.resolve(name).map(str::to_string) else {
                    tracing::warn!("rejected unauthorized login as {name:?}");
                    send_disconnect(&mut wr, DISCONNECT_REASON).await?;
                    return Ok(());
                };
                let username = name.to_string();
                tracing::info!("authorized agent connected: {username}");
                return tunnel::session::run(rd, wr, secret, username).await;
            }
            _ => {
                // Unknown (state, id) pairs are ignored; a real server with
                // this protocol version would tolerate most of them too.
                eprintln!("DIAG ignoring packet state={:?} id={}", conn_state, packet_id);
            }
        }
    }
}

async fn send_status<W>(wr: &mut W, state: &ServerState) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    // The icon is re-read on every request so operators can swap it live.
    let favicon = match state.config.icon_path.as_deref() {
        Some(path) if !path.is_empty() => match tokio::fs::read(path).await {
            Ok(data) if !data.is_empty() => {
                Some(format!("data:image/png;base64,{}", BASE64.encode(data)))
            }
            _ => None,
        },
        _ => None,
    };

    let online = *state.online.lock();
    let status = StatusResponse {
        version: StatusVersion {
            name: state.config.version_name.clone(),
            protocol: state.config.protocol_id,
        },
        players: StatusPlayers {
            max: state.config.max_players,
            online,
        },
        description: StatusDescription {
            text: state.config.motd.clone(),
        },
        favicon,
    };

    let mut payload = Writer::new();
    payload.write_string(&serde_json::to_string(&status)?);
    wr.write_all(&codec::frame(CB_STATUS_RESPONSE, &payload.into_inner()))
        .await?;
    Ok(())
}

async fn send_disconnect<W>(wr: &mut W, reason: &str) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let message = serde_json::json!({ "text": reason }).to_string();
    let mut payload = Writer::new();
    payload.write_string(&message);
    wr.write_all(&codec::frame(CB_LOGIN_DISCONNECT, &payload.into_inner()))
        .await?;
    Ok(())
}
