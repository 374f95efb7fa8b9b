//! Subscription endpoint.
//!
//! A deliberately tiny HTTP/1.1 responder serving one route:
//! `GET /subs/<nickname>` returns a `mw://` connection link for that
//! nickname's secret, using the request's Host header so the link points
//! wherever the client reached us. Everything else is a 404.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;

use crate::error::Result;
use crate::server::ServerState;

/// Request heads larger than this are nonsense for a one-route service.
const MAX_HEAD: usize = 8 * 1024;

pub async fn run(state: Arc<ServerState>, port: String) {
    let addr = format!("0.0.0.0:{port}");
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("subscription listener on {addr} failed: {e}");
            return;
        }
    };
    tracing::info!("subscription server on {addr}");

    loop {
        let Ok((socket, _)) = listener.accept().await else {
            continue;
        };
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            let _ = handle_request(socket, &state).await;
        });
    }
}

async fn handle_request<S>(mut socket: S, state: &ServerState) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        if head.len() > MAX_HEAD {
            return respond(&mut socket, 400, "Bad Request", "Request too large\n").await;
        }
        let n = socket.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        head.extend_from_slice(&buf[..n]);
    }

    let text = String::from_utf8_lossy(&head);
    let mut lines = text.lines();
    let request_line = lines.next().unwrap_or_default();
    let path = request_line.split_whitespace().nth(1).unwrap_or_default();

    let host = lines
        .filter_map(|line| line.split_once(':'))
        .find(|(key, _)| key.eq_ignore_ascii_case("host"))
        .map(|(_, value)| value.trim())
        .unwrap_or_default();
    // Strip any port; the link carries our own listen port.
    let host = host.rsplit_once(':').map_or(host, |(name, _)| name);

    let Some(nickname) = path.strip_prefix("/subs/") else {
        return respond(&mut socket, 404, "Not Found", "Not found\n").await;
    };
    if nickname.is_empty() {
        return respond(&mut socket, 400, "Bad Request", "Nickname required\n").await;
    }

    match state.auth.resolve_nickname(nickname) {
        Some(secret) => {
            let link = format!(
                "mw://{}@{}:{}#{}",
                secret, host, state.config.listen_port, nickname
            );
            respond(&mut socket, 200, "OK", &link).await
        }
        None => respond(&mut socket, 404, "Not Found", "Subscription not found\n").await,
    }
}

async fn respond<S>(socket: &mut S, code: u16, reason: &str, body: &str) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    let response = format!(
        "HTTP/1.1 {code} {reason}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    socket.write_all(response.as_bytes()).await?;
    socket.shutdown().await?;
    Ok(())
}
