//! Per-stream TCP relay.
//!
//! Each accepted inner stream names its destination in its first bytes as a
//! protocol string (`host:port`). The proxy dials it, then shovels bytes in
//! both directions until one side finishes. There is deliberately no
//! authorization here: passing the tunnel's login gate is the only check.

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};

use crate::codec::Reader;
use crate::error::{CodecError, Error, Result};
use crate::mux::{MuxStream, StreamReceiver};

/// How long a destination gets to answer the dial.
const DIAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Read buffer for the target-to-tunnel direction.
const COPY_BUF: usize = 16 * 1024;

/// Destinations longer than this cannot be real `host:port` strings.
const MAX_DESTINATION_LEN: usize = 1024;

/// Serve one inner stream to completion.
///
/// Dial failures and malformed destinations reset the stream and return;
/// the session they came from stays healthy.
pub async fn handle_stream(stream: MuxStream) {
    let id = stream.id();
    let (mut rx, tx) = stream.split();

    let destination = match read_destination(&mut rx).await {
        Ok(dest) => dest,
        Err(e) => {
            tracing::debug!("stream {id}: bad destination: {e}");
            tx.reset().await;
            return;
        }
    };

    let target = match timeout(DIAL_TIMEOUT, TcpStream::connect(&destination)).await {
        Ok(Ok(target)) => target,
        Ok(Err(e)) => {
            tracing::debug!("stream {id}: dial {destination} failed: {e}");
            tx.reset().await;
            return;
        }
        Err(_) => {
            tracing::debug!("stream {id}: dial {destination} timed out");
            tx.reset().await;
            return;
        }
    };

    tracing::debug!("stream {id}: proxying to {destination}");
    let (mut target_rd, mut target_wr) = target.into_split();
    let tx = std::sync::Arc::new(tx);

    // Tunnel -> target.
    let mut inbound = tokio::spawn(async move {
        while let Some(chunk) = rx.recv().await {
            if target_wr.write_all(&chunk).await.is_err() {
                return;
            }
        }
        // Peer half-closed; pass the EOF along.
        let _ = target_wr.shutdown().await;
    });

    // Target -> tunnel.
    let outbound_tx = std::sync::Arc::clone(&tx);
    let mut outbound = tokio::spawn(async move {
        let mut buf = vec![0u8; COPY_BUF];
        loop {
            match target_rd.read(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(n) => {
                    if outbound_tx.write_all(&buf[..n]).await.is_err() {
                        return;
                    }
                }
            }
        }
    });

    // Either side finishing ends the stream; the other copier is torn down
    // with it, which closes both endpoints.
    tokio::select! {
        _ = &mut inbound => outbound.abort(),
        _ = &mut outbound => inbound.abort(),
    }
    // However it ended, the peer hears about it.
    tx.close().await;
}

/// Accumulate stream bytes until a full `[String destination]` parses,
/// handing any surplus back to the receiver.
async fn read_destination(rx: &mut StreamReceiver) -> Result<String> {
    let mut buf: Vec<u8> = Vec::new();
    loop {
        let mut r = Reader::new(&buf);
        match r.read_string() {
            Ok(dest) => {
                let dest = dest.to_string();
                rx.unread(Bytes::copy_from_slice(r.rest()));
                return Ok(dest);
            }
            Err(CodecError::Truncated) => {}
            Err(e) => return Err(e.into()),
        }
        if buf.len() > MAX_DESTINATION_LEN {
            return Err(Error::mux("destination string never terminated"));
        }
        match rx.recv().await {
            Some(chunk) => buf.extend_from_slice(&chunk),
            None => return Err(Error::mux("stream closed before destination")),
        }
    }
}
