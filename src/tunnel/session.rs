//! Tunnel session lifecycle.
//!
//! Takes over a connection the moment its login is accepted: plays the
//! post-login packet sequence a real server would, then runs the encrypted
//! transport, the housekeeping timers that keep the disguise alive, and the
//! stream multiplexer feeding the proxy. The whole task set lives and dies
//! with the TCP connection.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::time::interval;

use crate::crypto::{tunnel_key, Aead};
use crate::error::Result;
use crate::motion::Walker;
use crate::mux;
use crate::protocol::{
    CB_JOIN_GAME, CB_KEEP_ALIVE, CB_LOGIN_SUCCESS, CB_PLAYER_POSITION, CB_TIME_UPDATE,
};
use crate::proxy;
use crate::tunnel::disguise;
use crate::tunnel::transport::{self, PacketSink, TunnelWriter};

const KEEP_ALIVE_PERIOD: Duration = Duration::from_secs(10);
const TIME_FLOW_PERIOD: Duration = Duration::from_secs(20);
/// World age advances 20 ticks/second between Time Update packets.
const AGE_PER_TIME_PACKET: i64 = 400;
const DAY_LENGTH: i64 = 24000;
/// Frames queued toward the wire before mux writers wait.
const FRAME_QUEUE: usize = 64;

/// Run a tunnel session over an authenticated connection.
///
/// Returns when the connection dies in either direction or the mux tears
/// down; by then every task it spawned has been stopped and the write half
/// shut down.
pub async fn run<R, W>(rd: R, wr: W, secret: String, username: String) -> Result<()>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let sink = Arc::new(PacketSink::new(wr));

    // The sequence a protocol-773 client expects after login.
    let walker = Walker::new();
    sink.send(CB_LOGIN_SUCCESS, &disguise::login_success(&username))
        .await?;
    sink.send(CB_JOIN_GAME, &disguise::join_game()).await?;
    sink.send(CB_PLAYER_POSITION, &disguise::player_position(&walker))
        .await?;

    let motion = Arc::new(Mutex::new(walker));
    let cipher = Arc::new(Aead::new(&tunnel_key(&secret)));

    let (pipe_tx, tunnel_rd) = transport::plaintext_pipe();
    let ingest = tokio::spawn(transport::run_ingest(rd, Arc::clone(&cipher), pipe_tx));
    let mut keep_alive = tokio::spawn(keep_alive_loop(Arc::clone(&sink)));
    let mut time_flow = tokio::spawn(time_flow_loop(Arc::clone(&sink), Arc::clone(&motion)));

    let writer = TunnelWriter::new(Arc::clone(&sink), cipher, motion);
    let (frame_tx, frame_rx) = mpsc::channel(FRAME_QUEUE);
    let mut pump = tokio::spawn(pump_frames(writer, frame_rx));

    let (incoming_tx, incoming_rx) = mpsc::channel(16);
    let accept = tokio::spawn(accept_streams(incoming_rx));

    // The mux ends when the read path dies; the housekeeping tasks end when
    // the write path dies. Either one brings the session down.
    let mut result = Ok(());
    tokio::select! {
        r = mux::run(tunnel_rd, frame_tx, incoming_tx) => result = r,
        _ = &mut pump => {}
        _ = &mut keep_alive => {}
        _ = &mut time_flow => {}
    }

    // The mux is the session's spine; once it ends, everything goes with it.
    ingest.abort();
    keep_alive.abort();
    time_flow.abort();
    pump.abort();
    accept.abort();
    let _ = sink.shutdown().await;

    tracing::debug!("session for {username} closed");
    result
}

/// Hand each accepted inner stream to its own proxy task.
async fn accept_streams(mut incoming: mpsc::Receiver<mux::MuxStream>) {
    let mut proxies = tokio::task::JoinSet::new();
    while let Some(stream) = incoming.recv().await {
        proxies.spawn(proxy::handle_stream(stream));
        // Reap finished proxies so the set stays small.
        while proxies.try_join_next().is_some() {}
    }
    // Dropping the set aborts any proxy still running.
}

/// Encode mux frames into disguise packets, one packet per frame.
async fn pump_frames<W>(writer: TunnelWriter<W>, mut frames: mpsc::Receiver<mux::Frame>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = frames.recv().await {
        if writer.write(&frame.encode()).await.is_err() {
            return;
        }
    }
}

async fn keep_alive_loop<W>(sink: Arc<PacketSink<W>>)
where
    W: AsyncWrite + Unpin,
{
    let mut ticker = interval(KEEP_ALIVE_PERIOD);
    ticker.tick().await; // the zeroth tick fires immediately
    loop {
        ticker.tick().await;
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as i64;
        if sink
            .send(CB_KEEP_ALIVE, &disguise::keep_alive(now))
            .await
            .is_err()
        {
            return;
        }
    }
}

async fn time_flow_loop<W>(sink: Arc<PacketSink<W>>, motion: Arc<Mutex<Walker>>)
where
    W: AsyncWrite + Unpin,
{
    let mut ticker = interval(TIME_FLOW_PERIOD);
    ticker.tick().await;
    let mut world_age: i64 = 0;
    loop {
        ticker.tick().await;
        world_age += AGE_PER_TIME_PACKET;
        let time_of_day = (-world_age).rem_euclid(DAY_LENGTH);
        if sink
            .send(CB_TIME_UPDATE, &disguise::time_update(world_age, time_of_day))
            .await
            .is_err()
        {
            return;
        }
        motion.lock().update();
    }
}
