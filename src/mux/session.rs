//! Server-role mux session.
//!
//! [`run`] owns the transport's read side and routes inbound frames to
//! per-stream channels; everything outbound — data, window credit, resets —
//! funnels through one frame channel that the tunnel session pumps into the
//! disguised transport. Accepted streams arrive on the `incoming` channel
//! as [`MuxStream`]s ready to hand to the proxy.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::{mpsc, Semaphore};

use super::{Frame, FrameType, StreamId, HEADER_SIZE, INITIAL_WINDOW, MAX_FRAME_PAYLOAD};
use crate::error::{Error, Result};

/// Chunks buffered per stream before the session reader blocks. Sized so a
/// peer honoring its window never actually blocks the reader.
const STREAM_DEPTH: usize = 32;

/// One accepted inner stream.
pub struct MuxStream {
    receiver: StreamReceiver,
    sender: StreamSender,
}

impl MuxStream {
    pub fn id(&self) -> StreamId {
        self.sender.id
    }

    /// Split into independently owned read and write halves.
    pub fn split(self) -> (StreamReceiver, StreamSender) {
        (self.receiver, self.sender)
    }
}

/// Read half of an inner stream.
pub struct StreamReceiver {
    id: StreamId,
    data: mpsc::Receiver<Bytes>,
    frames: mpsc::Sender<Frame>,
    unread: Option<Bytes>,
    consumed: u32,
}

impl StreamReceiver {
    pub fn id(&self) -> StreamId {
        self.id
    }

    /// Next chunk of stream data, or `None` once the peer has half-closed
    /// (or the session has died).
    ///
    /// Consumed bytes are credited back to the peer in batches of half the
    /// window, so a fast reader keeps the peer's writer unblocked.
    pub async fn recv(&mut self) -> Option<Bytes> {
        if let Some(chunk) = self.unread.take() {
            return Some(chunk);
        }
        let chunk = self.data.recv().await?;
        self.consumed = self.consumed.saturating_add(chunk.len() as u32);
        if self.consumed >= INITIAL_WINDOW / 2 {
            let credit = std::mem::take(&mut self.consumed);
            let _ = self.frames.send(Frame::window_update(self.id, credit)).await;
        }
        Some(chunk)
    }

    /// Push bytes back so the next [`recv`](Self::recv) returns them first.
    /// Used when a parser consumed more than it needed.
    pub fn unread(&mut self, chunk: Bytes) {
        if !chunk.is_empty() {
            self.unread = Some(chunk);
        }
    }
}

/// Write half of an inner stream.
pub struct StreamSender {
    id: StreamId,
    frames: mpsc::Sender<Frame>,
    window: Arc<SendWindow>,
}

impl StreamSender {
    pub fn id(&self) -> StreamId {
        self.id
    }

    /// Send all of `data`, waiting for window credit as needed.
    pub async fn write_all(&self, data: &[u8]) -> Result<()> {
        for chunk in data.chunks(MAX_FRAME_PAYLOAD) {
            self.window.reserve(chunk.len() as u32).await?;
            self.frames
                .send(Frame::data(self.id, Bytes::copy_from_slice(chunk)))
                .await
                .map_err(|_| Error::mux("session closed"))?;
        }
        Ok(())
    }

    /// Half-close: no more writes from this side.
    pub async fn close(&self) {
        let _ = self.frames.send(Frame::close(self.id)).await;
    }

    /// Abrupt teardown of this stream.
    pub async fn reset(&self) {
        let _ = self.frames.send(Frame::reset(self.id)).await;
    }
}

/// Per-stream send credit, granted by peer WindowUpdates.
struct SendWindow {
    credit: Semaphore,
}

impl SendWindow {
    fn new(initial: u32) -> Self {
        Self {
            credit: Semaphore::new(initial as usize),
        }
    }

    fn grant(&self, n: u32) {
        self.credit.add_permits(n as usize);
    }

    async fn reserve(&self, n: u32) -> Result<()> {
        match self.credit.acquire_many(n).await {
            Ok(permit) => {
                permit.forget();
                Ok(())
            }
            Err(_) => Err(Error::mux("session closed")),
        }
    }

    fn close(&self) {
        self.credit.close();
    }
}

struct StreamEntry {
    /// `None` after the peer half-closes its write side.
    data: Option<mpsc::Sender<Bytes>>,
    window: Arc<SendWindow>,
}

/// Run the session until the transport ends.
///
/// A clean EOF returns `Ok`; a framing violation (which includes the
/// aftermath of any dropped-in-transit packet) returns `Err`. Either way
/// every stream is released on the way out.
pub async fn run<R>(
    mut transport: R,
    frames: mpsc::Sender<Frame>,
    incoming: mpsc::Sender<MuxStream>,
) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut streams: HashMap<StreamId, StreamEntry> = HashMap::new();
    let result = drive(&mut transport, &frames, &incoming, &mut streams).await;
    for entry in streams.values() {
        entry.window.close();
    }
    result
}

async fn drive<R>(
    transport: &mut R,
    frames: &mpsc::Sender<Frame>,
    incoming: &mpsc::Sender<MuxStream>,
    streams: &mut HashMap<StreamId, StreamEntry>,
) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_SIZE];
    loop {
        match transport.read_exact(&mut header).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(e) => return Err(e.into()),
        }
        let frame_type = FrameType::from_u8(header[0])?;
        let stream_id = u32::from_be_bytes([header[1], header[2], header[3], header[4]]);
        let len = u16::from_be_bytes([header[5], header[6]]) as usize;
        if len > MAX_FRAME_PAYLOAD {
            return Err(Error::mux(format!("frame payload of {len} bytes")));
        }
        let mut payload = vec![0u8; len];
        transport.read_exact(&mut payload).await?;
        let payload = Bytes::from(payload);

        match frame_type {
            FrameType::Open => {
                if streams.contains_key(&stream_id) {
                    return Err(Error::mux(format!("stream {stream_id} reopened")));
                }
                let (data_tx, data_rx) = mpsc::channel(STREAM_DEPTH);
                if !payload.is_empty() {
                    // Fresh channel; capacity is guaranteed.
                    let _ = data_tx.try_send(payload);
                }
                let window = Arc::new(SendWindow::new(INITIAL_WINDOW));
                streams.insert(
                    stream_id,
                    StreamEntry {
                        data: Some(data_tx),
                        window: Arc::clone(&window),
                    },
                );
                let stream = MuxStream {
                    receiver: StreamReceiver {
                        id: stream_id,
                        data: data_rx,
                        frames: frames.clone(),
                        unread: None,
                        consumed: 0,
                    },
                    sender: StreamSender {
                        id: stream_id,
                        frames: frames.clone(),
                        window,
                    },
                };
                if incoming.send(stream).await.is_err() {
                    // Session is shutting down; refuse the stream.
                    if let Some(entry) = streams.remove(&stream_id) {
                        entry.window.close();
                    }
                    let _ = frames.send(Frame::reset(stream_id)).await;
                }
            }
            FrameType::Data => {
                let delivery_failed = match streams.get(&stream_id) {
                    Some(StreamEntry {
                        data: Some(tx), ..
                    }) => tx.send(payload).await.is_err(),
                    // Data after Close, or for an unknown (likely reset)
                    // stream: ignore.
                    _ => false,
                };
                if delivery_failed {
                    // The proxy finished with this stream; tell the peer.
                    if let Some(entry) = streams.remove(&stream_id) {
                        entry.window.close();
                    }
                    let _ = frames.send(Frame::reset(stream_id)).await;
                }
            }
            FrameType::WindowUpdate => {
                if payload.len() != 4 {
                    return Err(Error::mux("malformed window update"));
                }
                if let Some(entry) = streams.get(&stream_id) {
                    let credit =
                        u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
                    entry.window.grant(credit);
                }
            }
            FrameType::Close => {
                // Peer is done writing; our write side (and its window
                // credit) stays routable until we close or reset.
                if let Some(entry) = streams.get_mut(&stream_id) {
                    entry.data = None;
                }
            }
            FrameType::Reset => {
                if let Some(entry) = streams.remove(&stream_id) {
                    entry.window.close();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio::time::{timeout, Duration};

    struct Harness {
        wire: tokio::io::WriteHalf<tokio::io::DuplexStream>,
        frames: mpsc::Receiver<Frame>,
        incoming: mpsc::Receiver<MuxStream>,
        task: tokio::task::JoinHandle<Result<()>>,
    }

    fn start() -> Harness {
        let (client, server) = tokio::io::duplex(256 * 1024);
        let (_unused_rd, wire) = tokio::io::split(client);
        let (server_rd, _unused_wr) = tokio::io::split(server);
        let (frame_tx, frames) = mpsc::channel(64);
        let (incoming_tx, incoming) = mpsc::channel(16);
        let task = tokio::spawn(run(server_rd, frame_tx, incoming_tx));
        Harness {
            wire,
            frames,
            incoming,
            task,
        }
    }

    impl Harness {
        async fn send(&mut self, frame: Frame) {
            self.wire.write_all(&frame.encode()).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_open_delivers_stream_with_first_bytes() {
        let mut h = start();
        h.send(Frame::open(1, Bytes::from_static(b"127.0.0.1:9999")))
            .await;

        let stream = h.incoming.recv().await.unwrap();
        assert_eq!(stream.id(), 1);
        let (mut rx, _tx) = stream.split();
        assert_eq!(rx.recv().await.unwrap().as_ref(), b"127.0.0.1:9999");
    }

    #[tokio::test]
    async fn test_data_routed_in_order() {
        let mut h = start();
        h.send(Frame::open(1, Bytes::new())).await;
        h.send(Frame::data(1, Bytes::from_static(b"one "))).await;
        h.send(Frame::data(1, Bytes::from_static(b"two"))).await;

        let (mut rx, _tx) = h.incoming.recv().await.unwrap().split();
        assert_eq!(rx.recv().await.unwrap().as_ref(), b"one ");
        assert_eq!(rx.recv().await.unwrap().as_ref(), b"two");
    }

    #[tokio::test]
    async fn test_independent_streams() {
        let mut h = start();
        h.send(Frame::open(1, Bytes::from_static(b"a"))).await;
        h.send(Frame::open(2, Bytes::from_static(b"b"))).await;
        h.send(Frame::data(2, Bytes::from_static(b"2"))).await;
        h.send(Frame::data(1, Bytes::from_static(b"1"))).await;

        let (mut rx1, _t1) = h.incoming.recv().await.unwrap().split();
        let (mut rx2, _t2) = h.incoming.recv().await.unwrap().split();
        assert_eq!(rx1.recv().await.unwrap().as_ref(), b"a");
        assert_eq!(rx2.recv().await.unwrap().as_ref(), b"b");
        assert_eq!(rx2.recv().await.unwrap().as_ref(), b"2");
        assert_eq!(rx1.recv().await.unwrap().as_ref(), b"1");
    }

    #[tokio::test]
    async fn test_close_is_eof() {
        let mut h = start();
        h.send(Frame::open(1, Bytes::from_static(b"tail"))).await;
        h.send(Frame::close(1)).await;

        let (mut rx, _tx) = h.incoming.recv().await.unwrap().split();
        assert_eq!(rx.recv().await.unwrap().as_ref(), b"tail");
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_writes_become_data_frames() {
        let mut h = start();
        h.send(Frame::open(1, Bytes::new())).await;
        let (_rx, tx) = h.incoming.recv().await.unwrap().split();

        tx.write_all(b"reply bytes").await.unwrap();
        tx.close().await;

        let frame = h.frames.recv().await.unwrap();
        assert_eq!(frame.frame_type, FrameType::Data);
        assert_eq!(frame.stream_id, 1);
        assert_eq!(frame.payload.as_ref(), b"reply bytes");
        let frame = h.frames.recv().await.unwrap();
        assert_eq!(frame.frame_type, FrameType::Close);
    }

    #[tokio::test]
    async fn test_large_write_chunked_to_frame_limit() {
        let mut h = start();
        h.send(Frame::open(1, Bytes::new())).await;
        let (_rx, tx) = h.incoming.recv().await.unwrap().split();

        let data = vec![0x55u8; MAX_FRAME_PAYLOAD + 100];
        tx.write_all(&data).await.unwrap();

        let first = h.frames.recv().await.unwrap();
        assert_eq!(first.payload.len(), MAX_FRAME_PAYLOAD);
        let second = h.frames.recv().await.unwrap();
        assert_eq!(second.payload.len(), 100);
    }

    #[tokio::test]
    async fn test_send_window_blocks_until_credit() {
        let mut h = start();
        h.send(Frame::open(1, Bytes::new())).await;
        let (_rx, tx) = h.incoming.recv().await.unwrap().split();

        // Exhaust the initial window.
        let data = vec![0u8; INITIAL_WINDOW as usize];
        tx.write_all(&data).await.unwrap();
        let mut received = 0usize;
        while received < INITIAL_WINDOW as usize {
            received += h.frames.recv().await.unwrap().payload.len();
        }

        // The next write must stall with zero credit...
        let blocked = timeout(Duration::from_millis(50), tx.write_all(b"x")).await;
        assert!(blocked.is_err(), "write proceeded without window credit");

        // ...and resume once the peer grants more.
        h.send(Frame::window_update(1, 1024)).await;
        timeout(Duration::from_secs(1), tx.write_all(b"x"))
            .await
            .expect("write should resume after credit")
            .unwrap();
    }

    #[tokio::test]
    async fn test_receiver_issues_window_updates() {
        let mut h = start();
        h.send(Frame::open(1, Bytes::new())).await;
        let (mut rx, _tx) = h.incoming.recv().await.unwrap().split();

        // Feed half the window through in frame-sized chunks and drain it.
        let chunks = (INITIAL_WINDOW / 2) as usize / MAX_FRAME_PAYLOAD;
        for _ in 0..chunks {
            h.send(Frame::data(1, Bytes::from(vec![0u8; MAX_FRAME_PAYLOAD])))
                .await;
            rx.recv().await.unwrap();
        }

        let frame = h.frames.recv().await.unwrap();
        assert_eq!(frame.frame_type, FrameType::WindowUpdate);
        assert_eq!(
            frame.payload.as_ref(),
            &(INITIAL_WINDOW / 2).to_be_bytes()
        );
    }

    #[tokio::test]
    async fn test_dropped_receiver_resets_stream() {
        let mut h = start();
        h.send(Frame::open(1, Bytes::new())).await;
        let stream = h.incoming.recv().await.unwrap();
        drop(stream);

        // Enough data to beat the channel depth regardless of timing.
        for _ in 0..(STREAM_DEPTH + 1) {
            h.send(Frame::data(1, Bytes::from_static(b"z"))).await;
        }

        let frame = h.frames.recv().await.unwrap();
        assert_eq!(frame.frame_type, FrameType::Reset);
        assert_eq!(frame.stream_id, 1);
    }

    #[tokio::test]
    async fn test_unknown_frame_type_kills_session() {
        let mut h = start();
        let mut bytes = Frame::close(1).encode();
        bytes[0] = 0x7f;
        h.wire.write_all(&bytes).await.unwrap();

        assert!(h.task.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn test_reopened_stream_kills_session() {
        let mut h = start();
        h.send(Frame::open(1, Bytes::new())).await;
        h.send(Frame::open(1, Bytes::new())).await;
        assert!(h.task.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn test_clean_eof_ends_session() {
        let mut h = start();
        h.send(Frame::open(1, Bytes::new())).await;
        let (mut rx, _tx) = h.incoming.recv().await.unwrap().split();
        drop(h.wire);

        assert!(h.task.await.unwrap().is_ok());
        // Streams observe the shutdown as EOF.
        assert!(rx.recv().await.is_none());
    }
}
