//! The disguised byte transport.
//!
//! Presents the tunnel as a plain bidirectional byte stream while every
//! byte on the wire is a well-formed Minecraft packet:
//!
//! - Outbound: [`TunnelWriter::write`] seals the plaintext with AES-GCM and
//!   wraps it in exactly one Chunk Data packet, positioned near the session's
//!   wandering fake player.
//! - Inbound: the ingest task reads outer frames, picks out Plugin Messages
//!   on the tunnel channels, decrypts them, and feeds the plaintext into a
//!   bounded pipe in arrival order. Anything that fails authentication is
//!   dropped without a trace on the wire — a probe blasting garbage at the
//!   port learns nothing.
//!
//! All socket writes — tunnel data, Keep-Alive, Time Update — pass through
//! one [`PacketSink`], whose mutex keeps whole packets from interleaving.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::sync::mpsc;

use crate::codec::{self, Reader};
use crate::crypto::{Aead, NONCE_SIZE};
use crate::error::Result;
use crate::motion::Walker;
use crate::protocol::{CB_CHUNK_DATA, SB_PLUGIN_MESSAGE};
use crate::tunnel::disguise;
use crate::MAX_PACKET_LEN;

/// Channels accepted as inbound tunnel carriers. `minecraft:brand` is kept
/// for compatibility with clients that hide behind the vanilla brand
/// exchange; new clients use `minewire:tunnel`.
const TUNNEL_CHANNELS: [&str; 2] = ["minecraft:brand", "minewire:tunnel"];

/// Chunks the inbound pipe will buffer before the ingest task blocks.
const PIPE_DEPTH: usize = 64;

/// Serializes whole-packet writes onto one socket write half.
pub struct PacketSink<W> {
    writer: tokio::sync::Mutex<W>,
}

impl<W> PacketSink<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(writer: W) -> Self {
        Self {
            writer: tokio::sync::Mutex::new(writer),
        }
    }

    /// Frame and write one packet. Holding the lock across the whole write
    /// is what guarantees packets never interleave on the wire.
    pub async fn send(&self, packet_id: i32, payload: &[u8]) -> Result<()> {
        let frame = codec::frame(packet_id, payload);
        let mut writer = self.writer.lock().await;
        writer.write_all(&frame).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Close the write half, signalling EOF to the peer.
    pub async fn shutdown(&self) -> Result<()> {
        let mut writer = self.writer.lock().await;
        writer.shutdown().await?;
        Ok(())
    }
}

/// The write side of the disguised transport.
pub struct TunnelWriter<W> {
    sink: Arc<PacketSink<W>>,
    cipher: Arc<Aead>,
    motion: Arc<Mutex<Walker>>,
}

impl<W> Clone for TunnelWriter<W> {
    fn clone(&self) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
            cipher: Arc::clone(&self.cipher),
            motion: Arc::clone(&self.motion),
        }
    }
}

impl<W> TunnelWriter<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(sink: Arc<PacketSink<W>>, cipher: Arc<Aead>, motion: Arc<Mutex<Walker>>) -> Self {
        Self {
            sink,
            cipher,
            motion,
        }
    }

    /// Write `plaintext` to the peer as exactly one Chunk Data packet.
    ///
    /// Returns the plaintext length, like any byte-stream write would.
    pub async fn write(&self, plaintext: &[u8]) -> Result<usize> {
        let sealed = self.cipher.seal(plaintext)?;
        let (chunk_x, chunk_z) = self.motion.lock().chunk();
        let payload = disguise::chunk_data(chunk_x, chunk_z, &sealed);
        self.sink.send(CB_CHUNK_DATA, &payload).await?;
        Ok(plaintext.len())
    }
}

/// The read side of the disguised transport: a byte stream re-assembled
/// from the decrypted Plugin Message payloads, in arrival order.
pub struct TunnelReader {
    rx: mpsc::Receiver<Vec<u8>>,
    pending: Vec<u8>,
    offset: usize,
}

impl AsyncRead for TunnelReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        loop {
            if self.offset < self.pending.len() {
                let n = (self.pending.len() - self.offset).min(buf.remaining());
                buf.put_slice(&self.pending[self.offset..self.offset + n]);
                self.offset += n;
                return Poll::Ready(Ok(()));
            }
            match self.rx.poll_recv(cx) {
                Poll::Ready(Some(chunk)) => {
                    self.pending = chunk;
                    self.offset = 0;
                }
                // Ingest task gone: EOF.
                Poll::Ready(None) => return Poll::Ready(Ok(())),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Create the bounded pipe between the ingest task and the mux.
pub fn plaintext_pipe() -> (mpsc::Sender<Vec<u8>>, TunnelReader) {
    let (tx, rx) = mpsc::channel(PIPE_DEPTH);
    (
        tx,
        TunnelReader {
            rx,
            pending: Vec::new(),
            offset: 0,
        },
    )
}

/// Read outer frames until the connection dies, decrypting tunnel carriers
/// into `pipe`.
///
/// Per-packet policy: packets that are not Plugin Messages, are on other
/// channels, are shorter than a nonce, or fail authentication are all
/// dropped silently; only outer framing failures end the session.
pub async fn run_ingest<R>(mut rd: R, cipher: Arc<Aead>, pipe: mpsc::Sender<Vec<u8>>)
where
    R: AsyncRead + Unpin,
{
    loop {
        let body = match codec::read_frame(&mut rd, MAX_PACKET_LEN).await {
            Ok(body) => body,
            Err(_) => return,
        };
        let mut r = Reader::new(&body);
        let Ok(packet_id) = r.read_var_int() else {
            continue;
        };
        if packet_id != SB_PLUGIN_MESSAGE {
            continue;
        }
        let Ok(channel) = r.read_string() else {
            continue;
        };
        if !TUNNEL_CHANNELS.contains(&channel) {
            continue;
        }
        let sealed = r.rest();
        if sealed.len() < NONCE_SIZE {
            continue;
        }
        match cipher.open(sealed) {
            Ok(plaintext) => {
                if pipe.send(plaintext).await.is_err() {
                    // Mux hung up; nothing left to deliver to.
                    return;
                }
            }
            Err(_) => {
                tracing::trace!("dropping unauthenticated plugin payload");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::tunnel_key;
    use tokio::io::AsyncReadExt;

    fn cipher() -> Arc<Aead> {
        Arc::new(Aead::new(&tunnel_key("hunter2")))
    }

    fn plugin_frame(cipher: &Aead, channel: &str, plaintext: &[u8]) -> Vec<u8> {
        let mut w = codec::Writer::new();
        w.write_string(channel);
        w.write_raw(&cipher.seal(plaintext).unwrap());
        codec::frame(SB_PLUGIN_MESSAGE, &w.into_inner())
    }

    /// Parse one framed Chunk Data packet and decrypt its trailer.
    fn open_chunk_frame(cipher: &Aead, framed: &[u8]) -> (Vec<u8>, usize) {
        let mut r = Reader::new(framed);
        let total = r.read_var_int().unwrap() as usize;
        let body = r.take(total).unwrap();
        let consumed = framed.len() - r.rest().len();

        let mut b = Reader::new(body);
        assert_eq!(b.read_var_int().unwrap(), CB_CHUNK_DATA);
        b.take(8).unwrap(); // chunk coords
        assert_eq!(b.read_u8().unwrap(), 0x0a);
        b.take(2).unwrap();
        assert_eq!(b.read_u8().unwrap(), 0x0c);
        let name_len = b.read_u16().unwrap() as usize;
        assert_eq!(b.take(name_len).unwrap(), b"MOTION_BLOCKING");
        b.take(4 + disguise::HEIGHTMAP_LONGS * 8).unwrap();
        assert_eq!(b.read_u8().unwrap(), 0x00);
        let sealed_len = b.read_var_int().unwrap() as usize;
        let sealed = b.take(sealed_len).unwrap();
        (cipher.open(sealed).unwrap(), consumed)
    }

    #[tokio::test]
    async fn test_writer_emits_one_decryptable_packet_per_write() {
        let cipher = cipher();
        let (client, server) = tokio::io::duplex(256 * 1024);
        let (_srd, swr) = tokio::io::split(server);
        let sink = Arc::new(PacketSink::new(swr));
        let motion = Arc::new(Mutex::new(Walker::new()));
        let writer = TunnelWriter::new(sink, cipher.clone(), motion);

        let messages: [&[u8]; 3] = [b"alpha", b"", b"gamma gamma gamma"];
        for m in messages {
            assert_eq!(writer.write(m).await.unwrap(), m.len());
        }

        let (mut crd, _cwr) = tokio::io::split(client);
        let mut wire = vec![0u8; 64 * 1024];
        let mut filled = 0;
        // Three packets are waiting; read until all parse.
        let mut recovered = Vec::new();
        while recovered.len() < messages.len() {
            let n = crd.read(&mut wire[filled..]).await.unwrap();
            assert!(n > 0);
            filled += n;
            let mut at = 0;
            recovered.clear();
            while at < filled {
                let mut probe = Reader::new(&wire[at..filled]);
                let Ok(total) = probe.read_var_int() else { break };
                if probe.rest().len() < total as usize {
                    break;
                }
                let (plaintext, consumed) = open_chunk_frame(&cipher, &wire[at..filled]);
                recovered.push(plaintext);
                at += consumed;
            }
        }
        assert_eq!(recovered, messages.iter().map(|m| m.to_vec()).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_ingest_delivers_in_order() {
        let cipher = cipher();
        let (client, server) = tokio::io::duplex(64 * 1024);
        let (srd, _swr) = tokio::io::split(server);
        let (tx, mut reader) = plaintext_pipe();
        tokio::spawn(run_ingest(srd, cipher.clone(), tx));

        let (_crd, mut cwr) = tokio::io::split(client);
        cwr.write_all(&plugin_frame(&cipher, "minewire:tunnel", b"first "))
            .await
            .unwrap();
        cwr.write_all(&plugin_frame(&cipher, "minecraft:brand", b"second"))
            .await
            .unwrap();

        let mut buf = [0u8; 12];
        reader.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"first second");
    }

    #[tokio::test]
    async fn test_ingest_drops_corrupt_packet_and_continues() {
        let cipher = cipher();
        let (client, server) = tokio::io::duplex(64 * 1024);
        let (srd, _swr) = tokio::io::split(server);
        let (tx, mut reader) = plaintext_pipe();
        tokio::spawn(run_ingest(srd, cipher.clone(), tx));

        // Corrupt one ciphertext byte of an otherwise valid carrier.
        let mut corrupt = plugin_frame(&cipher, "minewire:tunnel", b"poisoned");
        let last = corrupt.len() - 1;
        corrupt[last] ^= 0x01;

        let (_crd, mut cwr) = tokio::io::split(client);
        cwr.write_all(&corrupt).await.unwrap();
        cwr.write_all(&plugin_frame(&cipher, "minewire:tunnel", b"clean"))
            .await
            .unwrap();

        let mut buf = [0u8; 5];
        reader.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"clean");
    }

    #[tokio::test]
    async fn test_ingest_ignores_noise() {
        let cipher = cipher();
        let (client, server) = tokio::io::duplex(64 * 1024);
        let (srd, _swr) = tokio::io::split(server);
        let (tx, mut reader) = plaintext_pipe();
        tokio::spawn(run_ingest(srd, cipher.clone(), tx));

        let (_crd, mut cwr) = tokio::io::split(client);
        // Wrong packet id entirely.
        cwr.write_all(&codec::frame(0x2f, b"swing arm")).await.unwrap();
        // Right id, wrong channel.
        let mut w = codec::Writer::new();
        w.write_string("minecraft:register");
        w.write_raw(&cipher.seal(b"nope").unwrap());
        cwr.write_all(&codec::frame(SB_PLUGIN_MESSAGE, &w.into_inner()))
            .await
            .unwrap();
        // Right channel, body shorter than a nonce.
        let mut w = codec::Writer::new();
        w.write_string("minewire:tunnel");
        w.write_raw(&[0u8; NONCE_SIZE - 1]);
        cwr.write_all(&codec::frame(SB_PLUGIN_MESSAGE, &w.into_inner()))
            .await
            .unwrap();
        // Finally something real.
        cwr.write_all(&plugin_frame(&cipher, "minewire:tunnel", b"ok"))
            .await
            .unwrap();

        let mut buf = [0u8; 2];
        reader.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ok");
    }

    #[tokio::test]
    async fn test_reader_eof_when_ingest_ends() {
        let cipher = cipher();
        let (client, server) = tokio::io::duplex(1024);
        let (srd, _swr) = tokio::io::split(server);
        let (tx, mut reader) = plaintext_pipe();
        let ingest = tokio::spawn(run_ingest(srd, cipher, tx));

        drop(client); // connection gone
        ingest.await.unwrap();

        let mut buf = [0u8; 8];
        assert_eq!(reader.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sink_serializes_concurrent_writers() {
        let cipher = cipher();
        let (client, server) = tokio::io::duplex(1024 * 1024);
        let (_srd, swr) = tokio::io::split(server);
        let sink = Arc::new(PacketSink::new(swr));
        let motion = Arc::new(Mutex::new(Walker::new()));
        let writer = TunnelWriter::new(sink.clone(), cipher.clone(), motion);

        let mut tasks = Vec::new();
        for t in 0..4u8 {
            let writer = writer.clone();
            let sink = sink.clone();
            tasks.push(tokio::spawn(async move {
                for i in 0..25u8 {
                    writer.write(&[t, i]).await.unwrap();
                    sink.send(crate::protocol::CB_KEEP_ALIVE, &disguise::keep_alive(i as i64))
                        .await
                        .unwrap();
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        drop(writer);

        // Every byte on the wire must parse as a clean packet sequence:
        // interleaved writes would desynchronize the framing.
        let (mut crd, _cwr) = tokio::io::split(client);
        let mut data_packets = 0;
        let mut keep_alives = 0;
        for _ in 0..200 {
            let body = codec::read_frame(&mut crd, MAX_PACKET_LEN).await.unwrap();
            let mut r = Reader::new(&body);
            match r.read_var_int().unwrap() {
                CB_CHUNK_DATA => data_packets += 1,
                crate::protocol::CB_KEEP_ALIVE => keep_alives += 1,
                other => panic!("unexpected packet id {other}"),
            }
        }
        assert_eq!(data_packets, 100);
        assert_eq!(keep_alives, 100);
    }
}
