//! Stream multiplexing over the tunnel byte stream.
//!
//! Carries any number of independent bidirectional streams over the single
//! disguised transport. Each frame has a 7-byte header:
//! type(1) + stream_id(4 BE) + payload_len(2 BE).
//!
//! The peer opens streams (the server only accepts), flow control is a
//! per-stream credit window replenished by `WindowUpdate`, and `Close`
//! half-closes the sender's write direction. Because the transport drops
//! packets that fail authentication, any such drop desynchronizes this
//! frame stream; the reader then hits an unknown type or a short header and
//! tears the whole session down, which is the intended failure mode.

pub mod session;

pub use session::{run, MuxStream, StreamReceiver, StreamSender};

use bytes::Bytes;

use crate::error::{Error, Result};

/// Stream identifier type.
pub type StreamId = u32;

/// Frame header size.
pub const HEADER_SIZE: usize = 7;

/// Maximum payload size per frame.
pub const MAX_FRAME_PAYLOAD: usize = 16 * 1024;

/// Initial per-stream flow-control window, in bytes.
pub const INITIAL_WINDOW: u32 = 256 * 1024;

/// Multiplexing frame types.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    /// Peer opens a new stream. Payload: the stream's first bytes
    /// (conventionally the destination address string).
    Open = 0x01,
    /// Data for an existing stream.
    Data = 0x02,
    /// Flow-control credit. Payload: u32 BE byte count.
    WindowUpdate = 0x03,
    /// Graceful half-close of the sender's write side.
    Close = 0x04,
    /// Abrupt teardown of a stream.
    Reset = 0x05,
}

impl FrameType {
    fn from_u8(v: u8) -> Result<Self> {
        match v {
            0x01 => Ok(Self::Open),
            0x02 => Ok(Self::Data),
            0x03 => Ok(Self::WindowUpdate),
            0x04 => Ok(Self::Close),
            0x05 => Ok(Self::Reset),
            _ => Err(Error::mux(format!("unknown frame type 0x{v:02x}"))),
        }
    }
}

/// A multiplexing frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub frame_type: FrameType,
    pub stream_id: StreamId,
    pub payload: Bytes,
}

impl Frame {
    /// Encode the frame for transmission.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_SIZE + self.payload.len());
        buf.push(self.frame_type as u8);
        buf.extend_from_slice(&self.stream_id.to_be_bytes());
        buf.extend_from_slice(&(self.payload.len() as u16).to_be_bytes());
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// Decode a frame from a complete buffer.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(Error::mux(format!("frame too short: {} bytes", data.len())));
        }
        let frame_type = FrameType::from_u8(data[0])?;
        let stream_id = u32::from_be_bytes([data[1], data[2], data[3], data[4]]);
        let len = u16::from_be_bytes([data[5], data[6]]) as usize;
        if data.len() < HEADER_SIZE + len {
            return Err(Error::mux(format!(
                "frame truncated: header declares {len} payload bytes, got {}",
                data.len() - HEADER_SIZE
            )));
        }
        Ok(Self {
            frame_type,
            stream_id,
            payload: Bytes::copy_from_slice(&data[HEADER_SIZE..HEADER_SIZE + len]),
        })
    }

    pub fn open(stream_id: StreamId, payload: Bytes) -> Self {
        Self {
            frame_type: FrameType::Open,
            stream_id,
            payload,
        }
    }

    pub fn data(stream_id: StreamId, payload: Bytes) -> Self {
        Self {
            frame_type: FrameType::Data,
            stream_id,
            payload,
        }
    }

    pub fn window_update(stream_id: StreamId, credit: u32) -> Self {
        Self {
            frame_type: FrameType::WindowUpdate,
            stream_id,
            payload: Bytes::copy_from_slice(&credit.to_be_bytes()),
        }
    }

    pub fn close(stream_id: StreamId) -> Self {
        Self {
            frame_type: FrameType::Close,
            stream_id,
            payload: Bytes::new(),
        }
    }

    pub fn reset(stream_id: StreamId) -> Self {
        Self {
            frame_type: FrameType::Reset,
            stream_id,
            payload: Bytes::new(),
        }
    }
}
