//! quic-sans-io: A minimal, sans-I/O QUIC packet composition engine
//!
//! This crate provides the frame-composition core of a QUIC-based HTTP
//! transport: outbound packets are assembled frame by frame, tracked per
//! stream, and surgically edited when streams reset — plus an HTTP/2-style
//! frame writer for the dedicated HEADERS stream.
//!
//! # Features
//!
//! - **Sans-I/O Design**: No sockets, no event loop, no async runtime
//! - **Version-Parameterized Codec**: STREAM, RST_STREAM, ACK, PADDING,
//!   CONNECTION_CLOSE, GOAWAY, WINDOW_UPDATE, BLOCKED, STOP_WAITING
//!   generators and parsers behind a per-version dispatch table
//! - **Packet Composition**: Regeneration prefix tracking and a
//!   stream-record index over every packet's payload
//! - **Reset Elision**: In-place removal of STREAM frames whose streams
//!   have been reset, without disturbing surviving bytes
//! - **HEADERS-Stream Writer**: HEADERS/CONTINUATION chaining, SETTINGS,
//!   PRIORITY, PUSH_PROMISE, with HPACK compression via fluke-hpack
//!
//! # Quick Start
//!
//! ```rust
//! use std::rc::Rc;
//! use quic_sans_io::{
//!     codec_for_version, FrameKind, MemPool, SliceSource, Stream, Version,
//!     QUIC_MAX_PAYLOAD_SZ,
//! };
//!
//! let codec = codec_for_version(Version::Q043).unwrap();
//! let mut mm = MemPool::new();
//! let mut packet = mm.get_packet_out(QUIC_MAX_PAYLOAD_SZ).unwrap();
//!
//! // Append a STREAM frame and note which stream owns its bytes.
//! let stream = Rc::new(Stream::new(5));
//! let mut source = SliceSource::new(b"hello", false);
//! let off = packet.data_sz();
//! let len = (codec.gen_stream_frame)(packet.tail(), stream.id(), 0, false, 5, &mut source)
//!     .unwrap();
//! packet.append_frame(FrameKind::Stream, len);
//! packet.add_stream_record(&stream, FrameKind::Stream, off, len);
//! assert_eq!(stream.n_unacked(), 1);
//!
//! // The stream resets before the packet is resent: its frame is elided.
//! stream.set_rst_sent();
//! packet.elide_reset_stream_frames(0);
//! assert_eq!(stream.n_unacked(), 0);
//! assert!(packet.frame_types().is_empty());
//! ```
//!
//! # Architecture
//!
//! This crate is intentionally minimal. It provides:
//! - Frame generation and parsing (version-parameterized)
//! - Packet-out buffers with stream-record bookkeeping and reset elision
//! - Pooled buffer allocation
//! - The outbound HEADERS-stream frame writer
//!
//! It does NOT provide:
//! - Congestion control, loss detection, or retransmission scheduling
//! - The cryptographic handshake or packet header protection
//! - Socket I/O (you move the bytes)
//! - Connection or stream state machines (your responsibility)
//!
//! # Use Cases
//!
//! - **Transport engines**: the packet-assembly layer under a QUIC
//!   connection's send path
//! - **Testing utilities**: byte-exact frame construction without a
//!   running stack
//! - **Protocol tooling**: parsing captured payloads frame by frame

pub mod codec;
pub mod error;
pub mod frame;
pub mod frame_writer;
pub mod hpack;
pub mod http_frame;
pub mod packet_out;
pub mod pool;
pub mod stream;

pub use codec::{codec_for_version, FrameCodec, Version};
pub use error::{Error, Result};
pub use frame::{
    AckInfo, AckRange, BlockedFrame, ConnectionCloseFrame, Frame, FrameKind, FrameTypeSet,
    GoawayFrame, RstStreamFrame, StopWaitingFrame, StreamFrame, WindowUpdateFrame,
};
pub use frame_writer::{
    FrameWriter, HeadersStream, HttpSetting, DEFAULT_MAX_FRAME_SIZE,
};
pub use hpack::{Header, HpackDecoder, HpackEncoder};
pub use http_frame::{flags, frame_type, settings_id, FrameHeader, FRAME_HEADER_SZ};
pub use packet_out::{PacketOut, StreamRecord};
pub use pool::{MemPool, QUIC_MAX_PACKET_SZ, QUIC_MAX_PAYLOAD_SZ};
pub use stream::{SliceSource, Stream, StreamFlags, StreamId, StreamSource};
