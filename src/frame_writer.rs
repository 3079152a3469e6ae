//! Outbound frame writer for the dedicated HEADERS stream.
//!
//! Serializes HTTP request/response metadata into HPACK-compressed header
//! blocks and chains them across HEADERS/CONTINUATION frames, none larger
//! than the peer-advertised maximum frame size. SETTINGS, PRIORITY, and
//! PUSH_PROMISE share the same path.
//!
//! The underlying stream may accept fewer bytes than offered; whatever it
//! refuses lands in a leftover FIFO and the write still counts as
//! committed. New frame sequences queue behind existing leftovers so wire
//! order always matches call order, which the shared HPACK dynamic table
//! depends on.

use std::collections::VecDeque;

use log::{debug, trace};

use crate::error::{Error, Result};
use crate::hpack::{Header, HpackEncoder};
use crate::http_frame::{flags, frame_type, FrameHeader, FRAME_HEADER_SZ};

pub const DEFAULT_MAX_FRAME_SIZE: usize = 16_384;

const PRIORITY_BLOCK_SZ: usize = 5;
const SETTING_ENTRY_SZ: usize = 6;

/// Write half of the HEADERS stream. Accepts up to `buf.len()` bytes and
/// returns how many it took; short writes are expected under flow control.
pub trait HeadersStream {
    fn write(&mut self, buf: &[u8]) -> Result<usize>;
}

impl<F> HeadersStream for F
where
    F: FnMut(&[u8]) -> Result<usize>,
{
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self(buf)
    }
}

/// One SETTINGS entry: 16-bit identifier, 32-bit value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpSetting {
    pub id: u16,
    pub value: u32,
}

pub struct FrameWriter<W> {
    stream: W,
    max_frame_size: usize,
    max_header_list_size: u32,
    encoder: HpackEncoder,
    leftovers: VecDeque<u8>,
    is_server: bool,
}

impl<W: HeadersStream> FrameWriter<W> {
    /// `max_frame_size` of 0 selects the HTTP/2 default of 16384.
    pub fn new(stream: W, max_frame_size: usize, is_server: bool) -> FrameWriter<W> {
        let max_frame_size = if max_frame_size == 0 {
            DEFAULT_MAX_FRAME_SIZE
        } else {
            max_frame_size
        };
        FrameWriter {
            stream,
            max_frame_size,
            max_header_list_size: 0,
            encoder: HpackEncoder::new(),
            leftovers: VecDeque::new(),
            is_server,
        }
    }

    pub fn have_leftovers(&self) -> bool {
        !self.leftovers.is_empty()
    }

    /// Updates the peer ceiling on uncompressed header-list size; 0 means
    /// unlimited. Takes effect on the next write.
    pub fn set_max_header_list_size(&mut self, max: u32) {
        self.max_header_list_size = max;
    }

    pub fn mem_used(&self) -> usize {
        std::mem::size_of::<Self>() + self.leftovers.capacity()
    }

    /// Attempts to drain the leftover FIFO. Success means either the FIFO
    /// emptied or the stream took a partial write; the writer stays
    /// non-empty until fully drained.
    pub fn flush(&mut self) -> Result<()> {
        while !self.leftovers.is_empty() {
            let (head, _) = self.leftovers.as_slices();
            let head_len = head.len();
            let n = self.stream.write(head)?.min(head_len);
            self.leftovers.drain(..n);
            if n < head_len {
                trace!("flush stalled with {} byte(s) left", self.leftovers.len());
                break;
            }
        }
        Ok(())
    }

    /// Emits one header block for `stream_id`: a HEADERS frame followed by
    /// as many CONTINUATION frames as the block needs, END_HEADERS on the
    /// last. `weight` of 1..=256 attaches a priority block and the
    /// PRIORITY flag; 0 omits both. `end_of_stream` sets END_STREAM on the
    /// HEADERS frame only.
    pub fn write_headers(
        &mut self,
        stream_id: u32,
        headers: &[Header],
        end_of_stream: bool,
        weight: u16,
    ) -> Result<()> {
        if weight > 256 {
            return Err(Error::InvalidParam);
        }
        self.check_list_size(headers)?;

        let mut block = Vec::new();
        self.encoder.encode_block(headers, &mut block)?;

        let mut prefix = [0u8; PRIORITY_BLOCK_SZ];
        let mut first_flags = 0u8;
        if end_of_stream {
            first_flags |= flags::END_STREAM;
        }
        let prefix = if weight != 0 {
            first_flags |= flags::PRIORITY;
            prefix[4] = (weight - 1) as u8;
            &prefix[..]
        } else {
            &[][..]
        };

        let bytes = build_block_frames(
            frame_type::HEADERS,
            first_flags,
            stream_id,
            prefix,
            &block,
            self.max_frame_size,
        )?;
        self.commit(&bytes)
    }

    /// Emits one SETTINGS frame carrying the given entries on stream 0.
    /// An empty entries slice produces a zero-payload frame.
    pub fn write_settings(&mut self, settings: &[HttpSetting]) -> Result<()> {
        let payload_sz = settings.len() * SETTING_ENTRY_SZ;
        if payload_sz > self.max_frame_size {
            return Err(Error::InsufficientSpace);
        }
        let mut bytes = Vec::with_capacity(FRAME_HEADER_SZ + payload_sz);
        FrameHeader {
            length: payload_sz as u32,
            frame_type: frame_type::SETTINGS,
            flags: 0,
            stream_id: 0,
        }
        .write_to(&mut bytes);
        for setting in settings {
            bytes.extend_from_slice(&setting.id.to_be_bytes());
            bytes.extend_from_slice(&setting.value.to_be_bytes());
        }
        self.commit(&bytes)
    }

    /// Emits a PRIORITY frame. `priority` of 1..=256 maps to the wire
    /// weight byte; `exclusive` sets the top bit of the dependency field.
    pub fn write_priority(
        &mut self,
        stream_id: u32,
        exclusive: bool,
        dep_stream_id: u32,
        priority: u32,
    ) -> Result<()> {
        if priority == 0 || priority > 256 {
            return Err(Error::InvalidParam);
        }
        let mut bytes = Vec::with_capacity(FRAME_HEADER_SZ + PRIORITY_BLOCK_SZ);
        FrameHeader {
            length: PRIORITY_BLOCK_SZ as u32,
            frame_type: frame_type::PRIORITY,
            flags: 0,
            stream_id,
        }
        .write_to(&mut bytes);
        let mut dep = dep_stream_id & 0x7FFF_FFFF;
        if exclusive {
            dep |= 0x8000_0000;
        }
        bytes.extend_from_slice(&dep.to_be_bytes());
        bytes.push((priority - 1) as u8);
        self.commit(&bytes)
    }

    /// Server-only: promises `promised_stream_id` on `stream_id` with a
    /// GET request synthesized from `path` and `host`, plus any extra
    /// headers. PUSH_PROMISE chains into CONTINUATION like HEADERS does.
    pub fn write_promise(
        &mut self,
        stream_id: u32,
        promised_stream_id: u32,
        path: &str,
        host: &str,
        headers: &[Header],
    ) -> Result<()> {
        if !self.is_server {
            return Err(Error::InvalidParam);
        }
        let mut full = Vec::with_capacity(headers.len() + 4);
        full.push(Header::new(":method", "GET"));
        full.push(Header::new(":scheme", "https"));
        full.push(Header::new(":path", path));
        full.push(Header::new(":authority", host));
        full.extend_from_slice(headers);
        self.check_list_size(&full)?;

        let mut block = Vec::new();
        self.encoder.encode_block(&full, &mut block)?;

        let prefix = (promised_stream_id & 0x7FFF_FFFF).to_be_bytes();
        let bytes = build_block_frames(
            frame_type::PUSH_PROMISE,
            0,
            stream_id,
            &prefix,
            &block,
            self.max_frame_size,
        )?;
        self.commit(&bytes)
    }

    fn check_list_size(&self, headers: &[Header]) -> Result<()> {
        if self.max_header_list_size == 0 {
            return Ok(());
        }
        let total: u64 = headers.iter().map(Header::list_size).sum();
        if total > self.max_header_list_size as u64 {
            debug!(
                "header list of {} byte(s) exceeds peer ceiling {}",
                total, self.max_header_list_size
            );
            return Err(Error::HeaderListTooLarge);
        }
        Ok(())
    }

    /// The frame sequence in `bytes` is complete; from here on the write
    /// cannot fail partially. Queue behind existing leftovers, or write
    /// through and buffer whatever the stream refuses.
    fn commit(&mut self, bytes: &[u8]) -> Result<()> {
        if !self.leftovers.is_empty() {
            self.leftovers.extend(bytes);
            return Ok(());
        }
        let n = self.stream.write(bytes)?.min(bytes.len());
        if n < bytes.len() {
            self.leftovers.extend(&bytes[n..]);
            debug!("stream took {} of {} byte(s), rest buffered", n, bytes.len());
        }
        Ok(())
    }
}

/// Splits a header block into a first frame of `first_type` (whose payload
/// starts with `prefix`) and CONTINUATION frames, each payload at most
/// `max_frame_size`. END_HEADERS goes on exactly the last frame.
fn build_block_frames(
    first_type: u8,
    first_flags: u8,
    stream_id: u32,
    prefix: &[u8],
    block: &[u8],
    max_frame_size: usize,
) -> Result<Vec<u8>> {
    if prefix.len() >= max_frame_size {
        return Err(Error::InvalidParam);
    }

    let first_chunk = block.len().min(max_frame_size - prefix.len());
    let n_frames = 1 + (block.len() - first_chunk).div_ceil(max_frame_size);
    let mut out = Vec::with_capacity(block.len() + prefix.len() + n_frames * FRAME_HEADER_SZ);

    let mut flags_byte = first_flags;
    if first_chunk == block.len() {
        flags_byte |= flags::END_HEADERS;
    }
    FrameHeader {
        length: (prefix.len() + first_chunk) as u32,
        frame_type: first_type,
        flags: flags_byte,
        stream_id,
    }
    .write_to(&mut out);
    out.extend_from_slice(prefix);
    out.extend_from_slice(&block[..first_chunk]);

    let mut rest = &block[first_chunk..];
    while !rest.is_empty() {
        let chunk = rest.len().min(max_frame_size);
        FrameHeader {
            length: chunk as u32,
            frame_type: frame_type::CONTINUATION,
            flags: if chunk == rest.len() { flags::END_HEADERS } else { 0 },
            stream_id,
        }
        .write_to(&mut out);
        out.extend_from_slice(&rest[..chunk]);
        rest = &rest[chunk..];
    }
    Ok(out)
}
