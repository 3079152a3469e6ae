//! Version-parameterized QUIC frame codec.
//!
//! Each supported wire version resolves, once, to an immutable table of
//! pure functions ([`FrameCodec`]). Generators serialize a single frame
//! into a caller-supplied span and report bytes written; parsers walk a
//! span and report bytes consumed plus the decoded frame. Neither side
//! allocates, except for ACK range lists.
//!
//! Only the big-endian gQUIC layout (Q039 and later) is serialized here.
//! The legacy little-endian layout used by Q035 is recognized as a version
//! but fails closed: asking for its codec returns
//! [`Error::UnsupportedVersion`] instead of producing ambiguous bytes.

use crate::error::{Error, Result};
use crate::frame::{
    AckInfo, AckRange, BlockedFrame, ConnectionCloseFrame, Frame, GoawayFrame, RstStreamFrame,
    StopWaitingFrame, StreamFrame, WindowUpdateFrame,
};
use crate::stream::{StreamId, StreamSource};

/// Wire protocol versions this crate knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Version {
    /// Legacy little-endian framing. Recognized but not serialized.
    Q035,
    Q039,
    Q043,
}

type GenStreamFrame =
    fn(&mut [u8], StreamId, u64, bool, usize, &mut dyn StreamSource) -> Result<usize>;
type GenRstFrame = fn(&mut [u8], StreamId, u64, u32) -> Result<usize>;
type GenAckFrame = fn(&mut [u8], &AckInfo) -> Result<usize>;
type GenPaddingFrame = fn(&mut [u8]) -> usize;
type GenConnectionCloseFrame = fn(&mut [u8], u32, &[u8]) -> Result<usize>;
type GenGoawayFrame = fn(&mut [u8], u32, StreamId, &[u8]) -> Result<usize>;
type GenWindowUpdateFrame = fn(&mut [u8], StreamId, u64) -> Result<usize>;
type GenBlockedFrame = fn(&mut [u8], StreamId) -> Result<usize>;
type GenStopWaitingFrame = fn(&mut [u8], usize, u64) -> Result<usize>;
type ParseFrame = for<'a> fn(&'a [u8], usize) -> Result<(usize, Frame<'a>)>;

/// Dispatch table for one wire layout. Resolve it out of the hot path with
/// [`codec_for_version`] and call through the fields.
#[derive(Debug)]
pub struct FrameCodec {
    pub gen_stream_frame: GenStreamFrame,
    pub gen_rst_frame: GenRstFrame,
    pub gen_ack_frame: GenAckFrame,
    pub gen_padding_frame: GenPaddingFrame,
    pub gen_connection_close_frame: GenConnectionCloseFrame,
    pub gen_goaway_frame: GenGoawayFrame,
    pub gen_window_update_frame: GenWindowUpdateFrame,
    pub gen_blocked_frame: GenBlockedFrame,
    pub gen_stop_waiting_frame: GenStopWaitingFrame,
    /// Dispatches on the first byte. The second argument is the packet
    /// number width in bytes, which STOP_WAITING inherits from the packet
    /// header.
    pub parse_frame: ParseFrame,
}

static GQUIC_BE: FrameCodec = FrameCodec {
    gen_stream_frame,
    gen_rst_frame,
    gen_ack_frame,
    gen_padding_frame,
    gen_connection_close_frame,
    gen_goaway_frame,
    gen_window_update_frame,
    gen_blocked_frame,
    gen_stop_waiting_frame,
    parse_frame,
};

pub fn codec_for_version(version: Version) -> Result<&'static FrameCodec> {
    match version {
        Version::Q039 | Version::Q043 => Ok(&GQUIC_BE),
        Version::Q035 => Err(Error::UnsupportedVersion),
    }
}

// Regular-frame type bytes. STREAM and ACK occupy the high-bit spaces.
const TYPE_PADDING: u8 = 0x00;
const TYPE_RST_STREAM: u8 = 0x01;
const TYPE_CONNECTION_CLOSE: u8 = 0x02;
const TYPE_GOAWAY: u8 = 0x03;
const TYPE_WINDOW_UPDATE: u8 = 0x04;
const TYPE_BLOCKED: u8 = 0x05;
const TYPE_STOP_WAITING: u8 = 0x06;

const STREAM_BIT: u8 = 0x80;
const STREAM_FIN: u8 = 0x40;
const STREAM_DLEN: u8 = 0x20;
const ACK_BIT: u8 = 0x40;
const ACK_HAS_RANGES: u8 = 0x20;

const RST_STREAM_SZ: usize = 1 + 4 + 8 + 4;
const WINDOW_UPDATE_SZ: usize = 1 + 4 + 8;
const BLOCKED_SZ: usize = 1 + 4;

fn write_uint_be(buf: &mut [u8], value: u64, len: usize) {
    for (i, b) in buf[..len].iter_mut().enumerate() {
        *b = (value >> ((len - 1 - i) * 8)) as u8;
    }
}

fn read_uint_be(buf: &[u8], len: usize) -> u64 {
    buf[..len].iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

/// Smallest of the 1/2/3/4-byte stream id encodings that fits.
fn stream_id_len(id: StreamId) -> usize {
    match id {
        0..=0xFF => 1,
        0x100..=0xFF_FF => 2,
        0x1_00_00..=0xFF_FF_FF => 3,
        _ => 4,
    }
}

/// Offsets are encoded in 0 or 2..=8 bytes; zero is elided entirely.
fn offset_len(offset: u64) -> usize {
    if offset == 0 {
        return 0;
    }
    let mut len = (64 - offset.leading_zeros() as usize + 7) / 8;
    if len < 2 {
        len = 2;
    }
    len
}

/// Packet-number-style field widths used by ACK: 1, 2, 4, or 6 bytes.
fn packno_len(value: u64) -> Result<(u8, usize)> {
    match value {
        0..=0xFF => Ok((0, 1)),
        0x100..=0xFF_FF => Ok((1, 2)),
        0x1_00_00..=0xFF_FF_FF_FF => Ok((2, 4)),
        0x1_00_00_00_00..=0xFF_FF_FF_FF_FF_FF => Ok((3, 6)),
        _ => Err(Error::InvalidParam),
    }
}

fn packno_idx_to_len(idx: u8) -> usize {
    match idx & 0x3 {
        0 => 1,
        1 => 2,
        2 => 4,
        _ => 6,
    }
}

const UFLOAT16_MANTISSA_BITS: u32 = 11;
const UFLOAT16_MAX_EXPONENT: u64 = 30;

/// gQUIC 16-bit packed time: 11-bit mantissa with hidden bit, 5-bit
/// exponent. Exact for values below 2^12; larger values lose low bits.
fn pack_time(us: u64) -> u16 {
    if us < (1 << (UFLOAT16_MANTISSA_BITS + 1)) {
        return us as u16;
    }
    let exponent = (63 - us.leading_zeros() as u64) - UFLOAT16_MANTISSA_BITS as u64;
    if exponent > UFLOAT16_MAX_EXPONENT {
        return u16::MAX;
    }
    let mantissa = us >> exponent;
    (mantissa + (exponent << UFLOAT16_MANTISSA_BITS)) as u16
}

fn unpack_time(packed: u16) -> u64 {
    let packed = packed as u64;
    if packed < (1 << (UFLOAT16_MANTISSA_BITS + 1)) {
        return packed;
    }
    let exponent = (packed >> UFLOAT16_MANTISSA_BITS) - 1;
    let mantissa = (packed & ((1 << UFLOAT16_MANTISSA_BITS) - 1)) | (1 << UFLOAT16_MANTISSA_BITS);
    mantissa << exponent
}

/// STREAM frame: type byte `1FDOOOSS`. F is FIN, D marks an explicit
/// 16-bit data length (always emitted on generation), OOO selects
/// 0/2/3/4/5/6/7/8 offset bytes, SS selects 1..=4 stream-id bytes.
fn gen_stream_frame(
    out: &mut [u8],
    stream_id: StreamId,
    offset: u64,
    fin: bool,
    data_sz: usize,
    source: &mut dyn StreamSource,
) -> Result<usize> {
    if data_sz == 0 && !fin {
        return Err(Error::InvalidParam);
    }
    let id_len = stream_id_len(stream_id);
    let off_len = offset_len(offset);
    let header_sz = 1 + id_len + off_len + 2;
    let min_data = usize::from(data_sz > 0);
    if out.len() < header_sz + min_data {
        return Err(Error::InsufficientSpace);
    }

    let room = (out.len() - header_sz).min(data_sz).min(u16::MAX as usize);
    let (n_read, reached_fin) = if data_sz == 0 {
        (0, fin)
    } else {
        source.read(&mut out[header_sz..header_sz + room])
    };
    debug_assert!(n_read <= room);
    if n_read == 0 && !reached_fin {
        // An empty non-FIN frame says nothing; the caller should not have
        // asked for one.
        return Err(Error::InvalidParam);
    }

    let ooo = if off_len == 0 { 0 } else { (off_len - 1) as u8 };
    let mut type_byte = STREAM_BIT | STREAM_DLEN | (ooo << 2) | (id_len - 1) as u8;
    if reached_fin {
        type_byte |= STREAM_FIN;
    }
    out[0] = type_byte;
    let mut pos = 1;
    write_uint_be(&mut out[pos..], stream_id as u64, id_len);
    pos += id_len;
    write_uint_be(&mut out[pos..], offset, off_len);
    pos += off_len;
    write_uint_be(&mut out[pos..], n_read as u64, 2);
    pos += 2;
    Ok(pos + n_read)
}

fn parse_stream_frame(buf: &[u8]) -> Result<(usize, Frame<'_>)> {
    let type_byte = buf[0];
    let fin = type_byte & STREAM_FIN != 0;
    let has_dlen = type_byte & STREAM_DLEN != 0;
    let ooo = (type_byte >> 2) & 0x7;
    let off_len = if ooo == 0 { 0 } else { ooo as usize + 1 };
    let id_len = (type_byte & 0x3) as usize + 1;

    let mut pos = 1;
    let fixed = id_len + off_len + if has_dlen { 2 } else { 0 };
    if buf.len() < pos + fixed {
        return Err(Error::Truncated);
    }
    let stream_id = read_uint_be(&buf[pos..], id_len) as StreamId;
    pos += id_len;
    let offset = read_uint_be(&buf[pos..], off_len);
    pos += off_len;
    let (data, consumed) = if has_dlen {
        let dlen = read_uint_be(&buf[pos..], 2) as usize;
        pos += 2;
        if buf.len() < pos + dlen {
            return Err(Error::Truncated);
        }
        (&buf[pos..pos + dlen], pos + dlen)
    } else {
        (&buf[pos..], buf.len())
    };
    if data.is_empty() && !fin {
        return Err(Error::InvalidEncoding);
    }
    Ok((
        consumed,
        Frame::Stream(StreamFrame {
            stream_id,
            offset,
            fin,
            data,
        }),
    ))
}

/// RST_STREAM is fixed-layout: type, 4-byte stream id, 8-byte offset,
/// 4-byte error code.
fn gen_rst_frame(out: &mut [u8], stream_id: StreamId, offset: u64, error_code: u32) -> Result<usize> {
    if out.len() < RST_STREAM_SZ {
        return Err(Error::InsufficientSpace);
    }
    out[0] = TYPE_RST_STREAM;
    write_uint_be(&mut out[1..], stream_id as u64, 4);
    write_uint_be(&mut out[5..], offset, 8);
    write_uint_be(&mut out[13..], error_code as u64, 4);
    Ok(RST_STREAM_SZ)
}

fn parse_rst_frame(buf: &[u8]) -> Result<(usize, Frame<'_>)> {
    if buf.len() < RST_STREAM_SZ {
        return Err(Error::Truncated);
    }
    Ok((
        RST_STREAM_SZ,
        Frame::RstStream(RstStreamFrame {
            stream_id: read_uint_be(&buf[1..], 4) as StreamId,
            offset: read_uint_be(&buf[5..], 8),
            error_code: read_uint_be(&buf[13..], 4) as u32,
        }),
    ))
}

/// ACK: `01HLLMM` type byte (H = additional ranges follow, LL = largest
/// acked width, MM = range length width), largest acked, packed 16-bit
/// delay, optional (gap, length) pairs, and a zero timestamp count. Gaps
/// wider than 255 are split with zero-length ranges which the parser
/// re-merges.
fn gen_ack_frame(out: &mut [u8], ack: &AckInfo) -> Result<usize> {
    if ack.ranges.is_empty() {
        return Err(Error::InvalidParam);
    }
    for range in &ack.ranges {
        if range.low > range.high {
            return Err(Error::InvalidParam);
        }
    }
    for pair in ack.ranges.windows(2) {
        if pair[0].low <= pair[1].high + 1 {
            return Err(Error::InvalidParam);
        }
    }

    let largest = ack.ranges[0].high;
    let (largest_idx, largest_len) = packno_len(largest)?;

    // Flatten the tail ranges into one-byte-gap blocks.
    let mut blocks: Vec<(u8, u64)> = Vec::new();
    for pair in ack.ranges.windows(2) {
        let mut gap = pair[0].low - pair[1].high - 1;
        while gap > 255 {
            blocks.push((255, 0));
            gap -= 255;
        }
        blocks.push((gap as u8, pair[1].len()));
    }
    if blocks.len() > 255 {
        return Err(Error::InvalidParam);
    }

    let max_block = blocks
        .iter()
        .map(|&(_, len)| len)
        .chain(std::iter::once(ack.ranges[0].len()))
        .max()
        .unwrap();
    let (block_idx, block_len) = packno_len(max_block)?;

    let has_ranges = !blocks.is_empty();
    let total = 1
        + largest_len
        + 2
        + usize::from(has_ranges)
        + block_len
        + blocks.len() * (1 + block_len)
        + 1;
    if out.len() < total {
        return Err(Error::InsufficientSpace);
    }

    let mut type_byte = ACK_BIT | (largest_idx << 2) | block_idx;
    if has_ranges {
        type_byte |= ACK_HAS_RANGES;
    }
    out[0] = type_byte;
    let mut pos = 1;
    write_uint_be(&mut out[pos..], largest, largest_len);
    pos += largest_len;
    write_uint_be(&mut out[pos..], pack_time(ack.ack_delay_us) as u64, 2);
    pos += 2;
    if has_ranges {
        out[pos] = blocks.len() as u8;
        pos += 1;
    }
    write_uint_be(&mut out[pos..], ack.ranges[0].len(), block_len);
    pos += block_len;
    for &(gap, len) in &blocks {
        out[pos] = gap;
        pos += 1;
        write_uint_be(&mut out[pos..], len, block_len);
        pos += block_len;
    }
    out[pos] = 0; // timestamp count
    pos += 1;
    debug_assert_eq!(pos, total);
    Ok(pos)
}

fn parse_ack_frame(buf: &[u8]) -> Result<(usize, Frame<'_>)> {
    let type_byte = buf[0];
    let has_ranges = type_byte & ACK_HAS_RANGES != 0;
    let largest_len = packno_idx_to_len(type_byte >> 2);
    let block_len = packno_idx_to_len(type_byte);

    let mut pos = 1;
    if buf.len() < pos + largest_len + 2 {
        return Err(Error::Truncated);
    }
    let largest = read_uint_be(&buf[pos..], largest_len);
    pos += largest_len;
    let ack_delay_us = unpack_time(read_uint_be(&buf[pos..], 2) as u16);
    pos += 2;

    let n_blocks = if has_ranges {
        if buf.len() < pos + 1 {
            return Err(Error::Truncated);
        }
        let n = buf[pos] as usize;
        pos += 1;
        n
    } else {
        0
    };

    if buf.len() < pos + block_len {
        return Err(Error::Truncated);
    }
    let first_len = read_uint_be(&buf[pos..], block_len);
    pos += block_len;
    if first_len == 0 || first_len > largest + 1 {
        return Err(Error::InvalidEncoding);
    }

    let mut ranges = vec![AckRange {
        high: largest,
        low: largest - first_len + 1,
    }];
    let mut cursor = largest - first_len + 1;
    for _ in 0..n_blocks {
        if buf.len() < pos + 1 + block_len {
            return Err(Error::Truncated);
        }
        let gap = buf[pos] as u64;
        pos += 1;
        let len = read_uint_be(&buf[pos..], block_len);
        pos += block_len;
        if len == 0 {
            cursor = cursor.checked_sub(gap).ok_or(Error::InvalidEncoding)?;
            continue;
        }
        let high = cursor.checked_sub(gap + 1).ok_or(Error::InvalidEncoding)?;
        let low = (high + 1).checked_sub(len).ok_or(Error::InvalidEncoding)?;
        ranges.push(AckRange { high, low });
        cursor = low;
    }

    if buf.len() < pos + 1 {
        return Err(Error::Truncated);
    }
    if buf[pos] != 0 {
        // Timestamp sections are not part of the supported subset.
        return Err(Error::InvalidEncoding);
    }
    pos += 1;

    Ok((pos, Frame::Ack(AckInfo { ack_delay_us, ranges })))
}

/// Fills the remaining space with padding. Infallible: zero available
/// bytes simply produce zero padding.
fn gen_padding_frame(out: &mut [u8]) -> usize {
    out.fill(0);
    out.len()
}

fn gen_connection_close_frame(out: &mut [u8], error_code: u32, reason: &[u8]) -> Result<usize> {
    if reason.len() > u16::MAX as usize {
        return Err(Error::InvalidParam);
    }
    let total = 1 + 4 + 2 + reason.len();
    if out.len() < total {
        return Err(Error::InsufficientSpace);
    }
    out[0] = TYPE_CONNECTION_CLOSE;
    write_uint_be(&mut out[1..], error_code as u64, 4);
    write_uint_be(&mut out[5..], reason.len() as u64, 2);
    out[7..total].copy_from_slice(reason);
    Ok(total)
}

fn parse_connection_close_frame(buf: &[u8]) -> Result<(usize, Frame<'_>)> {
    if buf.len() < 7 {
        return Err(Error::Truncated);
    }
    let error_code = read_uint_be(&buf[1..], 4) as u32;
    let reason_len = read_uint_be(&buf[5..], 2) as usize;
    if buf.len() < 7 + reason_len {
        return Err(Error::Truncated);
    }
    Ok((
        7 + reason_len,
        Frame::ConnectionClose(ConnectionCloseFrame {
            error_code,
            reason: &buf[7..7 + reason_len],
        }),
    ))
}

fn gen_goaway_frame(
    out: &mut [u8],
    error_code: u32,
    last_good_stream_id: StreamId,
    reason: &[u8],
) -> Result<usize> {
    if reason.len() > u16::MAX as usize {
        return Err(Error::InvalidParam);
    }
    let total = 1 + 4 + 4 + 2 + reason.len();
    if out.len() < total {
        return Err(Error::InsufficientSpace);
    }
    out[0] = TYPE_GOAWAY;
    write_uint_be(&mut out[1..], error_code as u64, 4);
    write_uint_be(&mut out[5..], last_good_stream_id as u64, 4);
    write_uint_be(&mut out[9..], reason.len() as u64, 2);
    out[11..total].copy_from_slice(reason);
    Ok(total)
}

fn parse_goaway_frame(buf: &[u8]) -> Result<(usize, Frame<'_>)> {
    if buf.len() < 11 {
        return Err(Error::Truncated);
    }
    let error_code = read_uint_be(&buf[1..], 4) as u32;
    let last_good_stream_id = read_uint_be(&buf[5..], 4) as StreamId;
    let reason_len = read_uint_be(&buf[9..], 2) as usize;
    if buf.len() < 11 + reason_len {
        return Err(Error::Truncated);
    }
    Ok((
        11 + reason_len,
        Frame::Goaway(GoawayFrame {
            error_code,
            last_good_stream_id,
            reason: &buf[11..11 + reason_len],
        }),
    ))
}

fn gen_window_update_frame(out: &mut [u8], stream_id: StreamId, offset: u64) -> Result<usize> {
    if out.len() < WINDOW_UPDATE_SZ {
        return Err(Error::InsufficientSpace);
    }
    out[0] = TYPE_WINDOW_UPDATE;
    write_uint_be(&mut out[1..], stream_id as u64, 4);
    write_uint_be(&mut out[5..], offset, 8);
    Ok(WINDOW_UPDATE_SZ)
}

fn parse_window_update_frame(buf: &[u8]) -> Result<(usize, Frame<'_>)> {
    if buf.len() < WINDOW_UPDATE_SZ {
        return Err(Error::Truncated);
    }
    Ok((
        WINDOW_UPDATE_SZ,
        Frame::WindowUpdate(WindowUpdateFrame {
            stream_id: read_uint_be(&buf[1..], 4) as StreamId,
            offset: read_uint_be(&buf[5..], 8),
        }),
    ))
}

fn gen_blocked_frame(out: &mut [u8], stream_id: StreamId) -> Result<usize> {
    if out.len() < BLOCKED_SZ {
        return Err(Error::InsufficientSpace);
    }
    out[0] = TYPE_BLOCKED;
    write_uint_be(&mut out[1..], stream_id as u64, 4);
    Ok(BLOCKED_SZ)
}

fn parse_blocked_frame(buf: &[u8]) -> Result<(usize, Frame<'_>)> {
    if buf.len() < BLOCKED_SZ {
        return Err(Error::Truncated);
    }
    Ok((
        BLOCKED_SZ,
        Frame::Blocked(BlockedFrame {
            stream_id: read_uint_be(&buf[1..], 4) as StreamId,
        }),
    ))
}

/// STOP_WAITING carries the least-unacked delta in the same width as the
/// enclosing packet's number field (1, 2, 4, or 6 bytes).
fn gen_stop_waiting_frame(out: &mut [u8], packno_len: usize, delta: u64) -> Result<usize> {
    if !matches!(packno_len, 1 | 2 | 4 | 6) {
        return Err(Error::InvalidParam);
    }
    if packno_len < 8 && delta >= 1 << (packno_len * 8) {
        return Err(Error::InvalidParam);
    }
    if out.len() < 1 + packno_len {
        return Err(Error::InsufficientSpace);
    }
    out[0] = TYPE_STOP_WAITING;
    write_uint_be(&mut out[1..], delta, packno_len);
    Ok(1 + packno_len)
}

fn parse_stop_waiting_frame(buf: &[u8], packno_len: usize) -> Result<(usize, Frame<'_>)> {
    if !matches!(packno_len, 1 | 2 | 4 | 6) {
        return Err(Error::InvalidParam);
    }
    if buf.len() < 1 + packno_len {
        return Err(Error::Truncated);
    }
    Ok((
        1 + packno_len,
        Frame::StopWaiting(StopWaitingFrame {
            least_unacked_delta: read_uint_be(&buf[1..], packno_len),
        }),
    ))
}

fn parse_frame(buf: &[u8], packno_len: usize) -> Result<(usize, Frame<'_>)> {
    let type_byte = *buf.first().ok_or(Error::Truncated)?;
    if type_byte & STREAM_BIT != 0 {
        return parse_stream_frame(buf);
    }
    if type_byte & ACK_BIT != 0 {
        return parse_ack_frame(buf);
    }
    match type_byte {
        TYPE_PADDING => Ok((buf.len(), Frame::Padding(buf.len()))),
        TYPE_RST_STREAM => parse_rst_frame(buf),
        TYPE_CONNECTION_CLOSE => parse_connection_close_frame(buf),
        TYPE_GOAWAY => parse_goaway_frame(buf),
        TYPE_WINDOW_UPDATE => parse_window_update_frame(buf),
        TYPE_BLOCKED => parse_blocked_frame(buf),
        TYPE_STOP_WAITING => parse_stop_waiting_frame(buf, packno_len),
        other => Err(Error::UnknownFrame(other)),
    }
}
