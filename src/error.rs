//! Error type shared by the codec, packet composition, and frame writer.

use thiserror::Error;

/// Everything this crate can fail with. Errors are returned as values;
/// nothing in the non-test code paths panics on peer-controlled input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    /// The output span is too small for the frame being serialized.
    /// Callers recover locally, typically by flushing the current packet.
    #[error("not enough room to serialize frame")]
    InsufficientSpace,

    /// The uncompressed header list exceeds the peer-advertised ceiling.
    #[error("header list exceeds SETTINGS_MAX_HEADER_LIST_SIZE")]
    HeaderListTooLarge,

    /// The HPACK encoder failed; fatal for the current write.
    #[error("hpack encoder failure")]
    Encoder,

    /// The input span ended in the middle of a frame.
    #[error("truncated frame")]
    Truncated,

    /// The frame is syntactically invalid for its type.
    #[error("invalid frame encoding")]
    InvalidEncoding,

    /// The first byte does not identify any frame known to this version.
    #[error("unknown frame type {0:#04x}")]
    UnknownFrame(u8),

    /// The protocol version has no serializer; we fail closed rather than
    /// guess at a legacy wire layout.
    #[error("unsupported protocol version")]
    UnsupportedVersion,

    /// An argument is outside the range the wire format can express.
    #[error("argument out of range")]
    InvalidParam,

    /// The allocator's byte budget is exhausted.
    #[error("allocation limit reached")]
    OutOfMemory,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
