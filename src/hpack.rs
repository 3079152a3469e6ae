//! HPACK: Header Compression for HTTP/2 (RFC 7541)
//!
//! Thin wrapper around `fluke-hpack` providing the header pair type and
//! the stateful encoder the HEADERS-stream writer shares across writes.
//! The decoder is the peer side; the round-trip tests use it to check
//! dynamic-table synchronization.

use crate::error::{Error, Result};

/// An HTTP/2 header pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Header {
        Header {
            name: name.into(),
            value: value.into(),
        }
    }

    /// The per-header size charge defined by RFC 7540 Section 10.5.1:
    /// uncompressed name and value lengths plus a 32-octet overhead.
    pub fn list_size(&self) -> u64 {
        self.name.len() as u64 + self.value.len() as u64 + 32
    }
}

/// HPACK encoder whose dynamic table persists across calls. Header-carrying
/// frames must be emitted in encoding order or the peer's table desyncs.
pub struct HpackEncoder {
    inner: fluke_hpack::Encoder<'static>,
}

impl std::fmt::Debug for HpackEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HpackEncoder").finish()
    }
}

impl Default for HpackEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl HpackEncoder {
    pub fn new() -> HpackEncoder {
        HpackEncoder {
            inner: fluke_hpack::Encoder::new(),
        }
    }

    /// Encodes a header block onto the end of `out`.
    pub fn encode_block(&mut self, headers: &[Header], out: &mut Vec<u8>) -> Result<()> {
        let pairs = headers
            .iter()
            .map(|h| (h.name.as_bytes(), h.value.as_bytes()));
        self.inner
            .encode_into(pairs, out)
            .map_err(|_| Error::Encoder)
    }
}

/// HPACK decoder for HTTP/2 header blocks.
pub struct HpackDecoder {
    inner: fluke_hpack::Decoder<'static>,
}

impl std::fmt::Debug for HpackDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HpackDecoder").finish()
    }
}

impl Default for HpackDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl HpackDecoder {
    pub fn new() -> HpackDecoder {
        HpackDecoder {
            inner: fluke_hpack::Decoder::new(),
        }
    }

    pub fn decode(&mut self, data: &[u8]) -> Result<Vec<Header>> {
        let pairs = self.inner.decode(data).map_err(|_| Error::InvalidEncoding)?;
        Ok(pairs
            .into_iter()
            .map(|(name, value)| {
                Header::new(
                    String::from_utf8_lossy(&name).into_owned(),
                    String::from_utf8_lossy(&value).into_owned(),
                )
            })
            .collect())
    }
}
