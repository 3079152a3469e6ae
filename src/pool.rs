//! Pooled allocation of packet-out buffers.
//!
//! Packets churn at line rate, so their payload buffers are recycled
//! instead of reallocated. The pool is keyed by capacity; in practice a
//! connection uses one or two sizes. An optional byte budget turns
//! exhaustion into [`Error::OutOfMemory`] instead of unbounded growth.
//!
//! Stream records need no pool of their own: they live inline in each
//! packet's record list.

use log::debug;

use crate::error::{Error, Result};
use crate::packet_out::PacketOut;

/// Largest UDP datagram we assume survives the path without fragmenting.
pub const QUIC_MAX_PACKET_SZ: usize = 1370;

const QUIC_PACKET_HEADER_SZ: usize = 1 + 8 + 4; // flags, connection id, packet number
const QUIC_MAC_SZ: usize = 12;

/// Payload capacity of a full-sized packet: MTU budget minus the framed
/// header and the message integrity tag.
pub const QUIC_MAX_PAYLOAD_SZ: usize = QUIC_MAX_PACKET_SZ - QUIC_PACKET_HEADER_SZ - QUIC_MAC_SZ;

#[derive(Debug, Default)]
pub struct MemPool {
    buffers: Vec<Box<[u8]>>,
    limit: Option<usize>,
    bytes_pooled: usize,
    bytes_out: usize,
}

impl MemPool {
    /// Unbounded pool.
    pub fn new() -> MemPool {
        MemPool::default()
    }

    /// Pool with a total byte budget across pooled and outstanding
    /// buffers. Exceeding it makes `get_packet_out` fail.
    pub fn with_limit(limit: usize) -> MemPool {
        MemPool {
            limit: Some(limit),
            ..MemPool::default()
        }
    }

    /// Returns a zeroed packet of the given payload capacity, reusing a
    /// pooled buffer when one of that size is available.
    pub fn get_packet_out(&mut self, capacity: usize) -> Result<PacketOut> {
        if let Some(idx) = self.buffers.iter().position(|b| b.len() == capacity) {
            let mut buf = self.buffers.swap_remove(idx);
            self.bytes_pooled -= capacity;
            self.bytes_out += capacity;
            buf.fill(0);
            return Ok(PacketOut::new(buf));
        }
        if let Some(limit) = self.limit {
            if self.bytes_pooled + self.bytes_out + capacity > limit {
                debug!("packet-out budget exhausted ({} bytes in use)", self.bytes_out);
                return Err(Error::OutOfMemory);
            }
        }
        self.bytes_out += capacity;
        Ok(PacketOut::new(vec![0u8; capacity].into_boxed_slice()))
    }

    /// Returns a packet to the pool. Remaining stream records release
    /// their unacked charges here, so destroying a packet keeps every
    /// stream's accounting consistent.
    pub fn put_packet_out(&mut self, mut packet: PacketOut) {
        packet.release_records();
        let buf = packet.take_payload();
        self.bytes_out -= buf.len();
        self.bytes_pooled += buf.len();
        self.buffers.push(buf);
    }

    /// Bytes held by the pool plus bytes lent out, for telemetry.
    pub fn mem_used(&self) -> usize {
        self.bytes_pooled + self.bytes_out
    }
}
