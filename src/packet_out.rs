//! Outbound packet composition buffer.
//!
//! A `PacketOut` is the payload of one outgoing QUIC packet while it is
//! being assembled and while it sits in the sent-packets registry waiting
//! for acknowledgement. Alongside the raw bytes it tracks:
//!
//! - the *regeneration prefix*: leading frames (ACK, STOP_WAITING) whose
//!   contents are recomputed at resend time rather than retransmitted;
//! - a record per stream-owned frame range, so that frames of reset
//!   streams can be surgically removed before the packet is resent.
//!
//! Records are stored inline in payload order, which is the iteration
//! order the elision pass depends on.

use std::rc::Rc;

use log::{debug, trace};

use crate::frame::{FrameKind, FrameTypeSet};
use crate::stream::{Stream, StreamId};

/// Ties a range of the packet payload to the logical stream whose frame
/// lives there. The mask holds STREAM, RST_STREAM, or both when a reset
/// was coalesced onto the stream's existing record.
#[derive(Debug, Clone)]
pub struct StreamRecord {
    stream: Rc<Stream>,
    frame_types: FrameTypeSet,
    off: usize,
    len: usize,
}

impl StreamRecord {
    pub fn stream(&self) -> &Rc<Stream> {
        &self.stream
    }

    pub fn frame_types(&self) -> FrameTypeSet {
        self.frame_types
    }

    /// Payload position of the STREAM frame; 0 for pure RST records.
    pub fn off(&self) -> usize {
        self.off
    }

    /// STREAM frame length; 0 for pure RST records.
    pub fn len(&self) -> usize {
        self.len
    }
}

#[derive(Debug)]
pub struct PacketOut {
    payload: Box<[u8]>,
    data_sz: usize,
    regen_sz: usize,
    frame_types: FrameTypeSet,
    records: Vec<StreamRecord>,
}

impl PacketOut {
    pub(crate) fn new(payload: Box<[u8]>) -> PacketOut {
        PacketOut {
            payload,
            data_sz: 0,
            regen_sz: 0,
            frame_types: FrameTypeSet::EMPTY,
            records: Vec::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.payload.len()
    }

    pub fn data_sz(&self) -> usize {
        self.data_sz
    }

    pub fn regen_sz(&self) -> usize {
        self.regen_sz
    }

    pub fn frame_types(&self) -> FrameTypeSet {
        self.frame_types
    }

    pub fn available(&self) -> usize {
        self.payload.len() - self.data_sz
    }

    /// Serialized payload so far.
    pub fn payload(&self) -> &[u8] {
        &self.payload[..self.data_sz]
    }

    /// Writable suffix for the codec to serialize the next frame into.
    /// Nothing is committed until [`PacketOut::append_frame`] is called.
    pub fn tail(&mut self) -> &mut [u8] {
        &mut self.payload[self.data_sz..]
    }

    /// Commits `len` bytes just serialized into [`PacketOut::tail`].
    ///
    /// Regenerable frames extend the regen prefix as long as they are
    /// still contiguous with it; once any other frame intervenes the
    /// prefix is frozen.
    pub fn append_frame(&mut self, kind: FrameKind, len: usize) {
        debug_assert!(len <= self.available());
        if kind.is_regen() && self.regen_sz == self.data_sz {
            self.regen_sz += len;
        }
        self.data_sz += len;
        self.frame_types.insert(kind);
    }

    /// Notes that `[off, off + len)` of the payload belongs to `stream`.
    ///
    /// Appends in positional order and charges one unacked packet to the
    /// stream per record created. Two cases coalesce into the immediately
    /// preceding record instead of creating a new one: a frame kind the
    /// record does not carry yet (a RST following the stream's own STREAM
    /// frame), and a STREAM frame contiguous with the record's range.
    pub fn add_stream_record(&mut self, stream: &Rc<Stream>, kind: FrameKind, off: usize, len: usize) {
        debug_assert!(matches!(kind, FrameKind::Stream | FrameKind::RstStream));
        if let Some(last) = self.records.last_mut() {
            if Rc::ptr_eq(&last.stream, stream) {
                if kind == FrameKind::Stream
                    && last.frame_types.contains(FrameKind::Stream)
                    && off == last.off + last.len
                {
                    last.len += len;
                    return;
                }
                if !last.frame_types.contains(kind) {
                    last.frame_types.insert(kind);
                    if kind == FrameKind::Stream {
                        last.off = off;
                        last.len = len;
                    }
                    return;
                }
            }
        }
        let (off, len) = if kind == FrameKind::Stream { (off, len) } else { (0, 0) };
        self.records.push(StreamRecord {
            stream: Rc::clone(stream),
            frame_types: FrameTypeSet::from_iter([kind]),
            off,
            len,
        });
        stream.incr_unacked();
    }

    /// Records in payload order.
    pub fn records(&self) -> impl Iterator<Item = &StreamRecord> {
        self.records.iter()
    }

    /// Drops the regeneration prefix when the packet is re-prepared for
    /// resend: the non-regen suffix shifts to offset zero and every
    /// STREAM-bearing record follows it left.
    pub fn chop_regen(&mut self) {
        if self.regen_sz == 0 {
            return;
        }
        let regen = self.regen_sz;
        self.payload.copy_within(regen..self.data_sz, 0);
        self.data_sz -= regen;
        self.regen_sz = 0;
        for record in &mut self.records {
            if record.frame_types.contains(FrameKind::Stream) {
                debug_assert!(record.off >= regen);
                record.off -= regen;
            }
        }
    }

    /// Removes STREAM frames that belong to streams already reset.
    ///
    /// For every record whose stream has RST_SENT set (and whose id is not
    /// `except`), the STREAM byte range is cut out of the payload, later
    /// records shift left, and the record loses its STREAM bit. A record
    /// left with an empty mask is dropped and its unacked charge released.
    /// RST_STREAM frames always survive: a reset stream still needs its
    /// RST delivered. Relative order of surviving frames is preserved
    /// byte-for-byte, and the regen prefix is never touched.
    ///
    /// The packet may come out with no frames at all; callers discard it
    /// then.
    pub fn elide_reset_stream_frames(&mut self, except: StreamId) {
        let mut n_elided = 0usize;
        let mut i = 0;
        while i < self.records.len() {
            let record = &self.records[i];
            let elide = record.frame_types.contains(FrameKind::Stream)
                && record.stream.rst_sent()
                && record.stream.id() != except;
            if !elide {
                i += 1;
                continue;
            }

            let (off, len) = (self.records[i].off, self.records[i].len);
            debug_assert!(off >= self.regen_sz);
            trace!(
                "eliding stream frame of stream {} at [{}, {})",
                record.stream.id(),
                off,
                off + len
            );
            self.payload.copy_within(off + len..self.data_sz, off);
            self.data_sz -= len;
            n_elided += 1;
            for later in &mut self.records[i + 1..] {
                if later.frame_types.contains(FrameKind::Stream) {
                    later.off -= len;
                }
            }

            let record = &mut self.records[i];
            record.frame_types.remove(FrameKind::Stream);
            record.off = 0;
            record.len = 0;
            if record.frame_types.is_empty() {
                let record = self.records.remove(i);
                record.stream.decr_unacked();
            } else {
                i += 1;
            }
        }

        self.frame_types.remove(FrameKind::Stream);
        self.frame_types.remove(FrameKind::RstStream);
        self.frame_types = self
            .records
            .iter()
            .fold(self.frame_types, |acc, r| acc.union(r.frame_types));

        if n_elided > 0 {
            debug!(
                "elided {} stream frame(s); {} payload byte(s) remain",
                n_elided, self.data_sz
            );
        }
    }

    /// Releases every record's unacked charge. Idempotent; also runs on
    /// drop so counters stay correct however the packet dies.
    pub(crate) fn release_records(&mut self) {
        for record in self.records.drain(..) {
            record.stream.decr_unacked();
        }
    }

    pub(crate) fn take_payload(&mut self) -> Box<[u8]> {
        std::mem::take(&mut self.payload)
    }
}

impl Drop for PacketOut {
    fn drop(&mut self) {
        self.release_records();
    }
}
