//! Packet-out composition, stream records, regen handling, and elision.


use std::rc::Rc;

use quic_sans_io::{
    codec_for_version, AckInfo, AckRange, FrameCodec, FrameKind, MemPool, PacketOut, SliceSource,
    Stream, Version, QUIC_MAX_PAYLOAD_SZ,
};

pub fn codec() -> &'static FrameCodec {
    codec_for_version(Version::Q043).unwrap()
}

pub fn new_packet(mm: &mut MemPool) -> PacketOut {
    mm.get_packet_out(QUIC_MAX_PAYLOAD_SZ).unwrap()
}

/// Serializes one STREAM frame for `stream`, commits it, and records it.
/// Returns the frame's payload offset and length.
pub fn append_stream_frame(
    packet: &mut PacketOut,
    stream: &Rc<Stream>,
    offset: u64,
    data: &[u8],
) -> (usize, usize) {
    let off = packet.data_sz();
    let mut source = SliceSource::new(data, false);
    let len = (codec().gen_stream_frame)(
        packet.tail(),
        stream.id(),
        offset,
        false,
        data.len(),
        &mut source,
    )
    .unwrap();
    packet.append_frame(FrameKind::Stream, len);
    packet.add_stream_record(stream, FrameKind::Stream, off, len);
    (off, len)
}

/// Serializes a RST_STREAM frame for `stream` and charges the stream with
/// a pure-RST record.
pub fn append_rst_frame(packet: &mut PacketOut, stream: &Rc<Stream>, final_off: u64) -> usize {
    let len = (codec().gen_rst_frame)(packet.tail(), stream.id(), final_off, 0).unwrap();
    packet.append_frame(FrameKind::RstStream, len);
    packet.add_stream_record(stream, FrameKind::RstStream, 0, 0);
    len
}

/// Opens the packet with an ACK frame, which lands in the regen prefix.
pub fn append_ack_frame(packet: &mut PacketOut) -> usize {
    let ack = AckInfo {
        ack_delay_us: 0,
        ranges: vec![AckRange { high: 10, low: 1 }],
    };
    let len = (codec().gen_ack_frame)(packet.tail(), &ack).unwrap();
    packet.append_frame(FrameKind::Ack, len);
    len
}
