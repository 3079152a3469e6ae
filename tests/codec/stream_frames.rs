//! STREAM frame generation and parsing.

use quic_sans_io::{Error, Frame, SliceSource, StreamFrame};

use super::codec;

#[test]
fn test_minimal_widths_give_exact_bytes() {
    let mut buf = [0u8; 32];
    let mut source = SliceSource::new(b"hello", false);
    let len = (codec().gen_stream_frame)(&mut buf, 5, 0, false, 5, &mut source).unwrap();
    // Type 1FDOOOSS: no FIN, explicit length, zero offset elided, 1-byte id.
    assert_eq!(&buf[..len], &[0xA0, 0x05, 0x00, 0x05, b'h', b'e', b'l', b'l', b'o']);
}

#[test]
fn test_fin_bit_tracks_the_source() {
    let mut buf = [0u8; 32];
    // A closure works as a stream source too.
    let mut source = |dst: &mut [u8]| {
        dst[..3].copy_from_slice(b"bye");
        (3usize, true)
    };
    let len = (codec().gen_stream_frame)(&mut buf, 1, 0, true, 3, &mut source).unwrap();
    assert_eq!(buf[0] & 0x40, 0x40);

    match (codec().parse_frame)(&buf[..len], 1).unwrap() {
        (consumed, Frame::Stream(frame)) => {
            assert_eq!(consumed, len);
            assert!(frame.fin);
            assert_eq!(frame.data, b"bye");
        }
        other => panic!("unexpected parse: {:?}", other),
    }
}

#[test]
fn test_fin_is_withheld_when_data_is_cut_short() {
    // Room for the header plus three data bytes only.
    let mut buf = [0u8; 7];
    let mut source = SliceSource::new(b"hello", true);
    let len = (codec().gen_stream_frame)(&mut buf, 1, 0, true, 5, &mut source).unwrap();
    assert_eq!(len, 7);
    assert_eq!(buf[0] & 0x40, 0, "FIN must wait for the remaining bytes");
    match (codec().parse_frame)(&buf[..len], 1).unwrap().1 {
        Frame::Stream(frame) => assert_eq!(frame.data, b"hel"),
        other => panic!("unexpected parse: {:?}", other),
    }
}

#[test]
fn test_wide_ids_and_offsets_round_trip() {
    let mut buf = [0u8; 64];
    let mut source = SliceSource::new(b"x", false);
    let len =
        (codec().gen_stream_frame)(&mut buf, 0x0102_0304, 0x01_0203_0405, false, 1, &mut source)
            .unwrap();
    // 4-byte id (SS=3), 5-byte offset (OOO=4), explicit length.
    assert_eq!(buf[0], 0x80 | 0x20 | (4 << 2) | 3);
    match (codec().parse_frame)(&buf[..len], 1).unwrap().1 {
        Frame::Stream(frame) => {
            assert_eq!(
                frame,
                StreamFrame {
                    stream_id: 0x0102_0304,
                    offset: 0x01_0203_0405,
                    fin: false,
                    data: b"x",
                }
            );
        }
        other => panic!("unexpected parse: {:?}", other),
    }
}

#[test]
fn test_empty_fin_frame_is_legal() {
    let mut buf = [0u8; 8];
    let mut source = SliceSource::new(b"", true);
    let len = (codec().gen_stream_frame)(&mut buf, 9, 42, true, 0, &mut source).unwrap();
    match (codec().parse_frame)(&buf[..len], 1).unwrap().1 {
        Frame::Stream(frame) => {
            assert!(frame.fin);
            assert!(frame.data.is_empty());
            assert_eq!(frame.offset, 42);
        }
        other => panic!("unexpected parse: {:?}", other),
    }
}

#[test]
fn test_empty_frame_without_fin_is_rejected() {
    let mut buf = [0u8; 8];
    let mut source = SliceSource::new(b"", false);
    assert_eq!(
        (codec().gen_stream_frame)(&mut buf, 9, 0, false, 0, &mut source),
        Err(Error::InvalidParam)
    );
    // And the matching parse error for bytes that claim zero non-FIN data.
    assert_eq!(
        (codec().parse_frame)(&[0xA0, 0x09, 0x00, 0x00], 1),
        Err(Error::InvalidEncoding)
    );
}

#[test]
fn test_implicit_length_runs_to_end_of_span() {
    // FIN set, no data-length field, zero offset, 1-byte id.
    let bytes = [0xC0, 0x07, b'r', b'e', b's', b't'];
    match (codec().parse_frame)(&bytes, 1).unwrap() {
        (consumed, Frame::Stream(frame)) => {
            assert_eq!(consumed, bytes.len());
            assert_eq!(frame.stream_id, 7);
            assert!(frame.fin);
            assert_eq!(frame.data, b"rest");
        }
        other => panic!("unexpected parse: {:?}", other),
    }
}

#[test]
fn test_buffer_too_small_is_reported() {
    let mut buf = [0u8; 3];
    let mut source = SliceSource::new(b"hello", false);
    assert_eq!(
        (codec().gen_stream_frame)(&mut buf, 5, 0, false, 5, &mut source),
        Err(Error::InsufficientSpace)
    );
}

#[test]
fn test_truncated_stream_frame_is_reported() {
    let mut buf = [0u8; 32];
    let mut source = SliceSource::new(b"hello", false);
    let len = (codec().gen_stream_frame)(&mut buf, 5, 1000, false, 5, &mut source).unwrap();
    for cut in 1..len {
        assert_eq!(
            (codec().parse_frame)(&buf[..cut], 1),
            Err(Error::Truncated),
            "cut at {}",
            cut
        );
    }
}
