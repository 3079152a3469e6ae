//! ACK frame generation and parsing.

use quic_sans_io::{AckInfo, AckRange, Error, Frame};

use super::codec;

fn round_trip(ack: &AckInfo) -> AckInfo {
    let mut buf = [0u8; 512];
    let len = (codec().gen_ack_frame)(&mut buf, ack).unwrap();
    match (codec().parse_frame)(&buf[..len], 1).unwrap() {
        (consumed, Frame::Ack(parsed)) => {
            assert_eq!(consumed, len);
            parsed
        }
        other => panic!("unexpected parse: {:?}", other),
    }
}

#[test]
fn test_single_range_exact_bytes() {
    let ack = AckInfo {
        ack_delay_us: 1000,
        ranges: vec![AckRange { high: 0x1234, low: 0x1200 }],
    };
    let mut buf = [0u8; 64];
    let len = (codec().gen_ack_frame)(&mut buf, &ack).unwrap();
    // 2-byte largest acked, 1-byte range length, no extra ranges.
    assert_eq!(
        &buf[..len],
        &[0x44, 0x12, 0x34, 0x03, 0xE8, 0x35, 0x00]
    );
    assert_eq!(round_trip(&ack), ack);
}

#[test]
fn test_multiple_ranges_round_trip() {
    let ack = AckInfo {
        ack_delay_us: 0,
        ranges: vec![
            AckRange { high: 100, low: 90 },
            AckRange { high: 80, low: 70 },
            AckRange { high: 50, low: 50 },
        ],
    };
    assert_eq!(round_trip(&ack), ack);
}

#[test]
fn test_wide_gaps_are_split_and_remerged() {
    let ack = AckInfo {
        ack_delay_us: 0,
        ranges: vec![
            AckRange { high: 2000, low: 1990 },
            AckRange { high: 10, low: 1 },
        ],
    };
    assert_eq!(round_trip(&ack), ack);
}

#[test]
fn test_large_packet_numbers_round_trip() {
    let ack = AckInfo {
        ack_delay_us: 4096,
        ranges: vec![AckRange { high: 0x01_0000_0001, low: 0x01_0000_0000 }],
    };
    assert_eq!(round_trip(&ack), ack);
}

#[test]
fn test_unrepresentable_delay_is_truncated() {
    let ack = AckInfo {
        ack_delay_us: 4097,
        ranges: vec![AckRange { high: 9, low: 1 }],
    };
    assert_eq!(round_trip(&ack).ack_delay_us, 4096);
}

#[test]
fn test_invalid_range_lists_are_rejected() {
    let mut buf = [0u8; 64];
    let empty = AckInfo { ack_delay_us: 0, ranges: vec![] };
    assert_eq!((codec().gen_ack_frame)(&mut buf, &empty), Err(Error::InvalidParam));

    let overlapping = AckInfo {
        ack_delay_us: 0,
        ranges: vec![AckRange { high: 10, low: 5 }, AckRange { high: 6, low: 1 }],
    };
    assert_eq!(
        (codec().gen_ack_frame)(&mut buf, &overlapping),
        Err(Error::InvalidParam)
    );

    let inverted = AckInfo {
        ack_delay_us: 0,
        ranges: vec![AckRange { high: 5, low: 10 }],
    };
    assert_eq!(
        (codec().gen_ack_frame)(&mut buf, &inverted),
        Err(Error::InvalidParam)
    );
}

#[test]
fn test_insufficient_space_is_reported() {
    let ack = AckInfo {
        ack_delay_us: 0,
        ranges: vec![AckRange { high: 10, low: 1 }],
    };
    let mut buf = [0u8; 4];
    assert_eq!((codec().gen_ack_frame)(&mut buf, &ack), Err(Error::InsufficientSpace));
}

#[test]
fn test_truncated_ack_is_reported() {
    let ack = AckInfo {
        ack_delay_us: 0,
        ranges: vec![AckRange { high: 100, low: 90 }, AckRange { high: 80, low: 70 }],
    };
    let mut buf = [0u8; 64];
    let len = (codec().gen_ack_frame)(&mut buf, &ack).unwrap();
    for cut in 1..len {
        assert_eq!(
            (codec().parse_frame)(&buf[..cut], 1),
            Err(Error::Truncated),
            "cut at {}",
            cut
        );
    }
}

#[test]
fn test_nonzero_timestamp_count_is_rejected() {
    let ack = AckInfo {
        ack_delay_us: 0,
        ranges: vec![AckRange { high: 9, low: 1 }],
    };
    let mut buf = [0u8; 64];
    let len = (codec().gen_ack_frame)(&mut buf, &ack).unwrap();
    buf[len - 1] = 1;
    assert_eq!((codec().parse_frame)(&buf[..len], 1), Err(Error::InvalidEncoding));
}
