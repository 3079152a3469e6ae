//! Version-parameterized frame codec: generators, parsers, round-trips.

mod ack;
mod stream_frames;

use quic_sans_io::{codec_for_version, FrameCodec, Version};

pub fn codec() -> &'static FrameCodec {
    codec_for_version(Version::Q043).unwrap()
}

#[test]
fn test_big_endian_versions_share_a_codec() {
    assert!(codec_for_version(Version::Q039).is_ok());
    assert!(codec_for_version(Version::Q043).is_ok());
}

#[test]
fn test_legacy_version_fails_closed() {
    assert_eq!(
        codec_for_version(Version::Q035).unwrap_err(),
        quic_sans_io::Error::UnsupportedVersion
    );
}
