//! Property-based tests for Frame encoding/decoding.
//!
//! These tests verify that frame serialization is correct for ALL valid
//! inputs, not just specific examples. Uses proptest to generate arbitrary
//! frames and verify round-trip properties.

use bytes::Bytes;
use proptest::prelude::*;
use termstream_proto::{Frame, FrameHeader, FrameType, Payload, payloads::data::TerminalOutputData};

const MAX_MESSAGE_SIZE: u32 = 1024 * 1024;

/// Strategy for generating arbitrary frame types.
fn arbitrary_frame_type() -> impl Strategy<Value = FrameType> {
    prop_oneof![
        Just(FrameType::VersionNegotiation),
        Just(FrameType::Heartbeat),
        Just(FrameType::HeartbeatAck),
        Just(FrameType::Error),
        Just(FrameType::SessionCreate),
        Just(FrameType::SessionAttached),
        Just(FrameType::TerminalOutput),
        Just(FrameType::TerminalInput),
        Just(FrameType::Resize),
        Just(FrameType::StateDelta),
        Just(FrameType::FlowControl),
    ]
}

/// Strategy for generating arbitrary frame headers.
fn arbitrary_header() -> impl Strategy<Value = FrameHeader> {
    (arbitrary_frame_type(), any::<u32>(), any::<u32>()).prop_map(
        |(frame_type, session_id, payload_length)| {
            let mut header = FrameHeader::new(session_id, frame_type.to_u8());
            header.set_payload_length(payload_length);
            header
        },
    )
}

/// Strategy for generating arbitrary frames with payloads up to 1KB.
fn arbitrary_frame() -> impl Strategy<Value = Frame> {
    (arbitrary_header(), prop::collection::vec(any::<u8>(), 0..1024))
        .prop_map(|(header, payload)| Frame::new(header, Bytes::from(payload)))
}

#[test]
fn prop_frame_encode_decode_roundtrip() {
    proptest!(|(frame in arbitrary_frame())| {
        let mut buf = Vec::new();
        frame.encode(&mut buf, MAX_MESSAGE_SIZE).expect("encode should succeed");

        let decoded = Frame::decode(&buf, MAX_MESSAGE_SIZE).expect("decode should succeed");

        prop_assert_eq!(decoded.header, frame.header, "Header mismatch after round-trip");
        prop_assert_eq!(
            decoded.payload.len(),
            frame.payload.len(),
            "Payload length mismatch"
        );
        prop_assert_eq!(decoded.payload, frame.payload, "Payload content mismatch");
    });
}

#[test]
fn prop_frame_header_roundtrip() {
    proptest!(|(header in arbitrary_header())| {
        let bytes = header.to_bytes();
        let decoded = FrameHeader::from_bytes(&bytes).expect("from_bytes should succeed");

        prop_assert_eq!(decoded.version(), header.version(), "Version mismatch");
        prop_assert_eq!(decoded.session_id(), header.session_id(), "Session id mismatch");
        prop_assert_eq!(decoded.frame_type(), header.frame_type(), "Frame type mismatch");
        prop_assert_eq!(
            decoded.payload_length(),
            header.payload_length(),
            "Payload length mismatch"
        );
    });
}

#[test]
fn prop_frame_empty_payload() {
    proptest!(|(header in arbitrary_header())| {
        let frame = Frame::new(header, Bytes::new());

        let mut buf = Vec::new();
        frame.encode(&mut buf, MAX_MESSAGE_SIZE).expect("encode should succeed");

        let decoded = Frame::decode(&buf, MAX_MESSAGE_SIZE).expect("decode should succeed");

        prop_assert_eq!(decoded.payload.len(), 0, "Empty payload should remain empty");
        prop_assert_eq!(decoded.header.payload_length(), 0, "Header should show 0 payload");
    });
}

#[test]
fn prop_frame_large_payload() {
    proptest!(|(
        header in arbitrary_header(),
        payload in prop::collection::vec(any::<u8>(), 1024..65536),
    )| {
        let frame = Frame::new(header, Bytes::from(payload.clone()));

        let mut buf = Vec::new();
        frame.encode(&mut buf, MAX_MESSAGE_SIZE).expect("encode should succeed");

        let decoded = Frame::decode(&buf, MAX_MESSAGE_SIZE).expect("decode should succeed");

        prop_assert_eq!(decoded.payload.len(), payload.len(), "Payload length mismatch");
        prop_assert_eq!(&decoded.payload[..], &payload[..], "Payload content mismatch");
    });
}

#[test]
fn prop_frame_type_preservation() {
    proptest!(|(frame_type in arbitrary_frame_type())| {
        let header = FrameHeader::new(1, frame_type.to_u8());
        let frame = Frame::new(header, Bytes::new());

        let mut buf = Vec::new();
        frame.encode(&mut buf, MAX_MESSAGE_SIZE).expect("encode should succeed");

        let decoded = Frame::decode(&buf, MAX_MESSAGE_SIZE).expect("decode should succeed");

        prop_assert_eq!(
            FrameType::from_u8(decoded.header.frame_type()),
            Some(frame_type),
            "Frame type not preserved"
        );
    });
}

#[test]
fn prop_frame_session_id_preserved() {
    proptest!(|(session_id in any::<u32>(), sequence_number in any::<u64>())| {
        let payload = Payload::TerminalOutput(TerminalOutputData {
            session_id,
            data: vec![42u8; 16],
            sequence_number,
            compressed: false,
            is_replay: false,
        });
        let frame = payload.into_frame(session_id).expect("should build frame");

        let mut buf = Vec::new();
        frame.encode(&mut buf, MAX_MESSAGE_SIZE).expect("encode should succeed");

        let decoded = Frame::decode(&buf, MAX_MESSAGE_SIZE).expect("decode should succeed");
        prop_assert_eq!(decoded.header.session_id(), session_id, "Session id mismatch");

        let decoded_payload = Payload::from_frame(&decoded).expect("should parse payload");
        prop_assert_eq!(decoded_payload, Payload::TerminalOutput(TerminalOutputData {
            session_id,
            data: vec![42u8; 16],
            sequence_number,
            compressed: false,
            is_replay: false,
        }));
    });
}

#[test]
fn prop_frame_encoded_size_correct() {
    proptest!(|(frame in arbitrary_frame())| {
        let mut buf = Vec::new();
        frame.encode(&mut buf, MAX_MESSAGE_SIZE).expect("encode should succeed");

        #[allow(clippy::arithmetic_side_effects)] // Test code: values bounded by property test
        let expected_size = FrameHeader::SIZE + frame.payload.len();
        prop_assert_eq!(
            buf.len(),
            expected_size,
            "Encoded size mismatch: expected {}, got {}",
            expected_size,
            buf.len()
        );
    });
}
