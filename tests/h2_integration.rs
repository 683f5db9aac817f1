//! HTTP/2 integration tests
//!
//! These tests verify header transport over the frame layer:
//! - Frame encoding and buffered decoding
//! - SETTINGS exchange feeding the HPACK tables
//! - CONTINUATION fragmentation and reassembly
//! - Connection-level error handling
//! - Independent connections on parallel threads

use bytes::Bytes;
use h2pack::h2::error::{Error, ErrorCode};
use h2pack::h2::frames::*;
use h2pack::h2::*;
use h2pack::hpack::{HeaderField, HpackError};

/// Encode frames, push them through a byte-level codec in small slices and
/// collect the decoded frames.
fn over_the_wire(frames: &[Frame], chunk: usize) -> Vec<Frame> {
    let mut wire = Vec::new();
    for frame in frames {
        wire.extend_from_slice(&FrameCodec::encode_frame(frame));
    }

    let mut codec = FrameCodec::new();
    let mut received = Vec::new();
    for piece in wire.chunks(chunk) {
        codec.feed(piece);
        while let Some(frame) = codec.next_frame().unwrap() {
            received.push(frame);
        }
    }
    assert_eq!(codec.buffered(), 0);
    received
}

fn request(path: &str) -> Vec<HeaderField> {
    vec![
        HeaderField::new(":method", "GET"),
        HeaderField::new(":scheme", "https"),
        HeaderField::new(":path", path.to_string()),
        HeaderField::new(":authority", "example.org"),
        HeaderField::new("user-agent", "h2pack/0.1"),
        HeaderField::never_indexed("cookie", "session=4f2a"),
    ]
}

#[test]
fn test_settings_frame_encoding() {
    let settings = SettingsBuilder::new()
        .header_table_size(8192)
        .enable_push(false)
        .max_concurrent_streams(100)
        .initial_window_size(65535)
        .max_frame_size(16384)
        .max_header_list_size(8192)
        .build()
        .unwrap();

    let encoded = FrameCodec::encode_frame(&Frame::from(SettingsFrame::new(settings)));

    assert_eq!(encoded[3], FrameType::Settings.as_u8());
    assert_eq!(&encoded[5..9], &[0, 0, 0, 0]); // Stream ID must be 0
    assert_eq!(encoded[4], 0); // No flags for non-ACK settings

    // 6 settings * 6 bytes
    let length = u32::from_be_bytes([0, encoded[0], encoded[1], encoded[2]]);
    assert_eq!(length, 36);
}

#[test]
fn test_settings_ack_frame() {
    let encoded = FrameCodec::encode_frame(&Frame::from(SettingsFrame::ack()));

    let length = u32::from_be_bytes([0, encoded[0], encoded[1], encoded[2]]);
    assert_eq!(length, 0);
    assert_eq!(encoded[4] & FrameFlags::ACK, FrameFlags::ACK);
}

#[test]
fn test_settings_identifiers_on_the_wire() {
    let settings = SettingsBuilder::new()
        .header_table_size(1)
        .enable_push(true)
        .build()
        .unwrap();
    let encoded = FrameCodec::encode_frame(&Frame::from(SettingsFrame::new(settings)));

    assert_eq!(
        &encoded[9..],
        &[0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x00, 0x02, 0x00, 0x00, 0x00, 0x01]
    );
}

#[test]
fn test_mixed_frames_byte_by_byte() {
    let frames = vec![
        Frame::from(SettingsFrame::new(Settings::default_settings())),
        Frame::from(SettingsFrame::ack()),
        Frame::from(HeadersFrame::new(1, Bytes::from_static(&[0x82, 0x84]), false, true)),
        Frame::from(DataFrame::new(1, Bytes::from("Hello World"), true).with_padding(4)),
        Frame::from(WindowUpdateFrame::new(0, 65535)),
        Frame::from(PingFrame::new(*b"h2pack!!")),
        Frame::from(GoawayFrame::new(1, ErrorCode::NoError, Bytes::new())),
    ];

    assert_eq!(over_the_wire(&frames, 1), frames);
    assert_eq!(over_the_wire(&frames, 7), frames);
}

#[test]
fn test_server_reads_preface_before_frames() {
    let mut wire = CONNECTION_PREFACE.to_vec();
    wire.extend_from_slice(&FrameCodec::encode_frame(&Frame::from(SettingsFrame::new(
        Settings::default_settings(),
    ))));

    let mut server = FrameCodec::new();
    let mut preface_seen = false;
    let mut frames = Vec::new();
    for piece in wire.chunks(5) {
        server.feed(piece);
        if !preface_seen {
            preface_seen = server.read_preface().unwrap();
            if !preface_seen {
                continue;
            }
        }
        while let Some(frame) = server.next_frame().unwrap() {
            frames.push(frame);
        }
    }

    assert!(preface_seen);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].frame_type(), Some(FrameType::Settings));
}

#[test]
fn test_continuation_flood_is_cut_off() {
    let mut server = ConnectionCodecBuilder::new().max_header_list_size(1024).build().unwrap();
    server.receive_frame(&Frame::from(SettingsFrame::ack())).unwrap();

    let mut wire = FrameCodec::encode_frame(&Frame::from(HeadersFrame::new(
        1,
        Bytes::from_static(&[0x82]),
        true,
        false,
    )))
    .to_vec();
    for _ in 0..200 {
        let chunk = Bytes::from(vec![0u8; 16384]);
        wire.extend_from_slice(&FrameCodec::encode_frame(&Frame::from(ContinuationFrame::new(1, chunk, false))));
    }

    let mut codec = FrameCodec::new();
    codec.feed(&wire);
    let mut accepted = 0;
    let err = loop {
        let frame = codec.next_frame().unwrap().unwrap();
        match server.receive_frame(&frame) {
            Ok(_) => accepted += 1,
            Err(err) => break err,
        }
    };

    assert_eq!(accepted, 1);
    assert_eq!(err.code(), ErrorCode::EnhanceYourCalm);
    assert!(server.is_poisoned());
}

#[test]
fn test_request_response_exchange() {
    let mut client = ConnectionCodecBuilder::new().build().unwrap();
    let mut server = ConnectionCodecBuilder::new().build().unwrap();

    // settings exchange
    let client_settings = Frame::from(SettingsFrame::new(client.local_settings().clone()));
    let server_settings = Frame::from(SettingsFrame::new(server.local_settings().clone()));
    assert!(server.receive_frame(&client_settings).unwrap().is_none());
    assert!(client.receive_frame(&server_settings).unwrap().is_none());
    assert!(client.receive_frame(&Frame::from(SettingsFrame::ack())).unwrap().is_none());
    assert!(server.receive_frame(&Frame::from(SettingsFrame::ack())).unwrap().is_none());

    for (i, path) in ["/", "/style.css", "/app.js"].iter().enumerate() {
        let stream_id = 1 + 2 * i as u32;

        let frames = client.encode_headers(stream_id, &request(path), true).unwrap();
        let received: Vec<_> = over_the_wire(&frames, 5)
            .iter()
            .filter_map(|frame| server.receive_frame(frame).unwrap())
            .collect();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].stream_id, stream_id);
        assert_eq!(received[0].fields, request(path));
        assert!(received[0].fields[5].is_sensitive());

        let response = vec![
            HeaderField::new(":status", "200"),
            HeaderField::new("content-type", "text/html"),
        ];
        let frames = server.encode_headers(stream_id, &response, false).unwrap();
        let received: Vec<_> = frames
            .iter()
            .filter_map(|frame| client.receive_frame(frame).unwrap())
            .collect();
        assert_eq!(received[0].fields, response);
    }

    // each direction's tables advanced in lockstep
    assert_eq!(client.encoder().table().size(), server.decoder().table().size());
    assert_eq!(server.encoder().table().size(), client.decoder().table().size());
}

#[test]
fn test_continuation_over_the_wire() {
    let mut client = ConnectionCodec::new();
    let mut server = ConnectionCodec::new();

    let mut fields = request("/upload");
    for i in 0..300 {
        fields.push(HeaderField::not_indexed(
            format!("x-custom-{}", i),
            format!("{:0>120}", i),
        ));
    }

    let frames = client.encode_headers(1, &fields, false).unwrap();
    assert!(frames.len() > 1);
    for frame in &frames {
        let len = FrameCodec::encode_frame(frame).len() - 9;
        assert!(len <= client.remote_max_frame_size());
    }
    assert!(frames.last().unwrap().flags().is_end_headers());

    let decoded: Vec<_> = over_the_wire(&frames, 1000)
        .iter()
        .filter_map(|frame| server.receive_frame(frame).unwrap())
        .collect();
    assert_eq!(decoded.len(), 1);
    assert_eq!(decoded[0].fields, fields);
}

#[test]
fn test_larger_peer_frame_size_means_fewer_frames() {
    let big = vec![HeaderField::not_indexed("x-blob", "z".repeat(50_000))];

    let mut small = ConnectionCodec::new();
    let default_frames = small.encode_headers(1, &big, true).unwrap().len();

    let mut large = ConnectionCodec::new();
    let settings = SettingsBuilder::new().max_frame_size(1 << 20).build().unwrap();
    large.apply_remote_settings(&settings).unwrap();
    assert_eq!(large.encode_headers(1, &big, true).unwrap().len(), 1);
    assert!(default_frames > 1);
}

#[test]
fn test_interleaved_frame_during_header_block() {
    let mut client = ConnectionCodec::new();
    let mut server = ConnectionCodec::new();

    let fields = vec![HeaderField::not_indexed("x-blob", "q".repeat(40_000))];
    let frames = client.encode_headers(1, &fields, true).unwrap();
    assert!(frames.len() > 1);

    server.receive_frame(&frames[0]).unwrap();
    let err = server
        .receive_frame(&Frame::from(DataFrame::new(1, Bytes::from("x"), false)))
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::ProtocolError);
    assert!(server.is_poisoned());
}

#[test]
fn test_corrupt_header_block_is_connection_error() {
    let mut server = ConnectionCodec::new();

    // literal with a 10-byte value of which 2 arrive
    let block = Bytes::from_static(&[0x82, 0x44, 0x0a, b'/', b'x']);
    let frame = Frame::from(HeadersFrame::new(1, block, true, true));

    let err = server.receive_frame(&frame).unwrap_err();
    assert!(matches!(err, Error::Compression(HpackError::TruncatedInput)));
    assert_eq!(err.code(), ErrorCode::CompressionError);

    let next = Frame::from(HeadersFrame::new(3, Bytes::from_static(&[0x82]), true, true));
    assert!(server.receive_frame(&next).is_err());
}

#[test]
fn test_oversized_frame_from_peer() {
    let mut codec = FrameCodec::with_max_frame_size(16384);
    let header = FrameCodec::encode_header(FrameType::Headers, FrameFlags::empty(), 1, 20000);
    codec.feed(&header);

    assert!(matches!(codec.next_frame(), Err(Error::FrameSize(_))));
}

#[test]
fn test_independent_connections_in_parallel() {
    std::thread::scope(|scope| {
        for worker in 0..4u32 {
            scope.spawn(move || {
                let mut client = ConnectionCodec::new();
                let mut server = ConnectionCodec::new();

                for n in 0..50u32 {
                    let path = format!("/worker/{}/item/{}", worker, n % 7);
                    let fields = request(&path);
                    let stream_id = 1 + 2 * n;

                    let frames = client.encode_headers(stream_id, &fields, true).unwrap();
                    let decoded: Vec<_> = frames
                        .iter()
                        .filter_map(|frame| server.receive_frame(frame).unwrap())
                        .collect();
                    assert_eq!(decoded[0].fields, fields);
                }
                assert_eq!(client.encoder().table().size(), server.decoder().table().size());
            });
        }
    });
}
