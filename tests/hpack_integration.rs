//! HPACK integration tests
//!
//! These tests drive the encoder and decoder through whole connections:
//! - RFC 7541 Appendix C.3 to C.6 request and response sequences
//! - Dynamic table contents after every block
//! - Never-indexed fields
//! - Fatal decode errors

use bytes::Bytes;
use h2pack::hpack::*;

/// Parse RFC-style hex dumps such as `"8286 8441"`
fn hex(s: &str) -> Vec<u8> {
    let digits: Vec<u8> = s.bytes().filter(|b| b.is_ascii_hexdigit()).collect();
    digits
        .chunks(2)
        .map(|pair| u8::from_str_radix(std::str::from_utf8(pair).unwrap(), 16).unwrap())
        .collect()
}

fn fields(list: &[(&'static str, &'static str)]) -> Vec<HeaderField> {
    list.iter().map(|&(name, value)| HeaderField::new(name, value)).collect()
}

fn snapshot(table: &DynamicTable) -> Vec<(String, String)> {
    table
        .entries()
        .map(|(name, value)| {
            (
                String::from_utf8_lossy(name).into_owned(),
                String::from_utf8_lossy(value).into_owned(),
            )
        })
        .collect()
}

fn entries(list: &[(&str, &str)]) -> Vec<(String, String)> {
    list.iter().map(|&(n, v)| (n.to_string(), v.to_string())).collect()
}

fn requests() -> Vec<Vec<HeaderField>> {
    vec![
        fields(&[
            (":method", "GET"),
            (":scheme", "http"),
            (":path", "/"),
            (":authority", "www.example.com"),
        ]),
        fields(&[
            (":method", "GET"),
            (":scheme", "http"),
            (":path", "/"),
            (":authority", "www.example.com"),
            ("cache-control", "no-cache"),
        ]),
        fields(&[
            (":method", "GET"),
            (":scheme", "https"),
            (":path", "/index.html"),
            (":authority", "www.example.com"),
            ("custom-key", "custom-value"),
        ]),
    ]
}

fn responses() -> Vec<Vec<HeaderField>> {
    vec![
        fields(&[
            (":status", "302"),
            ("cache-control", "private"),
            ("date", "Mon, 21 Oct 2013 20:13:21 GMT"),
            ("location", "https://www.example.com"),
        ]),
        fields(&[
            (":status", "307"),
            ("cache-control", "private"),
            ("date", "Mon, 21 Oct 2013 20:13:21 GMT"),
            ("location", "https://www.example.com"),
        ]),
        fields(&[
            (":status", "200"),
            ("cache-control", "private"),
            ("date", "Mon, 21 Oct 2013 20:13:22 GMT"),
            ("location", "https://www.example.com"),
            ("content-encoding", "gzip"),
            ("set-cookie", "foo=ASDJKHQKBZXOQWEOPIUAXQWEOIU; max-age=3600; version=1"),
        ]),
    ]
}

/// Encode and decode each list in turn, checking wire bytes and table sizes
fn run_sequence(
    mut encoder: Encoder,
    mut decoder: Decoder,
    lists: &[Vec<HeaderField>],
    expected_blocks: &[&str],
    expected_sizes: &[usize],
) -> (Encoder, Decoder) {
    for ((list, expected), size) in lists.iter().zip(expected_blocks).zip(expected_sizes) {
        let block = encoder.encode_block(list);
        assert_eq!(block.to_vec(), hex(expected), "encoding {:?}", list);

        let decoded = decoder.decode(&block).unwrap();
        assert_eq!(&decoded, list);

        assert_eq!(encoder.table().size(), *size);
        assert_eq!(decoder.table().size(), *size);
        assert_eq!(snapshot(encoder.table()), snapshot(decoder.table()));
    }
    (encoder, decoder)
}

#[test]
fn test_rfc_c3_requests_without_huffman() {
    let mut encoder = Encoder::new();
    encoder.set_huffman(Huffman::Never);

    let (encoder, _) = run_sequence(
        encoder,
        Decoder::new(),
        &requests(),
        &[
            "8286 8441 0f77 7777 2e65 7861 6d70 6c65 2e63 6f6d",
            "8286 84be 5808 6e6f 2d63 6163 6865",
            "8287 85bf 400a 6375 7374 6f6d 2d6b 6579 0c63 7573 746f 6d2d 7661 6c75 65",
        ],
        &[57, 110, 164],
    );

    assert_eq!(
        snapshot(encoder.table()),
        entries(&[
            ("custom-key", "custom-value"),
            ("cache-control", "no-cache"),
            (":authority", "www.example.com"),
        ])
    );
}

#[test]
fn test_rfc_c4_requests_with_huffman() {
    run_sequence(
        Encoder::new(),
        Decoder::new(),
        &requests(),
        &[
            "8286 8441 8cf1 e3c2 e5f2 3a6b a0ab 90f4 ff",
            "8286 84be 5886 a8eb 1064 9cbf",
            "8287 85bf 4088 25a8 49e9 5ba9 7d7f 8925 a849 e95b b8e8 b4bf",
        ],
        &[57, 110, 164],
    );
}

#[test]
fn test_rfc_c5_responses_without_huffman() {
    let mut encoder = Encoder::with_table_size(256);
    encoder.set_huffman(Huffman::Never);

    let (encoder, _) = run_sequence(
        encoder,
        Decoder::with_table_size(256),
        &responses(),
        &[
            "4803 3330 3258 0770 7269 7661 7465 611d
             4d6f 6e2c 2032 3120 4f63 7420 3230 3133
             2032 303a 3133 3a32 3120 474d 546e 1768
             7474 7073 3a2f 2f77 7777 2e65 7861 6d70
             6c65 2e63 6f6d",
            "4803 3330 37c1 c0bf",
            "88c1 611d 4d6f 6e2c 2032 3120 4f63 7420
             3230 3133 2032 303a 3133 3a32 3220 474d
             54c0 5a04 677a 6970 7738 666f 6f3d 4153
             444a 4b48 514b 425a 584f 5157 454f 5049
             5541 5851 5745 4f49 553b 206d 6178 2d61
             6765 3d33 3630 303b 2076 6572 7369 6f6e
             3d31",
        ],
        &[222, 222, 215],
    );

    assert_eq!(
        snapshot(encoder.table()),
        entries(&[
            ("set-cookie", "foo=ASDJKHQKBZXOQWEOPIUAXQWEOIU; max-age=3600; version=1"),
            ("content-encoding", "gzip"),
            ("date", "Mon, 21 Oct 2013 20:13:22 GMT"),
        ])
    );
}

#[test]
fn test_rfc_c6_responses_with_huffman() {
    run_sequence(
        Encoder::with_table_size(256),
        Decoder::with_table_size(256),
        &responses(),
        &[
            "4882 6402 5885 aec3 771a 4b61 96d0 7abe
             9410 54d4 44a8 2005 9504 0b81 66e0 82a6
             2d1b ff6e 919d 29ad 1718 63c7 8f0b 97c8
             e9ae 82ae 43d3",
            "4883 640e ffc1 c0bf",
            "88c1 6196 d07a be94 1054 d444 a820 0595
             040b 8166 e084 a62d 1bff c05a 839b d9ab
             77ad 94e7 821d d7f2 e6c7 b335 dfdf cd5b
             3960 d5af 2708 7f36 72c1 ab27 0fb5 291f
             9587 3160 65c0 03ed 4ee5 b106 3d50 07",
        ],
        &[222, 222, 215],
    );
}

#[test]
fn test_golden_vector_from_empty_tables() {
    let mut encoder = Encoder::new();
    encoder.set_huffman(Huffman::Never);

    let list = fields(&[(":method", "GET"), (":path", "/"), ("custom-key", "custom-value")]);
    let block = encoder.encode_block(&list);

    let mut expected = vec![0x82, 0x84, 0x40, 0x0a];
    expected.extend_from_slice(b"custom-key");
    expected.push(0x0c);
    expected.extend_from_slice(b"custom-value");
    assert_eq!(block.to_vec(), expected);

    let mut decoder = Decoder::new();
    assert_eq!(decoder.decode(&block).unwrap(), list);
}

#[test]
fn test_repeated_field_becomes_single_byte() {
    let mut encoder = Encoder::new();
    let mut decoder = Decoder::new();
    let list = fields(&[("x-request-id", "8f14e45f")]);

    let first = encoder.encode_block(&list);
    let second = encoder.encode_block(&list);
    assert!(first.len() > 1);
    assert_eq!(second.to_vec(), vec![0xbe]);

    assert_eq!(decoder.decode(&first).unwrap(), list);
    assert_eq!(decoder.decode(&second).unwrap(), list);
}

#[test]
fn test_never_indexed_stays_out_of_both_tables() {
    let mut encoder = Encoder::new();
    let mut decoder = Decoder::new();

    let list = vec![
        HeaderField::new(":method", "GET"),
        HeaderField::never_indexed("authorization", "Basic dXNlcjpwYXNz"),
        HeaderField::new("accept", "*/*"),
    ];

    for _ in 0..2 {
        let block = encoder.encode_block(&list);
        let decoded = decoder.decode(&block).unwrap();
        assert!(decoded[1].is_sensitive());
        assert_eq!(decoded, list);
    }

    for table in [encoder.table(), decoder.table()] {
        assert!(!table.contains(b"authorization", b"Basic dXNlcjpwYXNz"));
        assert_eq!(snapshot(table), entries(&[("accept", "*/*")]));
    }
}

#[test]
fn test_truncated_block_is_fatal() {
    let mut encoder = Encoder::new();
    let mut decoder = Decoder::new();

    let block = encoder.encode_block(&fields(&[("user-agent", "h2pack-integration")]));
    let cut = &block[..block.len() - 3];

    let err = decoder.decode(cut).unwrap_err();
    assert_eq!(err, HpackError::TruncatedInput);
    assert!(err.is_fatal());

    // the connection must not continue with this decoder
    assert_eq!(decoder.decode(&[0x82]), Err(HpackError::Desynchronized));
}

#[test]
fn test_table_size_change_between_blocks() {
    let mut encoder = Encoder::new();
    let mut decoder = Decoder::new();

    let list = fields(&[("x-trace", "a"), ("x-span", "b")]);
    decoder.decode(&encoder.encode_block(&list)).unwrap();
    assert_eq!(decoder.table().len(), 2);

    // peer lowers SETTINGS_HEADER_TABLE_SIZE to 64, room for one entry
    encoder.set_table_size_limit(64);
    decoder.set_table_size_limit(64);

    let block = encoder.encode_block(&list);
    assert_eq!(&block[..2], &[0x3f, 0x21]);
    assert_eq!(decoder.decode(&block).unwrap(), list);

    assert_eq!(encoder.table().max_size(), 64);
    assert_eq!(snapshot(encoder.table()), snapshot(decoder.table()));
    assert_eq!(snapshot(decoder.table()), entries(&[("x-span", "b")]));
}

#[test]
fn test_binary_values_survive() {
    let mut encoder = Encoder::new();
    let mut decoder = Decoder::new();

    let value: Bytes = (0u8..=255).collect::<Vec<u8>>().into();
    let list = vec![HeaderField::new("x-binary", value), HeaderField::new("x-utf8", "héllo wörld ✓")];

    let block = encoder.encode_block(&list);
    assert_eq!(decoder.decode(&block).unwrap(), list);
}
