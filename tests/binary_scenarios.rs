// Container-level scenarios: literal byte vectors for the legacy writer,
// plus hand-assembled V1/V2/V4/V5 payloads covering each compression method
// and lane layout.

use keyvalues3::binary::types::BLOB_SENTINEL;
use keyvalues3::{
    decode_binary, BinaryMagic, Error, Flag, Kind, Kv3File, LegacyWriter, Object, Specifier,
    TypedArray, Value, ENCODING_BINARY_UNCOMPRESSED, FORMAT_GENERIC,
};

// ─────────────────────────────────────────────────────────────────────────────
// Legacy writer byte vectors
// ─────────────────────────────────────────────────────────────────────────────

const ENC_UNCOMPRESSED: [u8; 16] = [
    0x00, 0x05, 0x86, 0x1B, 0xD8, 0xF7, 0xC1, 0x40, 0xAD, 0x82, 0x75, 0xA4, 0x82, 0x67, 0xE7,
    0x14,
];
const FMT_GENERIC: [u8; 16] = [
    0x7C, 0x16, 0x12, 0x74, 0xE9, 0x06, 0x98, 0x46, 0xAF, 0xF2, 0xE6, 0x3E, 0xB5, 0x90, 0x37,
    0xE7,
];

/// Empty null document, byte for byte.
#[test]
fn legacy_null_document_bytes() {
    let bytes = LegacyWriter::new(FORMAT_GENERIC).encode(&Value::Null).unwrap();
    let mut expected = Vec::new();
    expected.extend_from_slice(b"VKV\x03");
    expected.extend_from_slice(&ENC_UNCOMPRESSED);
    expected.extend_from_slice(&FMT_GENERIC);
    expected.extend_from_slice(&[0x00, 0x00, 0x00, 0x00, 0x01, 0xFF, 0xFF, 0xFF, 0xFF]);
    assert_eq!(bytes, expected);
}

/// Single-pair object `{"A": 1}`: object kind, count, key index, Int64One.
#[test]
fn legacy_single_pair_object_bytes() {
    let mut map = Object::new();
    map.insert("A".into(), Value::Int64(1));
    let bytes = LegacyWriter::new(FORMAT_GENERIC)
        .encode(&Value::Object(map))
        .unwrap();
    let mut expected = Vec::new();
    expected.extend_from_slice(b"VKV\x03");
    expected.extend_from_slice(&ENC_UNCOMPRESSED);
    expected.extend_from_slice(&FMT_GENERIC);
    expected.extend_from_slice(&[0x01, 0x00, 0x00, 0x00]);
    expected.extend_from_slice(b"A\x00");
    expected.extend_from_slice(&[0x09, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10]);
    expected.extend_from_slice(&[0xFF, 0xFF, 0xFF, 0xFF]);
    assert_eq!(bytes, expected);
}

/// LZ4 wrapper round trip through the legacy reader.
#[test]
fn legacy_lz4_round_trip() {
    let mut map = Object::new();
    map.insert("stringValue".into(), Value::from("hello world"));
    let value = Value::Object(map);
    let bytes = LegacyWriter::new(FORMAT_GENERIC).encode_lz4(&value).unwrap();
    let decoded = decode_binary(&bytes).unwrap();
    assert_eq!(decoded.value, value);
    assert_eq!(decoded.magic, BinaryMagic::Legacy);
}

/// Unknown magic is `InvalidMagic`, and the file-level reader falls through
/// to text on exactly that error.
#[test]
fn magic_fallback() {
    let err = decode_binary(b"VDF3....").unwrap_err();
    assert!(matches!(err, Error::InvalidMagic(m) if &m == b"VDF3"));

    // The same bytes as a file-level read report both failures.
    assert!(matches!(
        Kv3File::from_bytes(b"VDF3...."),
        Err(Error::NotKv3 { .. })
    ));

    // Valid text with a binary-looking extension decodes via fallback.
    let text = "<!-- kv3 encoding:text:version{e21c7f3c-8a33-41c5-9977-a76d3a32aa0d} \
                format:generic:version{7412167c-06e9-4698-aff2-e63eb59037e7} -->\n{ a = 1 }\n";
    let file = Kv3File::from_bytes(text.as_bytes()).unwrap();
    assert_eq!(file.value.as_object().unwrap()["a"], Value::Int64(1));
}

/// Every writer magic classifies back to its own generation.
#[test]
fn magic_round_trip() {
    let bytes = LegacyWriter::new(FORMAT_GENERIC).encode(&Value::Null).unwrap();
    assert_eq!(decode_binary(&bytes).unwrap().magic, BinaryMagic::Legacy);
    let bytes = LegacyWriter::new(FORMAT_GENERIC)
        .encode_lz4(&Value::Null)
        .unwrap();
    assert_eq!(decode_binary(&bytes).unwrap().magic, BinaryMagic::Legacy);
}

/// Decoded legacy documents retain the wire encoding.
#[test]
fn legacy_encoding_is_retained() {
    let bytes = LegacyWriter::new(FORMAT_GENERIC).encode(&Value::Null).unwrap();
    let file = Kv3File::from_bytes(&bytes).unwrap();
    assert_eq!(file.original_encoding, Some(ENCODING_BINARY_UNCOMPRESSED));
    assert_eq!(file.format, FORMAT_GENERIC);
}

// ─────────────────────────────────────────────────────────────────────────────
// V1
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn v1_lz4_document() {
    // {"a": 1000}, LZ4-compressed.
    let mut ints = Vec::new();
    ints.extend_from_slice(&1u32.to_le_bytes()); // one string
    ints.extend_from_slice(&1u32.to_le_bytes()); // one member
    ints.extend_from_slice(&0i32.to_le_bytes()); // "a"
    let mut payload = Vec::new();
    payload.extend_from_slice(&ints);
    payload.extend_from_slice(&[0u8; 4]); // pad 12 → 16 for the double lane
    payload.extend_from_slice(&1000i64.to_le_bytes());
    payload.extend_from_slice(b"a\x00");
    payload.extend_from_slice(&[9u8, 3]); // Object, Int64

    let mut data = Vec::new();
    data.extend_from_slice(b"\x013VK");
    data.extend_from_slice(&FMT_GENERIC);
    data.extend_from_slice(&1u32.to_le_bytes()); // LZ4
    data.extend_from_slice(&0u32.to_le_bytes()); // byte count
    data.extend_from_slice(&3u32.to_le_bytes()); // int count
    data.extend_from_slice(&1u32.to_le_bytes()); // double count
    data.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    data.extend_from_slice(&lz4_flex::block::compress(&payload));

    let decoded = decode_binary(&data).unwrap();
    assert_eq!(decoded.magic, BinaryMagic::V1);
    let map = decoded.value.as_object().unwrap();
    assert_eq!(map["a"], Value::Int64(1000));
}

// ─────────────────────────────────────────────────────────────────────────────
// V2 — blob side-channel under all three compression methods
// ─────────────────────────────────────────────────────────────────────────────

const BLOB_A: &[u8] = &[1, 2, 3];
const BLOB_B: &[u8] = &[4, 5];

/// `{"s": "hello", "b1": #[010203], "b2": #[0405]}`:
/// the main payload (lanes, string/types slice, size list, sentinel),
/// without the blob stream.
fn v2_main_payload() -> Vec<u8> {
    let mut ints = Vec::new();
    ints.extend_from_slice(&4u32.to_le_bytes()); // string count
    ints.extend_from_slice(&3u32.to_le_bytes()); // member count
    ints.extend_from_slice(&0i32.to_le_bytes()); // "s"
    ints.extend_from_slice(&1i32.to_le_bytes()); // "hello"
    ints.extend_from_slice(&2i32.to_le_bytes()); // "b1"
    ints.extend_from_slice(&3i32.to_le_bytes()); // "b2"

    let mut payload = Vec::new();
    payload.extend_from_slice(&ints); // 24 bytes, 8-aligned
    payload.extend_from_slice(b"s\x00hello\x00b1\x00b2\x00"); // 14 bytes
    payload.extend_from_slice(&[9u8, 6, 7, 7]); // Object, String, Blob, Blob
    payload.extend_from_slice(&(BLOB_A.len() as u32).to_le_bytes());
    payload.extend_from_slice(&(BLOB_B.len() as u32).to_le_bytes());
    payload.extend_from_slice(&BLOB_SENTINEL.to_le_bytes());
    payload
}

const V2_STRINGS_TYPES_SIZE: u32 = 14 + 4;
const V2_MAIN_SIZE: u32 = 24 + 14 + 4 + 8 + 4; // lanes + strings/types + size list + sentinel

fn v2_header(
    magic: &[u8; 4],
    method: u32,
    frame_size: u16,
    uncompressed_size: u32,
    compressed_size: u32,
) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(magic);
    data.extend_from_slice(&FMT_GENERIC);
    data.extend_from_slice(&method.to_le_bytes());
    data.extend_from_slice(&0u16.to_le_bytes()); // dictionary id
    data.extend_from_slice(&frame_size.to_le_bytes());
    data.extend_from_slice(&0u32.to_le_bytes()); // byte count
    data.extend_from_slice(&6u32.to_le_bytes()); // int count
    data.extend_from_slice(&0u32.to_le_bytes()); // double count
    data.extend_from_slice(&V2_STRINGS_TYPES_SIZE.to_le_bytes());
    data.extend_from_slice(&1u16.to_le_bytes()); // object count
    data.extend_from_slice(&0u16.to_le_bytes()); // array count
    data.extend_from_slice(&uncompressed_size.to_le_bytes());
    data.extend_from_slice(&compressed_size.to_le_bytes());
    data.extend_from_slice(&2u32.to_le_bytes()); // block count
    data.extend_from_slice(&((BLOB_A.len() + BLOB_B.len()) as u32).to_le_bytes());
    data
}

fn check_v2_value(value: &Value) {
    let map = value.as_object().unwrap();
    assert_eq!(map["s"], Value::from("hello"));
    assert_eq!(map["b1"], Value::Blob(BLOB_A.to_vec()));
    assert_eq!(map["b2"], Value::Blob(BLOB_B.to_vec()));
}

#[test]
fn v2_uncompressed_with_blobs() {
    let mut payload = v2_main_payload();
    payload.extend_from_slice(BLOB_A); // method 0 carries blobs inline
    payload.extend_from_slice(BLOB_B);
    let mut data = v2_header(b"\x023VK", 0, 0, V2_MAIN_SIZE, payload.len() as u32);
    data.extend_from_slice(&payload);

    let decoded = decode_binary(&data).unwrap();
    assert_eq!(decoded.magic, BinaryMagic::V2);
    check_v2_value(&decoded.value);
}

#[test]
fn v2_zstd_with_blob_tail() {
    // One ZSTD stream covering the main payload and the blob bytes.
    let mut plain = v2_main_payload();
    plain.extend_from_slice(BLOB_A);
    plain.extend_from_slice(BLOB_B);
    let compressed = zstd::stream::encode_all(&plain[..], 0).unwrap();

    let mut data = v2_header(b"\x023VK", 2, 0, V2_MAIN_SIZE, compressed.len() as u32);
    data.extend_from_slice(&compressed);

    let decoded = decode_binary(&data).unwrap();
    check_v2_value(&decoded.value);
}

#[test]
fn v2_lz4_with_chained_blob_frames() {
    // Main payload LZ4-compressed; its tail lists the per-frame compressed
    // sizes.  The frames themselves follow in the outer stream, one chain
    // segment per blob.
    let frame_a = lz4_flex::block::compress(BLOB_A);
    let frame_b = lz4_flex::block::compress_with_dict(BLOB_B, BLOB_A);

    let mut main = v2_main_payload();
    main.extend_from_slice(&(frame_a.len() as u16).to_le_bytes());
    main.extend_from_slice(&(frame_b.len() as u16).to_le_bytes());
    let compressed_main = lz4_flex::block::compress(&main);

    let mut data = v2_header(
        b"\x023VK",
        1,
        16384,
        main.len() as u32,
        compressed_main.len() as u32,
    );
    data.extend_from_slice(&compressed_main);
    data.extend_from_slice(&frame_a);
    data.extend_from_slice(&frame_b);

    let decoded = decode_binary(&data).unwrap();
    check_v2_value(&decoded.value);
}

#[test]
fn v2_rejects_unknown_method() {
    let data = v2_header(b"\x023VK", 9, 0, 0, 0);
    assert!(matches!(
        decode_binary(&data),
        Err(Error::UnsupportedCompression { method: 9, .. })
    ));
}

#[test]
fn v2_rejects_bad_frame_size() {
    let mut payload = v2_main_payload();
    payload.extend_from_slice(BLOB_A);
    payload.extend_from_slice(BLOB_B);
    // Method 1 demands a 16384-byte chain frame.
    let data = v2_header(b"\x023VK", 1, 4096, V2_MAIN_SIZE, payload.len() as u32);
    assert!(matches!(
        decode_binary(&data),
        Err(Error::UnsupportedCompression { method: 1, .. })
    ));
}

#[test]
fn v2_rejects_missing_sentinel() {
    let mut payload = v2_main_payload();
    // Corrupt the sentinel word.
    let len = payload.len();
    payload[len - 4..].copy_from_slice(&0x11223344u32.to_le_bytes());
    payload.extend_from_slice(BLOB_A);
    payload.extend_from_slice(BLOB_B);
    let mut data = v2_header(b"\x023VK", 0, 0, V2_MAIN_SIZE, payload.len() as u32);
    data.extend_from_slice(&payload);
    assert!(matches!(
        decode_binary(&data),
        Err(Error::BadSentinel { expected, got, .. })
            if expected == BLOB_SENTINEL && got == 0x11223344
    ));
}

// ─────────────────────────────────────────────────────────────────────────────
// V4 — the 16-bit lane
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn v4_short_lane() {
    // {"i16": -2, "u16": 65535}
    let mut payload = Vec::new();
    payload.extend_from_slice(&(-2i16).to_le_bytes());
    payload.extend_from_slice(&65535u16.to_le_bytes());
    payload.extend_from_slice(&2u32.to_le_bytes()); // string count
    payload.extend_from_slice(&2u32.to_le_bytes()); // member count
    payload.extend_from_slice(&0i32.to_le_bytes()); // "i16"
    payload.extend_from_slice(&1i32.to_le_bytes()); // "u16"
    payload.extend_from_slice(&[0u8; 4]); // pad 20 → 24 for the double lane
    payload.extend_from_slice(b"i16\x00u16\x00");
    payload.extend_from_slice(&[9u8, 20, 21]); // Object, Int16, UInt16
    payload.extend_from_slice(&BLOB_SENTINEL.to_le_bytes());

    let mut data = Vec::new();
    data.extend_from_slice(b"\x043VK");
    data.extend_from_slice(&FMT_GENERIC);
    data.extend_from_slice(&0u32.to_le_bytes()); // uncompressed
    data.extend_from_slice(&0u16.to_le_bytes());
    data.extend_from_slice(&0u16.to_le_bytes());
    data.extend_from_slice(&0u32.to_le_bytes()); // byte count
    data.extend_from_slice(&4u32.to_le_bytes()); // int count
    data.extend_from_slice(&0u32.to_le_bytes()); // double count
    data.extend_from_slice(&11u32.to_le_bytes()); // strings+types size
    data.extend_from_slice(&1u16.to_le_bytes());
    data.extend_from_slice(&0u16.to_le_bytes());
    data.extend_from_slice(&(payload.len() as u32).to_le_bytes()); // uncompressed size
    data.extend_from_slice(&(payload.len() as u32).to_le_bytes()); // compressed size
    data.extend_from_slice(&0u32.to_le_bytes()); // block count
    data.extend_from_slice(&0u32.to_le_bytes()); // block total size
    data.extend_from_slice(&2u32.to_le_bytes()); // short count
    data.extend_from_slice(&0u32.to_le_bytes()); // compressed block sizes
    data.extend_from_slice(&payload);

    let decoded = decode_binary(&data).unwrap();
    assert_eq!(decoded.magic, BinaryMagic::V4);
    let map = decoded.value.as_object().unwrap();
    assert_eq!(map["i16"], Value::Int16(-2));
    assert_eq!(map["u16"], Value::UInt16(65535));
}

// ─────────────────────────────────────────────────────────────────────────────
// V5 — dual lane groups
// ─────────────────────────────────────────────────────────────────────────────

/// `{"name": "kv3", "pair": byte-length-2 typed array of doubles, "n": 9}`.
fn v5_document(types: &[u8]) -> Vec<u8> {
    // Group 0: strings in the byte lane, the string count in the int lane,
    // the typed-array payload in the double lane.
    let mut buffer0 = Vec::new();
    buffer0.extend_from_slice(b"name\x00kv3\x00pair\x00n\x00"); // 16 bytes
    buffer0.extend_from_slice(&4u32.to_le_bytes()); // string count
    buffer0.extend_from_slice(&[0u8; 4]); // pad 20 → 24
    buffer0.extend_from_slice(&1.5f64.to_le_bytes());
    buffer0.extend_from_slice(&2.5f64.to_le_bytes());

    // Group 1: member-count lane, then its own lanes, types, sentinel.
    let mut buffer1 = Vec::new();
    buffer1.extend_from_slice(&3u32.to_le_bytes()); // root member count
    buffer1.push(2); // typed-array element count (byte lane)
    buffer1.extend_from_slice(&[0u8; 3]); // pad 5 → 8 for the int lane
    buffer1.extend_from_slice(&0i32.to_le_bytes()); // "name"
    buffer1.extend_from_slice(&1i32.to_le_bytes()); // "kv3"
    buffer1.extend_from_slice(&2i32.to_le_bytes()); // "pair"
    buffer1.extend_from_slice(&3i32.to_le_bytes()); // "n"
    buffer1.extend_from_slice(&9i64.to_le_bytes()); // double lane: Int64(9)
    let types_size = types.len() as u32;
    buffer1.extend_from_slice(types);
    buffer1.extend_from_slice(&BLOB_SENTINEL.to_le_bytes());

    let mut data = Vec::new();
    data.extend_from_slice(b"\x053VK");
    data.extend_from_slice(&FMT_GENERIC);
    data.extend_from_slice(&0u32.to_le_bytes()); // uncompressed
    data.extend_from_slice(&0u16.to_le_bytes()); // dict id
    data.extend_from_slice(&0u16.to_le_bytes()); // frame size
    data.extend_from_slice(&16u32.to_le_bytes()); // group-0 byte count
    data.extend_from_slice(&1u32.to_le_bytes()); // group-0 int count
    data.extend_from_slice(&2u32.to_le_bytes()); // group-0 double count
    data.extend_from_slice(&types_size.to_le_bytes());
    data.extend_from_slice(&1u16.to_le_bytes()); // object count
    data.extend_from_slice(&1u16.to_le_bytes()); // array count
    data.extend_from_slice(&((buffer0.len() + buffer1.len()) as u32).to_le_bytes());
    data.extend_from_slice(&((buffer0.len() + buffer1.len()) as u32).to_le_bytes());
    data.extend_from_slice(&0u32.to_le_bytes()); // block count
    data.extend_from_slice(&0u32.to_le_bytes()); // block total size
    data.extend_from_slice(&0u32.to_le_bytes()); // group-0 short count
    data.extend_from_slice(&0u32.to_le_bytes()); // compressed block sizes
    data.extend_from_slice(&(buffer0.len() as u32).to_le_bytes());
    data.extend_from_slice(&0u32.to_le_bytes()); // block0 compressed size
    data.extend_from_slice(&(buffer1.len() as u32).to_le_bytes());
    data.extend_from_slice(&0u32.to_le_bytes()); // block1 compressed size
    data.extend_from_slice(&1u32.to_le_bytes()); // group-1 byte count
    data.extend_from_slice(&0u32.to_le_bytes()); // group-1 short count
    data.extend_from_slice(&4u32.to_le_bytes()); // group-1 int count
    data.extend_from_slice(&1u32.to_le_bytes()); // group-1 double count
    data.extend_from_slice(&0u32.to_le_bytes());
    data.extend_from_slice(&1u32.to_le_bytes()); // v5 object count
    data.extend_from_slice(&0u32.to_le_bytes());
    data.extend_from_slice(&0u32.to_le_bytes());
    data.extend_from_slice(&buffer0);
    data.extend_from_slice(&buffer1);
    data
}

const V5_TYPES: &[u8] = &[9, 6, 25, 5, 3]; // Object, String, ByteLen2, Double, Int64

#[test]
fn v5_dual_lane_groups() {
    let decoded = decode_binary(&v5_document(V5_TYPES)).unwrap();
    assert_eq!(decoded.magic, BinaryMagic::V5);
    let map = decoded.value.as_object().unwrap();
    assert_eq!(map["name"], Value::from("kv3"));
    assert_eq!(map["n"], Value::Int64(9));
    assert_eq!(
        map["pair"],
        Value::TypedArray(TypedArray {
            elem_kind: Kind::Double,
            elem_specifier: Specifier::Unspecified,
            items: vec![Value::Double(1.5), Value::Double(2.5)],
        })
    );
}

#[test]
fn v5_dense_specifier_wraps_value() {
    // Flag the "kv3" string as a resource: String type byte with the sign
    // bit, followed by the dense specifier byte.
    let types = &[9u8, 6 | 0x80, 1, 25, 5, 3];
    let decoded = decode_binary(&v5_document(types)).unwrap();
    let map = decoded.value.as_object().unwrap();
    assert_eq!(map["name"], Flag::RESOURCE.wrap("kv3"));
}

#[test]
fn v5_reserved_type_bit_is_rejected() {
    let types = &[9u8, 6 | 0x40, 25, 5, 3];
    assert!(matches!(
        decode_binary(&v5_document(types)),
        Err(Error::ReservedFlagSet(_))
    ));
}

#[test]
fn v5_unpersistable_specifier_is_rejected() {
    // Specifier byte 8 (Unspecified) must never be persisted.
    let types = &[9u8, 6 | 0x80, 8, 25, 5, 3];
    assert!(matches!(
        decode_binary(&v5_document(types)),
        Err(Error::InvalidSpecifier(8))
    ));
}

#[test]
fn v5_byte_length2_array_rejects_specifier() {
    // A flagged ArrayTypedByteLength2 type byte is invalid.
    let types = &[9u8, 6, 25 | 0x80, 1, 5, 3];
    assert!(matches!(
        decode_binary(&v5_document(types)),
        Err(Error::InvalidSpecifier(_))
    ));
}
