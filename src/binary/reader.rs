//! Binary container decoding.
//!
//! The first four bytes select one of six container generations (§ layout
//! summary below); everything after that is generation-specific header
//! parsing, payload decompression, lane decomposition, and one shared
//! recursive value walk driven by the types lane.
//!
//! | magic        | payload shape                                            |
//! |--------------|----------------------------------------------------------|
//! | `VKV\x03`    | encoding UUID + format UUID, single shared stream        |
//! | `\x01 3VK`   | bucketed lanes, strings + types tail                     |
//! | `\x02 3VK`   | + string/types slice, blob side-channel, LZ4/ZSTD        |
//! | `\x03 3VK`   | V2 with the narrow (0x3F) type-byte mask                 |
//! | `\x04 3VK`   | + 16-bit lane                                            |
//! | `\x05 3VK`   | two independently compressed lane groups                 |

use std::borrow::Cow;

use log::{debug, trace};

use crate::binary::lanes::{BlobMode, DecodeState, LaneSet};
use crate::binary::types::{
    read_type_byte, BinaryMagic, Kind, Specifier, TypeByteShape, BLOB_SENTINEL, CHAIN_FRAME_SIZE,
    LEGACY_TERMINATOR,
};
use crate::buffer::LaneBuffer;
use crate::compress::{
    decompress_lz4_chain, legacy_block_decompress, lz4_decompress, zstd_decompress,
    zstd_decompress_bound,
};
use crate::error::{Error, Result};
use crate::header::{
    Encoding, Format, ENCODING_BINARY_BLOCK_COMPRESSED, ENCODING_BINARY_BLOCK_LZ4,
    ENCODING_BINARY_UNCOMPRESSED,
};
use crate::value::{Object, TypedArray, Value, MAX_DEPTH};

/// A successfully decoded binary document.
#[derive(Debug)]
pub struct Decoded {
    pub value: Value,
    pub format: Format,
    /// The wrapping observed on the wire.  Only the legacy container names
    /// its encoding explicitly; for V1–V5 the magic itself is the wrapping.
    pub encoding: Option<Encoding>,
    pub magic: BinaryMagic,
}

/// Decode a binary KV3 document.
///
/// Inputs shorter than four bytes, and four-byte prefixes that match no
/// known container, fail with [`Error::InvalidMagic`] — the one error a
/// file-level reader may treat as "try text instead".
pub fn decode(data: &[u8]) -> Result<Decoded> {
    if data.len() < 4 {
        let mut magic = [0u8; 4];
        magic[..data.len()].copy_from_slice(data);
        return Err(Error::InvalidMagic(magic));
    }
    let mut buf = LaneBuffer::new(data);
    let magic = BinaryMagic::detect(buf.read(4)?.try_into().unwrap())?;
    debug!("decoding {magic:?} KV3 container ({} bytes)", data.len());
    match magic {
        BinaryMagic::Legacy => read_legacy(&mut buf),
        BinaryMagic::V1 => read_v1(&mut buf),
        BinaryMagic::V2 => read_v234(&mut buf, BinaryMagic::V2),
        BinaryMagic::V3 => read_v234(&mut buf, BinaryMagic::V3),
        BinaryMagic::V4 => read_v234(&mut buf, BinaryMagic::V4),
        BinaryMagic::V5 => read_v5(&mut buf),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Legacy container
// ─────────────────────────────────────────────────────────────────────────────

fn read_legacy(buf: &mut LaneBuffer<'_>) -> Result<Decoded> {
    let encoding = Encoding::from_wire_bytes(buf.read(16)?.try_into().unwrap())?;
    let format = Format::from_wire_bytes(buf.read(16)?.try_into().unwrap());

    let payload: Cow<'_, [u8]> = if encoding == ENCODING_BINARY_UNCOMPRESSED {
        Cow::Borrowed(buf.read_rest())
    } else if encoding == ENCODING_BINARY_BLOCK_COMPRESSED {
        Cow::Owned(legacy_block_decompress(buf)?)
    } else if encoding == ENCODING_BINARY_BLOCK_LZ4 {
        let decompressed_size = buf.read_u32()? as usize;
        Cow::Owned(lz4_decompress(buf.read_rest(), decompressed_size)?)
    } else {
        return Err(Error::UnsupportedEncoding(encoding.uuid));
    };

    let mut stream = LaneBuffer::new(&payload);
    let string_count = stream.read_u32()?;
    let strings = read_string_table(&mut stream, string_count)?;
    trace!("legacy payload: {string_count} interned string(s)");

    // Every lane aliases the one stream.
    let mut state = DecodeState::shared(stream, strings);
    let value = read_value(&mut state, 0)?;

    // The root-value block is closed by a fixed terminator word.
    let stream = state.types_lane();
    let at = stream.tell();
    let trailer = stream.read_u32()?;
    if trailer != LEGACY_TERMINATOR {
        return Err(Error::BadSentinel {
            offset: at,
            expected: LEGACY_TERMINATOR,
            got: trailer,
        });
    }

    Ok(Decoded {
        value,
        format,
        encoding: Some(encoding),
        magic: BinaryMagic::Legacy,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// V1
// ─────────────────────────────────────────────────────────────────────────────

fn read_v1(buf: &mut LaneBuffer<'_>) -> Result<Decoded> {
    let format = Format::from_wire_bytes(buf.read(16)?.try_into().unwrap());

    let compression_method = buf.read_u32()?;
    let byte_count = buf.read_u32()? as usize;
    let int_count = buf.read_u32()? as usize;
    let double_count = buf.read_u32()? as usize;
    let uncompressed_size = buf.read_u32()? as usize;

    let payload: Cow<'_, [u8]> = match compression_method {
        0 => Cow::Borrowed(buf.read(uncompressed_size)?),
        1 => Cow::Owned(lz4_decompress(buf.read_rest(), uncompressed_size)?),
        method => {
            return Err(Error::UnsupportedCompression {
                method,
                context: "v1 payload header",
            })
        }
    };

    let mut data = LaneBuffer::new(&payload);
    let mut lanes = LaneSet::split(&mut data, byte_count, 0, int_count, double_count, true)?;

    let string_count = lanes.int.read_u32()?;
    let strings = read_string_table(&mut data, string_count)?;
    let types = LaneBuffer::new(data.read_rest());
    trace!(
        "v1 payload: {byte_count}B/{int_count}I/{double_count}D lanes, \
         {string_count} string(s), {} type byte(s)",
        types.size()
    );

    let mut state = DecodeState::split(lanes, types, TypeByteShape::Wide, strings);
    let value = read_value(&mut state, 0)?;
    finish(&mut state)?;

    Ok(Decoded {
        value,
        format,
        encoding: None,
        magic: BinaryMagic::V1,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// V2 / V3 / V4 — one layout, two type-byte masks, an optional short lane
// ─────────────────────────────────────────────────────────────────────────────

fn read_v234(buf: &mut LaneBuffer<'_>, magic: BinaryMagic) -> Result<Decoded> {
    let format = Format::from_wire_bytes(buf.read(16)?.try_into().unwrap());

    let compression_method = buf.read_u32()?;
    let compression_dict_id = buf.read_u16()?;
    let compression_frame_size = buf.read_u16()?;

    let byte_count = buf.read_u32()? as usize;
    let int_count = buf.read_u32()? as usize;
    let double_count = buf.read_u32()? as usize;

    let strings_types_size = buf.read_u32()? as usize;
    let _object_count = buf.read_u16()?;
    let _array_count = buf.read_u16()?;

    let uncompressed_size = buf.read_u32()? as usize;
    let compressed_size = buf.read_u32()? as usize;
    let block_count = buf.read_u32()? as usize;
    let block_total_size = buf.read_u32()? as usize;

    let short_count = if magic == BinaryMagic::V4 {
        let short_count = buf.read_u32()? as usize;
        let _compressed_block_size_count = buf.read_u32()? / 2;
        short_count
    } else {
        0
    };

    let payload = decompress_main(
        buf,
        compression_method,
        compression_dict_id,
        compression_frame_size,
        compressed_size,
        uncompressed_size,
        block_total_size,
        "versioned payload header",
    )?;

    let mut data = LaneBuffer::new(&payload);
    let mut lanes = LaneSet::split(
        &mut data,
        byte_count,
        short_count,
        int_count,
        double_count,
        true,
    )?;

    // The string table and the types lane share one declared slice: the
    // table's entry count lives in the int lane, the strings at the front
    // of the slice, the type bytes behind them.
    let mut types = data.slice(strings_types_size)?;
    let string_count = lanes.int.read_u32()?;
    let strings = read_string_table(&mut types, string_count)?;

    // Blob side-channel: an up-front size list closed by a sentinel.
    let block_sizes = read_block_sizes(&mut data, block_count)?;
    let blob_data: Vec<u8> = if block_count == 0 || block_total_size == 0 {
        Vec::new()
    } else {
        match compression_method {
            0 => {
                let mut blobs = Vec::with_capacity(block_total_size);
                for &size in &block_sizes {
                    blobs.extend_from_slice(data.read(size as usize)?);
                }
                blobs
            }
            1 => {
                // The per-frame compressed sizes are the tail of the main
                // payload; the frames themselves follow in the outer stream.
                let mut compressed_sizes = Vec::with_capacity(data.remaining() / 2);
                while data.remaining() >= 2 {
                    compressed_sizes.push(data.read_u16()?);
                }
                decompress_lz4_chain(buf, &block_sizes, &compressed_sizes, compression_frame_size)?
            }
            2 => {
                // ZSTD decompressed the main payload and the blob stream
                // together; the blobs are the tail.
                let tail = data.read_rest();
                if tail.len() != block_total_size {
                    return Err(Error::DecompressionFailure {
                        codec: "zstd",
                        detail: format!(
                            "blob stream is {} byte(s), header declared {block_total_size}",
                            tail.len()
                        ),
                    });
                }
                tail.to_vec()
            }
            method => {
                return Err(Error::UnsupportedCompression {
                    method,
                    context: "versioned blob stream",
                })
            }
        }
    };

    let shape = if magic == BinaryMagic::V2 {
        TypeByteShape::Wide
    } else {
        TypeByteShape::Narrow
    };
    let mut state = DecodeState::split(lanes, types, shape, strings)
        .with_blobs(block_sizes, LaneBuffer::new(&blob_data));
    let value = read_value(&mut state, 0)?;
    finish(&mut state)?;

    Ok(Decoded {
        value,
        format,
        encoding: None,
        magic,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// V5
// ─────────────────────────────────────────────────────────────────────────────

fn read_v5(buf: &mut LaneBuffer<'_>) -> Result<Decoded> {
    let format = Format::from_wire_bytes(buf.read(16)?.try_into().unwrap());

    let compression_method = buf.read_u32()?;
    let compression_dict_id = buf.read_u16()?;
    let compression_frame_size = buf.read_u16()?;

    let byte_count = buf.read_u32()? as usize;
    let int_count = buf.read_u32()? as usize;
    let double_count = buf.read_u32()? as usize;

    let types_size = buf.read_u32()? as usize;
    let _object_count = buf.read_u16()?;
    let _array_count = buf.read_u16()?;

    let _uncompressed_total_size = buf.read_u32()? as usize;
    let compressed_total_size = buf.read_u32()? as usize;
    let block_count = buf.read_u32()? as usize;
    let block_total_size = buf.read_u32()? as usize;
    let short_count = buf.read_u32()? as usize;
    let compressed_block_size_count = (buf.read_u32()? / 2) as usize;

    let buffer0_decompressed_size = buf.read_u32()? as usize;
    let block0_compressed_size = buf.read_u32()? as usize;
    let buffer1_decompressed_size = buf.read_u32()? as usize;
    let block1_compressed_size = buf.read_u32()? as usize;
    let byte_count2 = buf.read_u32()? as usize;
    let short_count2 = buf.read_u32()? as usize;
    let int_count2 = buf.read_u32()? as usize;
    let double_count2 = buf.read_u32()? as usize;
    let _field_54 = buf.read_u32()?;
    let object_count_v5 = buf.read_u32()? as usize;
    let _field_5c = buf.read_u32()?;
    let _field_60 = buf.read_u32()?;

    let (compressed0, compressed1) = if compression_method > 0 {
        (
            buf.read(block0_compressed_size)?,
            buf.read(block1_compressed_size)?,
        )
    } else {
        (
            buf.read(buffer0_decompressed_size)?,
            buf.read(buffer1_decompressed_size)?,
        )
    };

    let check_params = |context: &'static str| -> Result<()> {
        if compression_method == 1
            && (compression_dict_id != 0 || compression_frame_size != CHAIN_FRAME_SIZE)
        {
            return Err(Error::UnsupportedCompression {
                method: compression_method,
                context,
            });
        }
        if compression_method == 0 && (compression_dict_id != 0 || compression_frame_size != 0) {
            return Err(Error::UnsupportedCompression {
                method: compression_method,
                context,
            });
        }
        Ok(())
    };
    check_params("v5 payload header")?;

    let (buffer0, buffer1): (Cow<'_, [u8]>, Cow<'_, [u8]>) = match compression_method {
        0 => (Cow::Borrowed(compressed0), Cow::Borrowed(compressed1)),
        1 => (
            Cow::Owned(lz4_decompress(compressed0, buffer0_decompressed_size)?),
            Cow::Owned(lz4_decompress(compressed1, buffer1_decompressed_size)?),
        ),
        2 => {
            let b0 = zstd_decompress(compressed0)?;
            let b1 = zstd_decompress(compressed1)?;
            if b0.len() != buffer0_decompressed_size || b1.len() != buffer1_decompressed_size {
                return Err(Error::DecompressionFailure {
                    codec: "zstd",
                    detail: "lane-group stream size mismatch".into(),
                });
            }
            (Cow::Owned(b0), Cow::Owned(b1))
        }
        method => {
            return Err(Error::UnsupportedCompression {
                method,
                context: "v5 payload header",
            })
        }
    };

    let mut data0 = LaneBuffer::new(&buffer0);
    let mut group0 = LaneSet::split(
        &mut data0,
        byte_count,
        short_count,
        int_count,
        double_count,
        false,
    )?;

    // Strings live in group 0: the count at the front of its int lane, the
    // NUL-terminated bodies at the front of its byte lane.
    let string_count = group0.int.read_u32()?;
    let mut strings = Vec::with_capacity(string_count.min(4096) as usize);
    for _ in 0..string_count {
        strings.push(group0.byte.read_cstring()?);
    }

    let mut data1 = LaneBuffer::new(&buffer1);
    let member_counts = data1.slice(object_count_v5 * 4)?;
    let group1 = LaneSet::split(
        &mut data1,
        byte_count2,
        short_count2,
        int_count2,
        double_count2,
        false,
    )?;
    let types = data1.slice(types_size)?;
    trace!(
        "v5 payload: {} string(s), {object_count_v5} object(s), {} type byte(s)",
        strings.len(),
        types.size()
    );

    let block_sizes = read_block_sizes(&mut data1, block_count)?;
    let mut compressed_sizes = Vec::with_capacity(compressed_block_size_count);
    if block_count > 0 {
        for _ in 0..compressed_block_size_count {
            compressed_sizes.push(data1.read_u16()?);
        }
    }

    let blob_data: Vec<u8> = if block_count == 0 || block_total_size == 0 {
        Vec::new()
    } else {
        let blobs = match compression_method {
            0 => {
                let mut blobs = Vec::with_capacity(block_total_size);
                for &size in &block_sizes {
                    blobs.extend_from_slice(buf.read(size as usize)?);
                }
                blobs
            }
            1 => decompress_lz4_chain(buf, &block_sizes, &compressed_sizes, compression_frame_size)?,
            2 => {
                let compressed_len = compressed_total_size
                    .checked_sub(block0_compressed_size + block1_compressed_size)
                    .ok_or(Error::DecompressionFailure {
                        codec: "zstd",
                        detail: "v5 blob stream size underflow".into(),
                    })?;
                zstd_decompress_bound(buf.read(compressed_len)?, block_total_size)?
            }
            method => {
                return Err(Error::UnsupportedCompression {
                    method,
                    context: "v5 blob stream",
                })
            }
        };
        // The outer stream closes the blob data with its own sentinel.
        let at = buf.tell();
        let sentinel = buf.read_u32()?;
        if sentinel != BLOB_SENTINEL {
            return Err(Error::BadSentinel {
                offset: at,
                expected: BLOB_SENTINEL,
                got: sentinel,
            });
        }
        blobs
    };

    let mut state = DecodeState::dual(group0, group1, types, member_counts, strings)
        .with_blobs(block_sizes, LaneBuffer::new(&blob_data));
    let value = read_value(&mut state, 0)?;
    finish(&mut state)?;

    Ok(Decoded {
        value,
        format,
        encoding: None,
        magic: BinaryMagic::V5,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Shared header helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Decompress the main payload of a V2/V3/V4 container.
#[allow(clippy::too_many_arguments)]
fn decompress_main<'a>(
    buf: &mut LaneBuffer<'a>,
    method: u32,
    dict_id: u16,
    frame_size: u16,
    compressed_size: usize,
    uncompressed_size: usize,
    block_total_size: usize,
    context: &'static str,
) -> Result<Cow<'a, [u8]>> {
    match method {
        0 => {
            if dict_id != 0 || frame_size != 0 {
                return Err(Error::UnsupportedCompression { method, context });
            }
            Ok(Cow::Borrowed(buf.read(compressed_size)?))
        }
        1 => {
            if dict_id != 0 || frame_size != CHAIN_FRAME_SIZE {
                return Err(Error::UnsupportedCompression { method, context });
            }
            Ok(Cow::Owned(lz4_decompress(
                buf.read(compressed_size)?,
                uncompressed_size,
            )?))
        }
        2 => {
            // One ZSTD stream covers the main payload and the blob data.
            let out = zstd_decompress(buf.read(compressed_size)?)?;
            if out.len() != uncompressed_size + block_total_size {
                return Err(Error::DecompressionFailure {
                    codec: "zstd",
                    detail: format!(
                        "produced {} byte(s), expected {}",
                        out.len(),
                        uncompressed_size + block_total_size
                    ),
                });
            }
            Ok(Cow::Owned(out))
        }
        method => Err(Error::UnsupportedCompression { method, context }),
    }
}

fn read_string_table(src: &mut LaneBuffer<'_>, count: u32) -> Result<Vec<String>> {
    let mut strings = Vec::with_capacity(count.min(4096) as usize);
    for _ in 0..count {
        strings.push(src.read_cstring()?);
    }
    Ok(strings)
}

/// Read the blob-size list and its closing sentinel.
fn read_block_sizes(data: &mut LaneBuffer<'_>, block_count: usize) -> Result<Vec<u32>> {
    let mut sizes = Vec::with_capacity(block_count.min(4096));
    for _ in 0..block_count {
        sizes.push(data.read_u32()?);
    }
    let at = data.tell();
    let sentinel = data.read_u32()?;
    if sentinel != BLOB_SENTINEL {
        return Err(Error::BadSentinel {
            offset: at,
            expected: BLOB_SENTINEL,
            got: sentinel,
        });
    }
    Ok(sizes)
}

/// Post-decode exhaustion checks: the types lane, the blob-size queue and
/// the blob lane must all be fully consumed.
fn finish(state: &mut DecodeState<'_>) -> Result<()> {
    if !state.types_exhausted() {
        return Err(Error::TrailingData {
            lane: "types",
            remaining: state.types_lane().remaining(),
        });
    }
    if !state.blob_sizes.is_empty() {
        return Err(Error::TrailingData {
            lane: "blob-size list",
            remaining: state.blob_sizes.len(),
        });
    }
    if !state.blob.is_exhausted() {
        return Err(Error::TrailingData {
            lane: "blob",
            remaining: state.blob.remaining(),
        });
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Recursive value walk
// ─────────────────────────────────────────────────────────────────────────────

fn read_type(state: &mut DecodeState<'_>) -> Result<(Kind, Specifier)> {
    let shape = state.shape;
    let types = state.types_lane();
    read_type_byte(shape, || types.read_u8())
}

/// Read one complete value: a type byte, then its payload from the lane the
/// kind prescribes, recursing into containers.
fn read_value(state: &mut DecodeState<'_>, depth: usize) -> Result<Value> {
    if depth > MAX_DEPTH {
        return Err(Error::RecursionLimit(MAX_DEPTH));
    }
    let (kind, specifier) = read_type(state)?;
    let value = read_payload(state, kind, specifier, depth)?;
    Ok(Value::flagged(value, specifier.to_flag()))
}

fn read_payload(
    state: &mut DecodeState<'_>,
    kind: Kind,
    specifier: Specifier,
    depth: usize,
) -> Result<Value> {
    Ok(match kind {
        Kind::Null => Value::Null,
        Kind::Bool => Value::Bool(state.byte_lane().read_u8()? == 1),
        Kind::BoolTrue => Value::Bool(true),
        Kind::BoolFalse => Value::Bool(false),
        Kind::Int64 => Value::Int64(state.double_lane().read_i64()?),
        Kind::UInt64 => Value::UInt64(state.double_lane().read_u64()?),
        Kind::Int64Zero => Value::Int64(0),
        Kind::Int64One => Value::Int64(1),
        Kind::Double => Value::Double(state.double_lane().read_f64()?),
        Kind::DoubleZero => Value::Double(0.0),
        Kind::DoubleOne => Value::Double(1.0),
        Kind::Int32 => Value::Int32(state.int_lane().read_i32()?),
        Kind::UInt32 => Value::UInt32(state.int_lane().read_u32()?),
        Kind::Float => Value::Float(state.int_lane().read_f32()?),
        Kind::Int16 => Value::Int16(state.short_lane().read_i16()?),
        Kind::UInt16 => Value::UInt16(state.short_lane().read_u16()?),
        Kind::Int8 => Value::Int8(state.byte_lane().read_i8()?),
        Kind::UInt8 => Value::UInt8(state.byte_lane().read_u8()?),
        Kind::String => {
            let index = state.int_lane().read_i32()?;
            Value::String(state.string(index)?)
        }
        Kind::Blob => read_blob(state)?,
        Kind::Array => {
            let count = state.int_lane().read_i32()?;
            let count = usize::try_from(count)
                .map_err(|_| Error::InvalidValue(format!("negative array count {count}")))?;
            let mut items = Vec::with_capacity(count.min(4096));
            for _ in 0..count {
                items.push(read_value(state, depth + 1)?);
            }
            Value::Array(items)
        }
        Kind::Object => {
            let count = state.read_member_count()?;
            let mut map = Object::with_capacity((count as usize).min(4096));
            for _ in 0..count {
                let name_index = state.int_lane().read_i32()?;
                if name_index == -1 {
                    return Err(Error::InvalidValue(
                        "object member has no name (string index -1)".into(),
                    ));
                }
                let name = state.string(name_index)?;
                if name.is_empty() {
                    return Err(Error::InvalidValue("object member name is empty".into()));
                }
                let member = read_value(state, depth + 1)?;
                map.insert(name, member);
            }
            Value::Object(map)
        }
        Kind::TypedArray => {
            let count = state.int_lane().read_u32()? as usize;
            read_typed_array(state, count, depth)?
        }
        Kind::TypedArrayByteLen => {
            let count = state.byte_lane().read_u8()? as usize;
            read_typed_array(state, count, depth)?
        }
        Kind::TypedArrayByteLen2 => {
            // Elements come from lane group 0; the count does not.
            if specifier != Specifier::Unspecified {
                return Err(Error::InvalidSpecifier(specifier as u8));
            }
            let count = state.byte_lane().read_u8()? as usize;
            state.set_active_group(0);
            let result = read_typed_array(state, count, depth);
            state.set_active_group(1);
            result?
        }
    })
}

/// Homogeneous array: the element kind is declared once, then `count`
/// payloads follow with no further type bytes.  Constant kinds materialize
/// without consuming any payload; fixed-width kinds read densely from their
/// lane.
fn read_typed_array(state: &mut DecodeState<'_>, count: usize, depth: usize) -> Result<Value> {
    if depth >= MAX_DEPTH {
        return Err(Error::RecursionLimit(MAX_DEPTH));
    }
    let (elem_kind, elem_specifier) = read_type(state)?;
    let mut items = Vec::with_capacity(count.min(4096));
    match elem_kind {
        Kind::DoubleZero => items = vec![Value::Double(0.0); count],
        Kind::DoubleOne => items = vec![Value::Double(1.0); count],
        Kind::Int64Zero => items = vec![Value::Int64(0); count],
        Kind::Int64One => items = vec![Value::Int64(1); count],
        Kind::Double => {
            for _ in 0..count {
                items.push(Value::Double(state.double_lane().read_f64()?));
            }
        }
        Kind::Int64 => {
            for _ in 0..count {
                items.push(Value::Int64(state.double_lane().read_i64()?));
            }
        }
        Kind::UInt64 => {
            for _ in 0..count {
                items.push(Value::UInt64(state.double_lane().read_u64()?));
            }
        }
        Kind::Int32 => {
            for _ in 0..count {
                items.push(Value::Int32(state.int_lane().read_i32()?));
            }
        }
        Kind::UInt32 => {
            for _ in 0..count {
                items.push(Value::UInt32(state.int_lane().read_u32()?));
            }
        }
        other => {
            for _ in 0..count {
                items.push(read_payload(state, other, elem_specifier, depth + 1)?);
            }
        }
    }
    Ok(Value::TypedArray(TypedArray {
        elem_kind,
        elem_specifier,
        items,
    }))
}

fn read_blob(state: &mut DecodeState<'_>) -> Result<Value> {
    match state.blob_mode {
        BlobMode::Inline => {
            let length = state.int_lane().read_i32()?;
            let length = usize::try_from(length)
                .map_err(|_| Error::InvalidValue(format!("negative blob length {length}")))?;
            Ok(Value::Blob(state.byte_lane().read(length)?.to_vec()))
        }
        BlobMode::SideChannel => {
            let size = state.blob_sizes.pop_front().ok_or_else(|| {
                Error::InvalidValue("blob encountered after the size list ran out".into())
            })? as usize;
            if size == 0 {
                return Ok(Value::Blob(Vec::new()));
            }
            Ok(Value::Blob(state.blob.read(size)?.to_vec()))
        }
    }
}
