//! Decompression primitives shared by the binary readers.
//!
//! Three schemes appear across the container generations:
//! - single LZ4 blocks (legacy LZ4 encoding, V1+ compression method 1)
//! - ZSTD streams (V2+ compression method 2)
//! - chained LZ4 frames sharing a 64 KiB sliding dictionary (the V2+ blob
//!   side-channel), handled by [`Lz4ChainDecoder`]
//!
//! plus the legacy `binary-block-compressed` scheme: a 16-entry mask word
//! followed by literal bytes and 16-bit offset/length back-references.

use crate::buffer::LaneBuffer;
use crate::error::{Error, Result};

/// Sliding-dictionary span an LZ4 frame may reference.
const DICT_SIZE: usize = 64 * 1024;

// ─────────────────────────────────────────────────────────────────────────────
// One-shot wrappers
// ─────────────────────────────────────────────────────────────────────────────

/// Compress one raw LZ4 block.  The output carries no stored size; the
/// container records the decompressed size itself.
pub fn lz4_compress(src: &[u8]) -> Vec<u8> {
    lz4_flex::block::compress(src)
}

/// Decompress one raw LZ4 block into exactly `expected_size` bytes.
pub fn lz4_decompress(src: &[u8], expected_size: usize) -> Result<Vec<u8>> {
    let out = lz4_flex::block::decompress(src, expected_size).map_err(|e| {
        Error::DecompressionFailure {
            codec: "lz4",
            detail: e.to_string(),
        }
    })?;
    if out.len() != expected_size {
        return Err(Error::DecompressionFailure {
            codec: "lz4",
            detail: format!("produced {} bytes, expected {expected_size}", out.len()),
        });
    }
    Ok(out)
}

/// Decompress a complete ZSTD stream of unknown decompressed size.
pub fn zstd_decompress(src: &[u8]) -> Result<Vec<u8>> {
    zstd::stream::decode_all(src).map_err(|e| Error::DecompressionFailure {
        codec: "zstd",
        detail: e.to_string(),
    })
}

/// Decompress a ZSTD stream whose decompressed size is known up front.
pub fn zstd_decompress_bound(src: &[u8], expected_size: usize) -> Result<Vec<u8>> {
    let out = zstd::bulk::decompress(src, expected_size).map_err(|e| {
        Error::DecompressionFailure {
            codec: "zstd",
            detail: e.to_string(),
        }
    })?;
    if out.len() != expected_size {
        return Err(Error::DecompressionFailure {
            codec: "zstd",
            detail: format!("produced {} bytes, expected {expected_size}", out.len()),
        });
    }
    Ok(out)
}

// ─────────────────────────────────────────────────────────────────────────────
// Chained-frame decoder
// ─────────────────────────────────────────────────────────────────────────────

/// Stateful LZ4 block decoder in which every frame may back-reference up to
/// the previous 64 KiB of decompressed output.
///
/// Output accumulates in a flat buffer; once a frame would overrun it, only
/// the trailing dictionary span is kept and slid to the front.  The
/// dictionary is zeroed on construction, so no state leaks between decodes
/// that each build their own decoder.
pub struct Lz4ChainDecoder {
    buf: Vec<u8>,
    out_pos: usize,
    block_size: usize,
}

impl Lz4ChainDecoder {
    /// `block_size` is normalized up to a power of two and at least 1024;
    /// `extra_blocks` reserves room for additional in-flight frames.
    pub fn new(block_size: usize, extra_blocks: usize) -> Lz4ChainDecoder {
        let block_size = block_size.max(1024).next_power_of_two();
        let capacity = DICT_SIZE + (1 + extra_blocks) * block_size + 32;
        Lz4ChainDecoder {
            buf: vec![0u8; capacity],
            out_pos: 0,
            block_size,
        }
    }

    /// The normalized block size.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Slide the dictionary when the next frame would overrun the buffer.
    fn prepare(&mut self, frame_size: usize) {
        if self.out_pos + frame_size > self.buf.len() {
            let keep = self.out_pos.min(DICT_SIZE);
            self.buf.copy_within(self.out_pos - keep..self.out_pos, 0);
            self.out_pos = keep;
        }
    }

    /// Decompress one frame, using all prior output as the dictionary.
    /// Returns the number of bytes the frame produced (at most `max_out`).
    pub fn decompress(&mut self, src: &[u8], max_out: usize) -> Result<usize> {
        self.prepare(max_out);
        let (dict, rest) = self.buf.split_at_mut(self.out_pos);
        let produced = lz4_flex::block::decompress_into_with_dict(src, &mut rest[..max_out], dict)
            .map_err(|e| Error::DecompressionFailure {
                codec: "lz4-chain",
                detail: e.to_string(),
            })?;
        self.out_pos += produced;
        Ok(produced)
    }

    /// Copy `dst.len()` bytes ending at `out_pos + from_back_offset` into
    /// `dst`.  `from_back_offset` is zero or negative — draining never reads
    /// past the decoded frontier.
    pub fn drain(&self, dst: &mut [u8], from_back_offset: isize) -> Result<()> {
        let end = self.out_pos as isize + from_back_offset;
        let start = end - dst.len() as isize;
        if start < 0 || end as usize > self.out_pos {
            return Err(Error::DecompressionFailure {
                codec: "lz4-chain",
                detail: format!(
                    "drain of {} byte(s) at back-offset {from_back_offset} is out of range",
                    dst.len()
                ),
            });
        }
        dst.copy_from_slice(&self.buf[start as usize..end as usize]);
        Ok(())
    }

    /// Zero the dictionary and forget all decoded output.
    pub fn reset(&mut self) {
        self.buf.fill(0);
        self.out_pos = 0;
    }
}

/// Decode a V2+ blob stream: `block_sizes` decompressed bytes per blob,
/// produced by LZ4 frames of at most `frame_size` bytes whose compressed
/// lengths are `compressed_sizes`, read in order from `src`.
pub fn decompress_lz4_chain(
    src: &mut LaneBuffer<'_>,
    block_sizes: &[u32],
    compressed_sizes: &[u16],
    frame_size: u16,
) -> Result<Vec<u8>> {
    let frame_size = frame_size as usize;
    let mut chain = Lz4ChainDecoder::new(frame_size, 0);
    let mut sizes = compressed_sizes.iter().copied();
    let mut out = Vec::with_capacity(block_sizes.iter().map(|&n| n as usize).sum());

    for &block_size in block_sizes {
        let mut left = block_size as usize;
        while !src.is_exhausted() && left > 0 {
            let compressed = match sizes.next() {
                Some(n) => n as usize,
                None => {
                    return Err(Error::DecompressionFailure {
                        codec: "lz4-chain",
                        detail: "compressed-frame size list exhausted mid-block".into(),
                    })
                }
            };
            let frame = src.read(compressed)?;
            let produced = chain.decompress(frame, frame_size)?;
            let take = frame_size.min(left);
            if produced < take {
                return Err(Error::DecompressionFailure {
                    codec: "lz4-chain",
                    detail: format!("frame produced {produced} byte(s), block needs {take}"),
                });
            }
            let at = out.len();
            out.resize(at + take, 0);
            chain.drain(&mut out[at..], take as isize - produced as isize)?;
            left -= take;
        }
        if left > 0 {
            return Err(Error::DecompressionFailure {
                codec: "lz4-chain",
                detail: format!("stream ended with {left} byte(s) of a blob outstanding"),
            });
        }
    }
    Ok(out)
}

// ─────────────────────────────────────────────────────────────────────────────
// Legacy block-compressed encoding
// ─────────────────────────────────────────────────────────────────────────────

/// Decompress the legacy `binary-block-compressed` payload.
///
/// Layout: a 4-byte flag word — bytes 0..3 hold the 24-bit decompressed
/// size, bit 7 of byte 3 marks a stored (uncompressed) payload — then
/// repeated groups of a 16-bit entry mask and 16 entries, each either one
/// literal byte (mask bit clear) or a 16-bit back-reference (mask bit set):
/// offset `((v & 0xFFF0) >> 4) + 1`, length `(v & 0x000F) + 3`.
pub fn legacy_block_decompress(src: &mut LaneBuffer<'_>) -> Result<Vec<u8>> {
    let flags = src.read(4)?;
    if flags[3] & 0x80 != 0 {
        return Ok(src.read_rest().to_vec());
    }
    let target = usize::from(flags[0]) | usize::from(flags[1]) << 8 | usize::from(flags[2]) << 16;
    let mut out: Vec<u8> = Vec::with_capacity(target);

    'stream: while !src.is_exhausted() {
        let mask = src.read_u16()?;
        for bit in 0..16 {
            if mask & (1 << bit) != 0 {
                let entry = src.read_u16()?;
                let offset = ((entry as usize & 0xFFF0) >> 4) + 1;
                let mut size = (entry as usize & 0x000F) + 3;
                if offset > out.len() {
                    return Err(Error::DecompressionFailure {
                        codec: "legacy-block",
                        detail: format!(
                            "back-reference of {offset} byte(s) into {} byte(s) of output",
                            out.len()
                        ),
                    });
                }
                let lookup = offset.min(size);
                let from = out.len() - offset;
                // Overlapping copies replicate the lookup window.
                while size > 0 {
                    let n = lookup.min(size);
                    out.extend_from_within(from..from + n);
                    size -= n;
                }
            } else {
                out.push(src.read_u8()?);
            }
            if out.len() == target {
                break 'stream;
            }
        }
    }

    if out.len() != target {
        return Err(Error::DecompressionFailure {
            codec: "legacy-block",
            detail: format!("produced {} byte(s), header declared {target}", out.len()),
        });
    }
    Ok(out)
}
