//! KeyValues3 — Valve's typed, self-describing hierarchical data format.
//!
//! KV3 documents travel in one text form and six binary container
//! generations (the legacy `VKV\x03` container and versions 1–5 of the
//! `3VK` family), with LZ4-block, LZ4-chain and ZSTD compression, bucketed
//! byte-lane payloads, a per-document string table and an external
//! binary-blob side-channel.
//!
//! Reading covers every container generation plus text; writing covers
//! text and the legacy container (uncompressed or LZ4-wrapped).
//!
//! ```
//! use keyvalues3::{Kv3File, Value, Object};
//!
//! let mut map = Object::new();
//! map.insert("hp".into(), Value::Int64(120));
//! let file = Kv3File::new(Value::Object(map)).unwrap();
//!
//! let bytes = file.to_binary().unwrap();
//! let back = Kv3File::from_bytes(&bytes).unwrap();
//! assert_eq!(back.value, file.value);
//! ```

pub mod binary;
pub mod buffer;
pub mod compress;
pub mod document;
pub mod error;
pub mod header;
pub mod text;
pub mod value;

// ─────────────────────────────────────────────────────────────────────────────
// Top-level convenience re-exports for the most common API entry points.
// ─────────────────────────────────────────────────────────────────────────────

/// The crate-wide error type and result alias.
pub use error::{Error, Result};

/// The in-memory value model.
pub use value::{Flag, Object, TypedArray, Value, MAX_DEPTH};

/// Wire-stable enumerations.
pub use binary::{BinaryMagic, Kind, Specifier};

/// Document type and file-level entry points.
pub use document::{read, write, Kv3File};

/// Encoding/format identity.
pub use header::{
    Encoding, Format, Kv3Header, ENCODING_BINARY_BLOCK_COMPRESSED, ENCODING_BINARY_BLOCK_LZ4,
    ENCODING_BINARY_UNCOMPRESSED, ENCODING_TEXT, FORMAT_GENERIC,
};

/// Decode a binary KV3 container (any generation).
pub use binary::decode as decode_binary;

/// Legacy `VKV\x03` writer.
pub use binary::LegacyWriter;
