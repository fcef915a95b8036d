//! Encoding and format identity.
//!
//! A KV3 document is stamped with two `(name, uuid)` pairs: the *encoding*
//! (how the payload is wrapped on disk) and the *format* (what the data
//! means to its consumer).  Text documents spell both out in the
//! `<!-- kv3 … -->` header line; binary containers carry only the UUIDs.

use std::borrow::Cow;
use std::fmt;

use uuid::{uuid, Uuid};

use crate::error::{Error, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Well-known identities
//
// Wire order for binary containers is the UUID's little-endian byte form
// (`bytes_le`), so e.g. ENCODING_BINARY_UNCOMPRESSED serializes as
// 00 05 86 1B D8 F7 C1 40 AD 82 75 A4 82 67 E7 14.
// ─────────────────────────────────────────────────────────────────────────────

/// Legacy `VKV\x03` payload with no compression.
pub const ENCODING_BINARY_UNCOMPRESSED: Encoding = Encoding {
    name: "binary",
    uuid: uuid!("1b860500-f7d8-40c1-ad82-75a48267e714"),
};

/// Legacy `VKV\x03` payload compressed with the 16-entry-mask block scheme.
pub const ENCODING_BINARY_BLOCK_COMPRESSED: Encoding = Encoding {
    name: "binarybc",
    uuid: uuid!("95791a46-95bc-4f6c-a70b-05bca1b7dfd2"),
};

/// Legacy `VKV\x03` payload compressed as a single LZ4 block.
pub const ENCODING_BINARY_BLOCK_LZ4: Encoding = Encoding {
    name: "binarylz4",
    uuid: uuid!("6847348a-63a1-4f5c-a197-53806fd9b119"),
};

/// UTF-8 text with the `<!-- kv3 … -->` header.
pub const ENCODING_TEXT: Encoding = Encoding {
    name: "text",
    uuid: uuid!("e21c7f3c-8a33-41c5-9977-a76d3a32aa0d"),
};

/// The catch-all format most tools stamp on hand-authored documents.
pub const FORMAT_GENERIC: Format = Format {
    name: Cow::Borrowed("generic"),
    uuid: uuid!("7412167c-06e9-4698-aff2-e63eb59037e7"),
};

// ─────────────────────────────────────────────────────────────────────────────
// Header pieces
// ─────────────────────────────────────────────────────────────────────────────

/// How a document is wrapped on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Encoding {
    pub name: &'static str,
    pub uuid: Uuid,
}

/// What the document's contents mean to its consumer.
///
/// Unlike [`Encoding`], formats are open-ended: assets routinely carry
/// project-specific format names and UUIDs, so the name can be owned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Format {
    pub name: Cow<'static, str>,
    pub uuid: Uuid,
}

impl Encoding {
    /// Wire bytes for a legacy binary container header.
    pub fn wire_bytes(&self) -> [u8; 16] {
        self.uuid.to_bytes_le()
    }

    /// Resolve a legacy encoding UUID read off the wire.
    pub fn from_wire_bytes(bytes: [u8; 16]) -> Result<Encoding> {
        let uuid = Uuid::from_bytes_le(bytes);
        for known in [
            ENCODING_BINARY_UNCOMPRESSED,
            ENCODING_BINARY_BLOCK_COMPRESSED,
            ENCODING_BINARY_BLOCK_LZ4,
        ] {
            if known.uuid == uuid {
                return Ok(known);
            }
        }
        Err(Error::UnsupportedEncoding(uuid))
    }
}

impl Format {
    /// Build a format from a declared name and UUID, validating the name.
    pub fn new(name: impl Into<String>, uuid: Uuid) -> Result<Format> {
        let name = name.into();
        if !is_identifier(&name) {
            return Err(Error::InvalidValue(format!(
                "format name {name:?} is not an identifier"
            )));
        }
        Ok(Format {
            name: Cow::Owned(name),
            uuid,
        })
    }

    /// Wire bytes for a binary container header.
    pub fn wire_bytes(&self) -> [u8; 16] {
        self.uuid.to_bytes_le()
    }

    /// Resolve a format UUID read off the wire.
    ///
    /// Unknown format UUIDs are not an error — binary containers carry no
    /// name, so anything that is not [`FORMAT_GENERIC`] comes back with a
    /// placeholder name and the UUID preserved for re-encoding.
    pub fn from_wire_bytes(bytes: [u8; 16]) -> Format {
        let uuid = Uuid::from_bytes_le(bytes);
        if uuid == FORMAT_GENERIC.uuid {
            FORMAT_GENERIC
        } else {
            Format {
                name: Cow::Borrowed("unknown"),
                uuid,
            }
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "encoding:{}:version{{{}}}", self.name, self.uuid)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "format:{}:version{{{}}}", self.name, self.uuid)
    }
}

/// The text-form header line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Kv3Header {
    pub encoding: Encoding,
    pub format: Format,
}

impl Default for Kv3Header {
    fn default() -> Self {
        Kv3Header {
            encoding: ENCODING_TEXT,
            format: FORMAT_GENERIC,
        }
    }
}

impl fmt::Display for Kv3Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<!-- kv3 {} {} -->", self.encoding, self.format)
    }
}

/// Header-piece names must be syntactic identifiers (`[A-Za-z0-9_]+`, not
/// starting with a digit).  Keys and flag names share the same shape.
pub(crate) fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
