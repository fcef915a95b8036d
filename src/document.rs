//! The document layer: a value plus its format identity.
//!
//! [`Kv3File`] is what the file-level entry points produce and consume.  On
//! read, the binary decoder runs first; only [`Error::InvalidMagic`] falls
//! through to the text parser, so a corrupt binary container surfaces its
//! real error instead of a misleading text diagnosis.

use std::fs;
use std::path::Path;

use crate::binary;
use crate::error::{Error, Result};
use crate::header::{
    Encoding, Format, ENCODING_BINARY_BLOCK_LZ4, ENCODING_BINARY_UNCOMPRESSED, ENCODING_TEXT,
    FORMAT_GENERIC,
};
use crate::text;
use crate::value::Value;

/// A KV3 document: the root value, its format, and — when decoded from a
/// stream — the wrapping observed on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct Kv3File {
    pub value: Value,
    pub format: Format,
    /// `None` for documents built in memory and for V1–V5 containers
    /// (whose magic is the wrapping).
    pub original_encoding: Option<Encoding>,
}

impl Kv3File {
    /// Wrap a validated value with the generic format.
    pub fn new(value: Value) -> Result<Kv3File> {
        Kv3File::with_format(value, FORMAT_GENERIC)
    }

    /// Wrap a validated value with an explicit format.
    pub fn with_format(value: Value, format: Format) -> Result<Kv3File> {
        value.validate()?;
        Ok(Kv3File {
            value,
            format,
            original_encoding: None,
        })
    }

    /// Wrap a value without validating it up front.  The encoders still
    /// validate at encode time; this only defers the walk for callers that
    /// build large documents incrementally.
    pub fn new_unvalidated(value: Value, format: Format) -> Kv3File {
        Kv3File {
            value,
            format,
            original_encoding: None,
        }
    }

    /// Decode a document from raw bytes: binary first, text on
    /// [`Error::InvalidMagic`].
    pub fn from_bytes(data: &[u8]) -> Result<Kv3File> {
        let binary_err = match binary::decode(data) {
            Ok(decoded) => {
                return Ok(Kv3File {
                    value: decoded.value,
                    format: decoded.format,
                    original_encoding: decoded.encoding,
                })
            }
            Err(err @ Error::InvalidMagic(_)) => err,
            Err(err) => return Err(err),
        };

        let parsed = std::str::from_utf8(data)
            .map_err(|e| Error::text(1, 1, format!("document is not UTF-8: {e}")))
            .and_then(|text| text::parse(text));
        match parsed {
            Ok((header, value)) => Ok(Kv3File {
                value,
                format: header.format,
                original_encoding: Some(header.encoding),
            }),
            Err(text_err) => Err(Error::NotKv3 {
                binary: Box::new(binary_err),
                text: Box::new(text_err),
            }),
        }
    }

    /// Parse a text document.
    pub fn from_text(text: &str) -> Result<Kv3File> {
        let (header, value) = text::parse(text)?;
        Ok(Kv3File {
            value,
            format: header.format,
            original_encoding: Some(header.encoding),
        })
    }

    /// Read a document from a file (binary or text).
    pub fn from_path(path: impl AsRef<Path>) -> Result<Kv3File> {
        let data = fs::read(path)?;
        Kv3File::from_bytes(&data)
    }

    /// Render as text.
    pub fn to_text(&self) -> String {
        text::encode(&self.value, &self.format)
    }

    /// Encode as a legacy binary-uncompressed container.
    pub fn to_binary(&self) -> Result<Vec<u8>> {
        binary::LegacyWriter::new(self.format.clone()).encode(&self.value)
    }

    /// Encode as a legacy LZ4-wrapped container.
    pub fn to_binary_lz4(&self) -> Result<Vec<u8>> {
        binary::LegacyWriter::new(self.format.clone()).encode_lz4(&self.value)
    }

    /// Encode with the requested wrapping.  Only text and the two legacy
    /// writer encodings are supported.
    pub fn encode_as(&self, encoding: &Encoding) -> Result<Vec<u8>> {
        if *encoding == ENCODING_TEXT {
            Ok(self.to_text().into_bytes())
        } else if *encoding == ENCODING_BINARY_UNCOMPRESSED {
            self.to_binary()
        } else if *encoding == ENCODING_BINARY_BLOCK_LZ4 {
            self.to_binary_lz4()
        } else {
            Err(Error::UnsupportedEncoding(encoding.uuid))
        }
    }

    /// Write the document to a file with the requested wrapping.
    pub fn write_to_path(&self, path: impl AsRef<Path>, encoding: &Encoding) -> Result<()> {
        let bytes = self.encode_as(encoding)?;
        fs::write(path, bytes)?;
        Ok(())
    }
}

/// Read a KV3 document from a file (binary or text).
pub fn read(path: impl AsRef<Path>) -> Result<Kv3File> {
    Kv3File::from_path(path)
}

/// Write a value to a file as KV3 text.
pub fn write(value: &Value, path: impl AsRef<Path>) -> Result<()> {
    let file = Kv3File::new(value.clone())?;
    file.write_to_path(path, &ENCODING_TEXT)
}
