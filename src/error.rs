//! Error taxonomy for KV3 decoding and encoding.
//!
//! Every reader failure is fatal to the decode in progress — there is no
//! partial result.  The only recoverable boundary is the file level:
//! [`crate::Kv3File::from_bytes`] falls back from binary to text parsing on
//! [`Error::InvalidMagic`] alone; any other binary error surfaces unmodified.

use uuid::Uuid;

/// Convenience alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;

/// All the ways a KV3 document can fail to decode or encode.
///
/// Variants that correspond to a wire position carry the offset at which the
/// problem was observed, relative to the buffer being consumed at the time
/// (the outer container or a decompressed lane).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The first four bytes match no known KV3 container magic.
    #[error("invalid KV3 magic {0:02x?}")]
    InvalidMagic([u8; 4]),

    /// The magic is recognized but this build does not decode that version.
    #[error("unsupported KV3 container version (magic {0:02x?})")]
    UnsupportedVersion([u8; 4]),

    /// A legacy container declared an encoding UUID this crate does not know.
    #[error("unsupported legacy encoding {0}")]
    UnsupportedEncoding(Uuid),

    /// A versioned container declared a compression method outside `{0,1,2}`,
    /// or invalid dictionary/frame parameters for the method it declared.
    #[error("unsupported compression method {method} in {context}")]
    UnsupportedCompression {
        method: u32,
        context: &'static str,
    },

    /// A read ran past the end of its lane.
    #[error("truncated input: need {need} byte(s) at offset {offset}")]
    TruncatedInput { offset: usize, need: usize },

    /// LZ4 or ZSTD rejected a stream, or produced the wrong number of bytes.
    #[error("{codec} decompression failed: {detail}")]
    DecompressionFailure {
        codec: &'static str,
        detail: String,
    },

    /// A fixed marker word did not match.
    #[error("bad sentinel at offset {offset}: expected {expected:#010x}, got {got:#010x}")]
    BadSentinel {
        offset: usize,
        expected: u32,
        got: u32,
    },

    /// A string reference pointed outside the per-document string table.
    #[error("string index {index} out of range (table holds {table_len})")]
    StringIndexOutOfRange { index: i32, table_len: usize },

    /// A type byte decoded to a kind id outside the wire enumeration.
    #[error("unknown value kind {0:#04x}")]
    UnknownKind(u8),

    /// A V5 type byte had its reserved extension bit (`0x40`) set.
    #[error("reserved type-byte flag set ({0:#04x})")]
    ReservedFlagSet(u8),

    /// A specifier byte held a value that must not be persisted.
    #[error("invalid specifier byte {0:#04x}")]
    InvalidSpecifier(u8),

    /// A value tree was rejected by the validator, an encoder, or the
    /// decoder's structural rules (negative counts, unnamed members).
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// A lane or side-channel still held data after the root value was read.
    #[error("{lane} lane not fully consumed ({remaining} left)")]
    TrailingData {
        lane: &'static str,
        remaining: usize,
    },

    /// Value nesting exceeded the decode/encode depth cap.
    #[error("value nesting exceeds {0} levels")]
    RecursionLimit(usize),

    /// The text parser rejected the input.
    #[error("text parse error at line {line}, column {column}: {message}")]
    Text {
        line: usize,
        column: usize,
        message: String,
    },

    /// Neither the binary nor the text decoder accepted the input.
    #[error("failed to read KV3 in both binary and text modes\n\tbinary: {binary}\n\ttext: {text}")]
    NotKv3 {
        binary: Box<Error>,
        text: Box<Error>,
    },

    /// The underlying file or sink reported an I/O failure.
    #[error("I/O failure")]
    WriteSink(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for a text-parse failure at a known position.
    pub(crate) fn text(line: usize, column: usize, message: impl Into<String>) -> Self {
        Error::Text {
            line,
            column,
            message: message.into(),
        }
    }
}
