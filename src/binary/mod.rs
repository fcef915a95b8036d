//! Binary KV3 containers — the six wire generations.
//!
//! Reading covers every generation; writing covers the legacy container
//! (uncompressed and LZ4-wrapped).

pub mod lanes;
pub mod reader;
pub mod types;
pub mod writer;

// Re-export the most important public API items at the module level.
pub use reader::{decode, Decoded};
pub use types::{BinaryMagic, Kind, Specifier};
pub use writer::LegacyWriter;
