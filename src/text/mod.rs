//! Text KV3 — the `<!-- kv3 … -->` header followed by a single value.

pub mod reader;
pub mod writer;

pub use reader::parse;
pub use writer::encode;
