//! The in-memory KV3 value model.
//!
//! A [`Value`] is an owned tree: containers own their children, so the graph
//! is acyclic by construction and values are immutable at the codec boundary.
//! Equality is structural with two deliberate loosenings (see [`PartialEq`
//! notes](Value#equality)).

use indexmap::IndexMap;

use crate::binary::types::{Kind, Specifier};
use crate::error::{Error, Result};

/// Maximum container nesting accepted by the validator, the binary decoder
/// and the encoders.
pub const MAX_DEPTH: usize = 1024;

bitflags::bitflags! {
    /// Value-level flags.
    ///
    /// The low six bits are exactly the legacy wire flag byte;
    /// `MULTILINE_STRING` is a text-transport marker that is never persisted
    /// to binary, and `ENTITY_NAME` / `LOCALIZE` only exist on the V5 wire
    /// (as dense specifiers).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Flag: u8 {
        const RESOURCE = 1 << 0;
        const RESOURCE_NAME = 1 << 1;
        const MULTILINE_STRING = 1 << 2;
        const PANORAMA = 1 << 3;
        const SOUNDEVENT = 1 << 4;
        const SUBCLASS = 1 << 5;
        const ENTITY_NAME = 1 << 6;
        const LOCALIZE = 1 << 7;
    }
}

impl Flag {
    /// Wrap a value with this flag set: `Flag::RESOURCE.wrap("path.vpcf")`.
    pub fn wrap(self, value: impl Into<Value>) -> Value {
        Value::flagged(value.into(), self)
    }

    /// The text-form name of a single flag bit.
    pub(crate) fn bit_name(bit: Flag) -> &'static str {
        match bit {
            b if b == Flag::RESOURCE => "resource",
            b if b == Flag::RESOURCE_NAME => "resource_name",
            b if b == Flag::MULTILINE_STRING => "multilinestring",
            b if b == Flag::PANORAMA => "panorama",
            b if b == Flag::SOUNDEVENT => "soundevent",
            b if b == Flag::SUBCLASS => "subclass",
            b if b == Flag::ENTITY_NAME => "entity_name",
            b if b == Flag::LOCALIZE => "localize",
            _ => unreachable!("bit_name called with multi-bit set"),
        }
    }

    /// Parse a text-form flag name (case-insensitive).
    pub(crate) fn from_text_name(name: &str) -> Option<Flag> {
        Some(match name.to_ascii_lowercase().as_str() {
            "resource" => Flag::RESOURCE,
            "resource_name" => Flag::RESOURCE_NAME,
            "multilinestring" => Flag::MULTILINE_STRING,
            "panorama" => Flag::PANORAMA,
            "soundevent" => Flag::SOUNDEVENT,
            "subclass" => Flag::SUBCLASS,
            "entity_name" => Flag::ENTITY_NAME,
            "localize" => Flag::LOCALIZE,
            _ => return None,
        })
    }
}

/// Ordered object members.  Insertion order is preserved; a duplicate key
/// keeps the first occurrence's position with the last occurrence's value.
pub type Object = IndexMap<String, Value>;

/// A homogeneous array: every element shares one declared kind/specifier.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedArray {
    pub elem_kind: Kind,
    pub elem_specifier: Specifier,
    pub items: Vec<Value>,
}

/// A KV3 value.
///
/// # Equality
///
/// `PartialEq` is structural, except that
/// - integer variants compare by numeric value regardless of width, and
///   floating variants compare as `f64` (with `NaN == NaN`), so that a
///   canonicalizing encode/decode round trip compares equal; and
/// - a [`Value::Flagged`] wrapper whose set is empty, or only
///   `MULTILINE_STRING` (a transport marker), compares equal to its inner
///   value.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int64(i64),
    UInt64(u64),
    Int32(i32),
    UInt32(u32),
    Int16(i16),
    UInt16(u16),
    Int8(i8),
    UInt8(u8),
    Double(f64),
    Float(f32),
    String(String),
    Blob(Vec<u8>),
    Array(Vec<Value>),
    TypedArray(TypedArray),
    Object(Object),
    Flagged(Box<Value>, Flag),
}

impl Value {
    /// Attach a flag set to `value`.  Wrapping an already-flagged value
    /// merges the sets, so a `Flagged` never directly wraps a `Flagged`.
    pub fn flagged(value: Value, flags: Flag) -> Value {
        match value {
            Value::Flagged(inner, existing) => Value::Flagged(inner, existing | flags),
            other if flags.is_empty() => other,
            other => Value::Flagged(Box::new(other), flags),
        }
    }

    /// The flag set attached to this value (empty for unwrapped values).
    pub fn flags(&self) -> Flag {
        match self {
            Value::Flagged(_, flags) => *flags,
            _ => Flag::empty(),
        }
    }

    /// The value inside any flag wrapper.
    pub fn unflagged(&self) -> &Value {
        match self {
            Value::Flagged(inner, _) => inner,
            other => other,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self.unflagged() {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self.unflagged() {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self.unflagged() {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view of any integer variant.
    pub fn as_int(&self) -> Option<i128> {
        match *self.unflagged() {
            Value::Int64(v) => Some(v as i128),
            Value::UInt64(v) => Some(v as i128),
            Value::Int32(v) => Some(v as i128),
            Value::UInt32(v) => Some(v as i128),
            Value::Int16(v) => Some(v as i128),
            Value::UInt16(v) => Some(v as i128),
            Value::Int8(v) => Some(v as i128),
            Value::UInt8(v) => Some(v as i128),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match *self.unflagged() {
            Value::Double(v) => Some(v),
            Value::Float(v) => Some(v as f64),
            _ => None,
        }
    }

    /// Walk the tree and reject shapes the codec cannot represent.
    ///
    /// The typed variants already rule out the classic failure classes
    /// (out-of-range integers, non-string keys, reference cycles); what
    /// remains dynamic is nesting depth, empty object keys, and doubly
    /// wrapped flag values — which [`Value::flagged`] prevents but a hand
    /// built tree could still contain.
    pub fn validate(&self) -> Result<()> {
        self.validate_at(0)
    }

    fn validate_at(&self, depth: usize) -> Result<()> {
        if depth > MAX_DEPTH {
            return Err(Error::RecursionLimit(MAX_DEPTH));
        }
        match self {
            Value::Flagged(inner, _) => {
                if matches!(**inner, Value::Flagged(..)) {
                    return Err(Error::InvalidValue(
                        "flagged value directly wraps another flagged value".into(),
                    ));
                }
                inner.validate_at(depth + 1)
            }
            Value::Array(items) => {
                for item in items {
                    item.validate_at(depth + 1)?;
                }
                Ok(())
            }
            Value::TypedArray(array) => {
                for item in &array.items {
                    item.validate_at(depth + 1)?;
                }
                Ok(())
            }
            Value::Object(map) => {
                for (key, value) in map {
                    if key.is_empty() {
                        return Err(Error::InvalidValue("object key is empty".into()));
                    }
                    value.validate_at(depth + 1)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Structural equality
// ─────────────────────────────────────────────────────────────────────────────

/// Flags that do not distinguish two values: an empty set, or the text-only
/// multiline marker.
fn transparent(flags: Flag) -> bool {
    (flags - Flag::MULTILINE_STRING).is_empty()
}

fn doubles_eq(a: f64, b: f64) -> bool {
    a == b || (a.is_nan() && b.is_nan())
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        // Strip transparent wrappers from either side first.
        let lhs = match self {
            Value::Flagged(inner, flags) if transparent(*flags) => inner.as_ref(),
            other => other,
        };
        let rhs = match other {
            Value::Flagged(inner, flags) if transparent(*flags) => inner.as_ref(),
            other => other,
        };

        match (lhs, rhs) {
            (Value::Flagged(a, af), Value::Flagged(b, bf)) => {
                (*af - Flag::MULTILINE_STRING) == (*bf - Flag::MULTILINE_STRING) && a == b
            }
            // One side carries a distinguishing flag set, the other none.
            (Value::Flagged(..), _) | (_, Value::Flagged(..)) => false,
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Blob(a), Value::Blob(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::TypedArray(a), Value::TypedArray(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            // Cross-width numeric comparison; neither side is wrapped here.
            (a, b) => {
                if let (Some(a), Some(b)) = (a.as_int(), b.as_int()) {
                    a == b
                } else if let (Some(a), Some(b)) = (a.as_double(), b.as_double()) {
                    doubles_eq(a, b)
                } else {
                    false
                }
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Construction sugar
// ─────────────────────────────────────────────────────────────────────────────

impl From<bool> for Value {
    fn from(v: bool) -> Value {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Value {
        Value::Int64(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Value {
        Value::Int32(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Value {
        Value::UInt64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Value {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Value {
        Value::String(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Value {
        Value::String(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Value {
        Value::Array(v)
    }
}

impl From<Object> for Value {
    fn from(v: Object) -> Value {
        Value::Object(v)
    }
}
