//! Wire-stable enumerations and type-byte packing for the binary containers.
//!
//! Covers:
//! - [`BinaryMagic`] — the 4-byte container dispatch table
//! - [`Kind`] — the value-kind byte space shared by every generation
//! - [`Specifier`] — the per-value role tag, dense-enum form
//! - type-byte decode for the three type-byte shapes (mask `0x7F` for
//!   legacy/V1/V2, mask `0x3F` for V3/V4, signed + dense specifier for V5)
//! - type-byte encode for the legacy writer

use crate::error::{Error, Result};
use crate::value::Flag;

// ─────────────────────────────────────────────────────────────────────────────
// Container magics
// ─────────────────────────────────────────────────────────────────────────────

/// Marker between the blob-size table and the blob stream in V2+ payloads.
pub const BLOB_SENTINEL: u32 = 0xFFEE_DD00;

/// Trailer word closing a legacy root-value block.
pub const LEGACY_TERMINATOR: u32 = 0xFFFF_FFFF;

/// The LZ4-chain frame size every known V2+ writer uses.
pub const CHAIN_FRAME_SIZE: u16 = 16384;

/// The six recognized container generations, selected by the first four bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryMagic {
    /// `VKV\x03` — the original container with an explicit encoding UUID.
    Legacy,
    /// `\x01 3VK`
    V1,
    /// `\x02 3VK`
    V2,
    /// `\x03 3VK`
    V3,
    /// `\x04 3VK`
    V4,
    /// `\x05 3VK`
    V5,
}

impl BinaryMagic {
    /// Classify the first four bytes of a stream.
    pub fn detect(magic: [u8; 4]) -> Result<BinaryMagic> {
        match &magic {
            b"VKV\x03" => Ok(BinaryMagic::Legacy),
            b"\x013VK" => Ok(BinaryMagic::V1),
            b"\x023VK" => Ok(BinaryMagic::V2),
            b"\x033VK" => Ok(BinaryMagic::V3),
            b"\x043VK" => Ok(BinaryMagic::V4),
            b"\x053VK" => Ok(BinaryMagic::V5),
            _ => Err(Error::InvalidMagic(magic)),
        }
    }

    /// The wire bytes for this generation.
    pub fn bytes(self) -> [u8; 4] {
        match self {
            BinaryMagic::Legacy => *b"VKV\x03",
            BinaryMagic::V1 => *b"\x013VK",
            BinaryMagic::V2 => *b"\x023VK",
            BinaryMagic::V3 => *b"\x033VK",
            BinaryMagic::V4 => *b"\x043VK",
            BinaryMagic::V5 => *b"\x053VK",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Value kinds
// ─────────────────────────────────────────────────────────────────────────────

/// The value-kind byte space.  Ids are wire-stable across all generations;
/// which ids a generation can *emit* varies (e.g. `Int16` needs the V4 short
/// lane, `TypedArrayByteLen2` is V5-only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Kind {
    Null = 1,
    Bool = 2,
    Int64 = 3,
    UInt64 = 4,
    Double = 5,
    String = 6,
    Blob = 7,
    Array = 8,
    Object = 9,
    TypedArray = 10,
    Int32 = 11,
    UInt32 = 12,
    BoolTrue = 13,
    BoolFalse = 14,
    Int64Zero = 15,
    Int64One = 16,
    DoubleZero = 17,
    DoubleOne = 18,
    Float = 19,
    Int16 = 20,
    UInt16 = 21,
    Int8 = 22,
    UInt8 = 23,
    TypedArrayByteLen = 24,
    TypedArrayByteLen2 = 25,
}

impl Kind {
    /// Map a wire id back to a kind.
    pub fn from_wire(id: u8) -> Result<Kind> {
        Ok(match id {
            1 => Kind::Null,
            2 => Kind::Bool,
            3 => Kind::Int64,
            4 => Kind::UInt64,
            5 => Kind::Double,
            6 => Kind::String,
            7 => Kind::Blob,
            8 => Kind::Array,
            9 => Kind::Object,
            10 => Kind::TypedArray,
            11 => Kind::Int32,
            12 => Kind::UInt32,
            13 => Kind::BoolTrue,
            14 => Kind::BoolFalse,
            15 => Kind::Int64Zero,
            16 => Kind::Int64One,
            17 => Kind::DoubleZero,
            18 => Kind::DoubleOne,
            19 => Kind::Float,
            20 => Kind::Int16,
            21 => Kind::UInt16,
            22 => Kind::Int8,
            23 => Kind::UInt8,
            24 => Kind::TypedArrayByteLen,
            25 => Kind::TypedArrayByteLen2,
            other => return Err(Error::UnknownKind(other)),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Specifiers
// ─────────────────────────────────────────────────────────────────────────────

/// Per-value role tag.
///
/// V1–V4 persist a specifier as a single-bit flag byte following a type byte
/// whose high bit is set; V5 persists this dense enum directly.  Values above
/// [`Specifier::MAX_PERSISTED`] exist in the byte space but must never appear
/// on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Specifier {
    None = 0,
    Resource = 1,
    ResourceName = 2,
    Panorama = 3,
    SoundEvent = 4,
    SubClass = 5,
    EntityName = 6,
    Localize = 7,
    #[default]
    Unspecified = 8,
}

impl Specifier {
    /// Largest specifier a container may carry (`EntityName`).
    pub const MAX_PERSISTED: u8 = Specifier::EntityName as u8;

    /// Decode a V5 specifier byte, rejecting values that must not persist.
    pub fn from_wire(byte: u8) -> Result<Specifier> {
        Ok(match byte {
            0 => Specifier::None,
            1 => Specifier::Resource,
            2 => Specifier::ResourceName,
            3 => Specifier::Panorama,
            4 => Specifier::SoundEvent,
            5 => Specifier::SubClass,
            6 => Specifier::EntityName,
            other => return Err(Error::InvalidSpecifier(other)),
        })
    }

    /// The in-memory flag this specifier corresponds to, if any.
    pub fn to_flag(self) -> Flag {
        match self {
            Specifier::Resource => Flag::RESOURCE,
            Specifier::ResourceName => Flag::RESOURCE_NAME,
            Specifier::Panorama => Flag::PANORAMA,
            Specifier::SoundEvent => Flag::SOUNDEVENT,
            Specifier::SubClass => Flag::SUBCLASS,
            Specifier::EntityName => Flag::ENTITY_NAME,
            Specifier::Localize => Flag::LOCALIZE,
            Specifier::None | Specifier::Unspecified => Flag::empty(),
        }
    }

    /// Map a single-bit flag to its specifier.  `flags` must hold at most one
    /// set bit; multi-bit sets have no wire specifier form.
    pub fn from_flag(flags: Flag) -> Option<Specifier> {
        Some(match flags {
            f if f == Flag::RESOURCE => Specifier::Resource,
            f if f == Flag::RESOURCE_NAME => Specifier::ResourceName,
            f if f == Flag::PANORAMA => Specifier::Panorama,
            f if f == Flag::SOUNDEVENT => Specifier::SoundEvent,
            f if f == Flag::SUBCLASS => Specifier::SubClass,
            f if f == Flag::ENTITY_NAME => Specifier::EntityName,
            f if f == Flag::LOCALIZE => Specifier::Localize,
            f if f.is_empty() => Specifier::Unspecified,
            _ => return None,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Type-byte decode
//
// Three shapes across the generations:
//   legacy/V1/V2: high bit → mask 0x7F, one flag byte (single-bit specifier)
//   V3/V4:        high bit → mask 0x3F, one flag byte (two reserved bits)
//   V5:           sign bit → one dense-specifier byte; 0x40 reserved
// ─────────────────────────────────────────────────────────────────────────────

/// Which type-byte shape a generation uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeByteShape {
    /// Mask `0x7F` — legacy, V1, V2.
    Wide,
    /// Mask `0x3F` — V3, V4.
    Narrow,
    /// Signed interpretation with a dense specifier byte — V5.
    Dense,
}

/// Decode one type byte (plus its optional specifier byte) from `read`.
///
/// `read` is called once for the type byte and at most once more for the
/// specifier byte; errors from it propagate unchanged.
pub fn read_type_byte(
    shape: TypeByteShape,
    mut read: impl FnMut() -> Result<u8>,
) -> Result<(Kind, Specifier)> {
    let raw = read()?;
    match shape {
        TypeByteShape::Wide | TypeByteShape::Narrow => {
            let mask = if shape == TypeByteShape::Wide { 0x7F } else { 0x3F };
            if raw & 0x80 == 0 {
                return Ok((Kind::from_wire(raw)?, Specifier::Unspecified));
            }
            let flag = read()?;
            let specifier = if flag & 1 != 0 {
                Specifier::Resource
            } else if flag & 2 != 0 {
                Specifier::ResourceName
            } else if flag & 8 != 0 {
                Specifier::Panorama
            } else if flag & 16 != 0 {
                Specifier::SoundEvent
            } else if flag & 32 != 0 {
                Specifier::SubClass
            } else {
                Specifier::Unspecified
            };
            Ok((Kind::from_wire(raw & mask)?, specifier))
        }
        TypeByteShape::Dense => {
            if raw & 0x40 != 0 {
                // Reserved for future extension flag bytes; nothing persists
                // it today, so a set bit means a stream we cannot interpret.
                return Err(Error::ReservedFlagSet(raw));
            }
            let specifier = if raw & 0x80 != 0 {
                Specifier::from_wire(read()?)?
            } else {
                Specifier::Unspecified
            };
            Ok((Kind::from_wire(raw & 0x3F)?, specifier))
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Type-byte encode (legacy writer)
// ─────────────────────────────────────────────────────────────────────────────

/// Pack a kind and a flag set into a legacy type byte, appending the flag
/// byte when the set is non-empty.  The flag byte reuses the in-memory bit
/// layout directly — the low six bits are the wire bits.
pub fn write_type_byte(out: &mut Vec<u8>, kind: Kind, flags: Flag) {
    if flags.is_empty() {
        out.push(kind as u8);
    } else {
        out.push(kind as u8 | 0x80);
        out.push(flags.bits());
    }
}
