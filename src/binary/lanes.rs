//! Lane decomposition and per-decode state.
//!
//! A decompressed payload is split into byte-width buckets ("lanes") that
//! the recursive reader consumes independently: the order values appear in
//! the types lane is the order they are consumed from their lanes, but each
//! lane's cursor advances on its own.
//!
//! The legacy container is the degenerate case: every lane, the types
//! stream and the member counts all alias one cursor, so reads stay
//! sequentially consistent with the type stream by construction.

use std::collections::VecDeque;

use crate::binary::types::TypeByteShape;
use crate::buffer::LaneBuffer;
use crate::error::{Error, Result};

/// One group of byte-width bucketed lanes.
#[derive(Debug)]
pub struct LaneSet<'a> {
    pub byte: LaneBuffer<'a>,
    pub short: LaneBuffer<'a>,
    pub int: LaneBuffer<'a>,
    pub double: LaneBuffer<'a>,
}

impl<'a> LaneSet<'a> {
    /// Split the next region of `data` into bucketed lanes.
    ///
    /// Counts are element counts, not byte counts.  With `force_align` the
    /// inter-lane padding is always consumed; without it (the V5 layout)
    /// padding only exists in front of a non-empty lane.
    pub fn split(
        data: &mut LaneBuffer<'a>,
        byte_count: usize,
        short_count: usize,
        int_count: usize,
        double_count: usize,
        force_align: bool,
    ) -> Result<LaneSet<'a>> {
        let byte = data.slice(byte_count)?;
        if short_count > 0 || force_align {
            data.align(2);
        }
        let short = data.slice(short_count * 2)?;
        if int_count > 0 || force_align {
            data.align(4);
        }
        let int = data.slice(int_count * 4)?;
        if double_count > 0 || force_align {
            data.align(8);
        }
        let double = data.slice(double_count * 8)?;
        Ok(LaneSet {
            byte,
            short,
            int,
            double,
        })
    }
}

/// Where blob payload bytes and lengths come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobMode {
    /// Legacy/V1: an inline `i32` length from the int lane, bytes from the
    /// byte lane.
    Inline,
    /// V2+: lengths from the up-front size list (consumed as a queue),
    /// bytes from the dedicated blob lane.
    SideChannel,
}

/// Lane storage, varying by container generation.
enum Store<'a> {
    /// Legacy: one cursor for everything.
    Shared(LaneBuffer<'a>),
    /// V1–V4: bucketed lanes plus a separate types stream; object member
    /// counts come from the int lane.
    Split {
        lanes: LaneSet<'a>,
        types: LaneBuffer<'a>,
    },
    /// V5: two lane groups, a separate types stream, and a pre-split
    /// member-count lane.
    Dual {
        groups: [LaneSet<'a>; 2],
        active: usize,
        types: LaneBuffer<'a>,
        member_counts: LaneBuffer<'a>,
    },
}

/// Everything the recursive value reader consumes.
pub struct DecodeState<'a> {
    store: Store<'a>,
    pub shape: TypeByteShape,
    pub strings: Vec<String>,
    pub blob_mode: BlobMode,
    pub blob_sizes: VecDeque<u32>,
    pub blob: LaneBuffer<'a>,
}

impl<'a> DecodeState<'a> {
    /// Legacy: every lane aliases `stream`.
    pub fn shared(stream: LaneBuffer<'a>, strings: Vec<String>) -> DecodeState<'a> {
        DecodeState {
            store: Store::Shared(stream),
            shape: TypeByteShape::Wide,
            strings,
            blob_mode: BlobMode::Inline,
            blob_sizes: VecDeque::new(),
            blob: LaneBuffer::empty(),
        }
    }

    /// V1–V4: one lane group and a separate types stream.
    pub fn split(
        lanes: LaneSet<'a>,
        types: LaneBuffer<'a>,
        shape: TypeByteShape,
        strings: Vec<String>,
    ) -> DecodeState<'a> {
        DecodeState {
            store: Store::Split { lanes, types },
            shape,
            strings,
            blob_mode: BlobMode::Inline,
            blob_sizes: VecDeque::new(),
            blob: LaneBuffer::empty(),
        }
    }

    /// V5: two lane groups; group 1 starts active.
    pub fn dual(
        group0: LaneSet<'a>,
        group1: LaneSet<'a>,
        types: LaneBuffer<'a>,
        member_counts: LaneBuffer<'a>,
        strings: Vec<String>,
    ) -> DecodeState<'a> {
        DecodeState {
            store: Store::Dual {
                groups: [group0, group1],
                active: 1,
                types,
                member_counts,
            },
            shape: TypeByteShape::Dense,
            strings,
            blob_mode: BlobMode::Inline,
            blob_sizes: VecDeque::new(),
            blob: LaneBuffer::empty(),
        }
    }

    /// Attach the V2+ blob side-channel.
    pub fn with_blobs(mut self, sizes: Vec<u32>, blob: LaneBuffer<'a>) -> DecodeState<'a> {
        self.blob_mode = BlobMode::SideChannel;
        self.blob_sizes = sizes.into();
        self.blob = blob;
        self
    }

    pub fn byte_lane(&mut self) -> &mut LaneBuffer<'a> {
        match &mut self.store {
            Store::Shared(stream) => stream,
            Store::Split { lanes, .. } => &mut lanes.byte,
            Store::Dual { groups, active, .. } => &mut groups[*active].byte,
        }
    }

    pub fn short_lane(&mut self) -> &mut LaneBuffer<'a> {
        match &mut self.store {
            Store::Shared(stream) => stream,
            Store::Split { lanes, .. } => &mut lanes.short,
            Store::Dual { groups, active, .. } => &mut groups[*active].short,
        }
    }

    pub fn int_lane(&mut self) -> &mut LaneBuffer<'a> {
        match &mut self.store {
            Store::Shared(stream) => stream,
            Store::Split { lanes, .. } => &mut lanes.int,
            Store::Dual { groups, active, .. } => &mut groups[*active].int,
        }
    }

    pub fn double_lane(&mut self) -> &mut LaneBuffer<'a> {
        match &mut self.store {
            Store::Shared(stream) => stream,
            Store::Split { lanes, .. } => &mut lanes.double,
            Store::Dual { groups, active, .. } => &mut groups[*active].double,
        }
    }

    pub fn types_lane(&mut self) -> &mut LaneBuffer<'a> {
        match &mut self.store {
            Store::Shared(stream) => stream,
            Store::Split { types, .. } => types,
            Store::Dual { types, .. } => types,
        }
    }

    /// The next object's member count.
    pub fn read_member_count(&mut self) -> Result<u32> {
        match &mut self.store {
            Store::Shared(stream) => stream.read_u32(),
            Store::Split { lanes, .. } => lanes.int.read_u32(),
            Store::Dual { member_counts, .. } => member_counts.read_u32(),
        }
    }

    /// Select the active lane group (V5 only; no-op otherwise).
    pub fn set_active_group(&mut self, group: usize) {
        if let Store::Dual { active, .. } = &mut self.store {
            *active = group;
        }
    }

    /// Resolve a string reference.  Index `-1` is the empty string and never
    /// touches the table.
    pub fn string(&self, index: i32) -> Result<String> {
        if index == -1 {
            return Ok(String::new());
        }
        usize::try_from(index)
            .ok()
            .and_then(|i| self.strings.get(i))
            .cloned()
            .ok_or(Error::StringIndexOutOfRange {
                index,
                table_len: self.strings.len(),
            })
    }

    /// True once the types stream sits at its end.  For the shared legacy
    /// store the caller checks the trailer instead.
    pub fn types_exhausted(&mut self) -> bool {
        self.types_lane().is_exhausted()
    }
}
