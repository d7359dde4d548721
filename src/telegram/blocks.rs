use bytes::Buf;

use crate::telegram::decoder::DecodeError;

/// First-level block of a telegram: one transport order. Owns the TU blocks
/// nested inside it; their count is fixed by the subtype geometry.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ToBlock {
    pub order_number: u32,
    pub source_position: String,
    pub target_position: String,
    pub transport_kind: u8,
    pub priority: u8,
    pub tu_blocks: Vec<TuBlock>,
}

/// Second-level block: one load unit. Pure value data, no further nesting.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TuBlock {
    pub load_unit_id: String,
    pub tu_kind: u16,
    pub weight_grams: u32,
    pub height_mm: u16,
    pub occupied: bool,
}

impl ToBlock {
    /// Wire length of the TO block's own scalar fields, excluding the TU
    /// blocks (those sit at their own telegram-relative offsets).
    pub const SCALARS_LEN: usize = 26;

    pub(crate) fn skeleton(tu_count: usize) -> ToBlock {
        ToBlock {
            tu_blocks: vec![TuBlock::default(); tu_count],
            ..ToBlock::default()
        }
    }

    /// Fills this block's scalar fields from `buf` at the given absolute
    /// offset. TU blocks are decoded separately by the telegram decoder.
    pub(crate) fn decode_at(&mut self, buf: &[u8], offset: usize) -> Result<(), DecodeError> {
        let mut window = block_window(buf, offset, Self::SCALARS_LEN)?;

        self.order_number = window.get_u32();
        self.source_position = get_ascii(&mut window, 8);
        self.target_position = get_ascii(&mut window, 8);
        self.transport_kind = window.get_u8();
        self.priority = window.get_u8();

        Ok(())
    }
}

impl TuBlock {
    pub const WIRE_LEN: usize = 34;

    pub(crate) fn decode_at(&mut self, buf: &[u8], offset: usize) -> Result<(), DecodeError> {
        let mut window = block_window(buf, offset, Self::WIRE_LEN)?;

        self.load_unit_id = get_ascii(&mut window, 20);
        self.tu_kind = window.get_u16();
        self.weight_grams = window.get_u32();
        self.height_mm = window.get_u16();
        self.occupied = window.get_u8() != 0;

        Ok(())
    }
}

/// A window of exactly `len` bytes starting at `offset`, so the field reads
/// inside a block cannot run off the end of the buffer.
fn block_window(buf: &[u8], offset: usize, len: usize) -> Result<&[u8], DecodeError> {
    match buf.get(offset..) {
        Some(window) if window.len() >= len => Ok(&window[..len]),
        _ => Err(DecodeError::BufferTooShort {
            offset,
            required: len,
            available: buf.len().saturating_sub(offset),
        }),
    }
}

/// Reads a fixed-width ASCII field, stripping the trailing space / NUL padding.
fn get_ascii(window: &mut impl Buf, len: usize) -> String {
    let mut raw = vec![0u8; len];
    window.copy_to_slice(&mut raw);

    let end = raw.iter()
        .rposition(|&b| b != b' ' && b != 0)
        .map_or(0, |pos| pos + 1);
    String::from_utf8_lossy(&raw[..end]).into_owned()
}
