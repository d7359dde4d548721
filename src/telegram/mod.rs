pub mod blocks;
pub mod decoder;
pub mod geometry;

use crate::telegram::blocks::ToBlock;
use crate::telegram::geometry::TelegramGeometry;

/// Length of the header common to all telegram subtypes. The subtype code sits
/// at offset 0 within the header.
pub const HEADER_LEN: usize = 16;

/// One complete decoded telegram.
///
/// The number of TO blocks (and of TU blocks inside each of them) is fixed by
/// the subtype's geometry when the skeleton is allocated; decoding only ever
/// fills fields in, it never grows the structure.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Telegram {
    pub subtype: u16,
    pub serial: u32,
    pub ack_serial: u32,
    pub to_blocks: Vec<ToBlock>,
}

impl Telegram {
    pub(crate) fn skeleton(subtype: u16, geometry: &TelegramGeometry) -> Telegram {
        Telegram {
            subtype,
            serial: 0,
            ack_serial: 0,
            to_blocks: geometry.to_blocks.iter()
                .map(|to_geometry| ToBlock::skeleton(to_geometry.tu_offsets.len()))
                .collect(),
        }
    }
}
