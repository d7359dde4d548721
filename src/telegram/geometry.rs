use anyhow::bail;
use rustc_hash::FxHashMap;
use tracing::warn;

use crate::telegram::blocks::{ToBlock, TuBlock};
use crate::telegram::HEADER_LEN;

/// Subtype code for a telegram carrying a single transport order with two
/// load units.
pub const SUBTYPE_TRANSPORT_ORDER: u16 = 1020;

/// Byte geometry of one telegram subtype: how long the telegram is, where its
/// TO blocks start, and where each TO block's TU blocks start.
///
/// All offsets are relative to the telegram's base offset, *including* the TU
/// offsets - they are not relative to their enclosing TO block, and they must
/// never be derived arithmetically from block sizes. The observed layouts have
/// reserved gaps between blocks, so every block's position is stored
/// explicitly.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TelegramGeometry {
    pub telegram_len: usize,
    pub to_blocks: Vec<ToBlockGeometry>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ToBlockGeometry {
    pub offset: usize,
    pub tu_offsets: Vec<usize>,
}

impl TelegramGeometry {
    fn validate(&self) -> anyhow::Result<()> {
        if self.telegram_len < HEADER_LEN {
            bail!("telegram length {} is shorter than the {} byte header", self.telegram_len, HEADER_LEN);
        }
        for to_geometry in &self.to_blocks {
            if to_geometry.offset < HEADER_LEN {
                bail!("TO block at offset {} overlaps the telegram header", to_geometry.offset);
            }
            if to_geometry.offset + ToBlock::SCALARS_LEN > self.telegram_len {
                bail!("TO block at offset {} overruns the telegram length {}", to_geometry.offset, self.telegram_len);
            }
            for &tu_offset in &to_geometry.tu_offsets {
                if tu_offset + TuBlock::WIRE_LEN > self.telegram_len {
                    bail!("TU block at offset {} overruns the telegram length {}", tu_offset, self.telegram_len);
                }
            }
        }
        Ok(())
    }
}

/// The lookup table from subtype code to geometry. Populated once at start-up;
/// the decoder only ever reads it.
#[derive(Debug, Default)]
pub struct GeometryRegistry {
    geometries: FxHashMap<u16, TelegramGeometry>,
}

impl GeometryRegistry {
    pub fn empty() -> GeometryRegistry {
        GeometryRegistry {
            geometries: FxHashMap::default(),
        }
    }

    /// The registry with all subtypes this controller speaks.
    pub fn standard() -> GeometryRegistry {
        let mut registry = GeometryRegistry::empty();
        registry.register(SUBTYPE_TRANSPORT_ORDER, TelegramGeometry {
            telegram_len: 110,
            to_blocks: vec![
                ToBlockGeometry {
                    offset: 16,
                    tu_offsets: vec![42, 76],
                },
            ],
        })
            .expect("this is a bug: the built-in geometry table should be consistent");
        registry
    }

    pub fn register(&mut self, subtype: u16, geometry: TelegramGeometry) -> anyhow::Result<()> {
        geometry.validate()?;
        if self.geometries.insert(subtype, geometry).is_some() {
            warn!("replacing the registered geometry for telegram subtype {}", subtype);
        }
        Ok(())
    }

    pub fn get(&self, subtype: u16) -> Option<&TelegramGeometry> {
        self.geometries.get(&subtype)
    }
}
