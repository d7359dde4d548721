use bytes_varint::try_get_fixed::TryGetFixedSupport;
use tracing::trace;

use crate::telegram::geometry::GeometryRegistry;
use crate::telegram::{Telegram, HEADER_LEN};

/// A telegram that cannot be decoded is never retried - the caller has to drop
/// or resync the stream. These errors say exactly which check failed.
#[derive(Debug, Eq, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("unrecognized telegram subtype {subtype}")]
    UnknownSubtype { subtype: u16 },

    #[error("buffer too short: need {required} bytes at offset {offset}, {available} available")]
    BufferTooShort {
        offset: usize,
        required: usize,
        available: usize,
    },
}

/// Decodes telegrams out of a byte buffer, dispatching on the subtype code in
/// the header and on the geometry registered for it.
pub struct TelegramDecoder {
    registry: GeometryRegistry,
}

impl TelegramDecoder {
    pub fn new(registry: GeometryRegistry) -> TelegramDecoder {
        TelegramDecoder { registry }
    }

    pub fn standard() -> TelegramDecoder {
        TelegramDecoder::new(GeometryRegistry::standard())
    }

    /// The full wire length of a telegram with the given subtype. This is what
    /// makes the length-implicit protocol readable from a stream: the header
    /// names the subtype, the subtype's geometry names the length.
    pub fn expected_len(&self, subtype: u16) -> Result<usize, DecodeError> {
        match self.registry.get(subtype) {
            Some(geometry) => Ok(geometry.telegram_len),
            None => Err(DecodeError::UnknownSubtype { subtype }),
        }
    }

    /// Decodes the telegram starting at `base_offset` within `buf`.
    ///
    /// The structure of the result is fixed before any field is read: the
    /// skeleton is allocated with exactly the block counts the geometry
    /// declares, and decoding the blocks is a pure fill step at the offsets
    /// the geometry prescribes. `buf` is never mutated.
    pub fn decode(&self, buf: &[u8], base_offset: usize) -> Result<Telegram, DecodeError> {
        let header_short = |available: usize| DecodeError::BufferTooShort {
            offset: base_offset,
            required: HEADER_LEN,
            available,
        };
        let available = buf.len().saturating_sub(base_offset);

        let mut header = buf.get(base_offset..).unwrap_or(&[]);
        let subtype = header.try_get_u16().map_err(|_| header_short(available))?;

        let geometry = match self.registry.get(subtype) {
            Some(geometry) => geometry,
            None => return Err(DecodeError::UnknownSubtype { subtype }),
        };
        if available < geometry.telegram_len {
            return Err(DecodeError::BufferTooShort {
                offset: base_offset,
                required: geometry.telegram_len,
                available,
            });
        }

        let mut telegram = Telegram::skeleton(subtype, geometry);
        telegram.serial = header.try_get_u32().map_err(|_| header_short(available))?;
        telegram.ack_serial = header.try_get_u32().map_err(|_| header_short(available))?;

        for (to_block, to_geometry) in telegram.to_blocks.iter_mut().zip(&geometry.to_blocks) {
            to_block.decode_at(buf, base_offset + to_geometry.offset)?;

            // TU offsets are telegram-relative, same as the TO offset
            for (tu_block, &tu_offset) in to_block.tu_blocks.iter_mut().zip(&to_geometry.tu_offsets) {
                tu_block.decode_at(buf, base_offset + tu_offset)?;
            }
        }

        trace!("decoded telegram subtype={} serial={}", telegram.subtype, telegram.serial);
        Ok(telegram)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use super::*;
    use crate::telegram::geometry::SUBTYPE_TRANSPORT_ORDER;

    /// A well-formed subtype 1020 telegram, starting at `base_offset` within
    /// the returned buffer.
    fn transport_order_telegram(base_offset: usize) -> Vec<u8> {
        let mut buf = vec![0u8; base_offset + 110];
        let t = &mut buf[base_offset..];

        t[0..2].copy_from_slice(&SUBTYPE_TRANSPORT_ORDER.to_be_bytes());
        t[2..6].copy_from_slice(&1234u32.to_be_bytes());
        t[6..10].copy_from_slice(&1230u32.to_be_bytes());

        t[16..20].copy_from_slice(&555_001u32.to_be_bytes());
        t[20..28].copy_from_slice(b"A03-17-1");
        t[28..36].copy_from_slice(b"SHIP-02 ");
        t[36] = 1;
        t[37] = 5;

        t[42..62].copy_from_slice(b"00000000001234567890");
        t[62..64].copy_from_slice(&3u16.to_be_bytes());
        t[64..68].copy_from_slice(&18_000u32.to_be_bytes());
        t[68..70].copy_from_slice(&600u16.to_be_bytes());
        t[70] = 1;

        t[76..96].copy_from_slice(b"00000000009876543210");
        t[96..98].copy_from_slice(&3u16.to_be_bytes());
        t[98..102].copy_from_slice(&0u32.to_be_bytes());
        t[102..104].copy_from_slice(&600u16.to_be_bytes());
        t[104] = 0;

        buf
    }

    #[rstest]
    #[case::at_start(0)]
    #[case::mid_buffer(23)]
    fn test_decode_transport_order(#[case] base_offset: usize) {
        let buf = transport_order_telegram(base_offset);

        let telegram = TelegramDecoder::standard().decode(&buf, base_offset).unwrap();

        assert_eq!(telegram.subtype, SUBTYPE_TRANSPORT_ORDER);
        assert_eq!(telegram.serial, 1234);
        assert_eq!(telegram.ack_serial, 1230);
        assert_eq!(telegram.to_blocks.len(), 1);

        let to_block = &telegram.to_blocks[0];
        assert_eq!(to_block.order_number, 555_001);
        assert_eq!(to_block.source_position, "A03-17-1");
        assert_eq!(to_block.target_position, "SHIP-02");
        assert_eq!(to_block.transport_kind, 1);
        assert_eq!(to_block.priority, 5);
        assert_eq!(to_block.tu_blocks.len(), 2);

        assert_eq!(to_block.tu_blocks[0].load_unit_id, "00000000001234567890");
        assert_eq!(to_block.tu_blocks[0].tu_kind, 3);
        assert_eq!(to_block.tu_blocks[0].weight_grams, 18_000);
        assert_eq!(to_block.tu_blocks[0].height_mm, 600);
        assert!(to_block.tu_blocks[0].occupied);

        assert_eq!(to_block.tu_blocks[1].load_unit_id, "00000000009876543210");
        assert_eq!(to_block.tu_blocks[1].weight_grams, 0);
        assert!(!to_block.tu_blocks[1].occupied);
    }

    #[test]
    fn test_decode_unknown_subtype() {
        let mut buf = transport_order_telegram(0);
        buf[0..2].copy_from_slice(&4711u16.to_be_bytes());

        let result = TelegramDecoder::standard().decode(&buf, 0);

        assert_eq!(result, Err(DecodeError::UnknownSubtype { subtype: 4711 }));
    }

    #[test]
    fn test_decode_buffer_shorter_than_geometry() {
        let buf = transport_order_telegram(0);

        let result = TelegramDecoder::standard().decode(&buf[..80], 0);

        assert_eq!(result, Err(DecodeError::BufferTooShort {
            offset: 0,
            required: 110,
            available: 80,
        }));
    }

    #[rstest]
    #[case::empty(0)]
    #[case::single_byte(1)]
    fn test_decode_header_truncated(#[case] len: usize) {
        let buf = transport_order_telegram(0);

        let result = TelegramDecoder::standard().decode(&buf[..len], 0);

        assert_eq!(result, Err(DecodeError::BufferTooShort {
            offset: 0,
            required: HEADER_LEN,
            available: len,
        }));
    }

    #[test]
    fn test_decode_base_offset_past_end() {
        let buf = transport_order_telegram(0);

        let result = TelegramDecoder::standard().decode(&buf, 500);

        assert_eq!(result, Err(DecodeError::BufferTooShort {
            offset: 500,
            required: HEADER_LEN,
            available: 0,
        }));
    }

    #[test]
    fn test_decode_does_not_mutate_input() {
        let buf = transport_order_telegram(0);
        let pristine = buf.clone();

        TelegramDecoder::standard().decode(&buf, 0).unwrap();

        assert_eq!(buf, pristine);
    }
}
