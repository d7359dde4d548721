use std::io::Read;

use anyhow::bail;
#[cfg(test)] use mockall::automock;
use tracing::{debug, trace};

use crate::telegram::decoder::TelegramDecoder;
use crate::telegram::{Telegram, HEADER_LEN};

/// Where decoded telegrams go. Implemented by the business logic behind the
/// link.
#[cfg_attr(test, automock)]
pub trait TelegramHandler: Send + Sync {
    fn on_telegram(&self, telegram: Telegram);
}

/// Pulls telegrams off a connected transport and dispatches them.
///
/// The wire protocol is length-implicit: nothing on the wire says how long a
/// telegram is. The header names the subtype, and the subtype's registered
/// geometry names the length, so the receiver reads the fixed-size header
/// first and sizes the rest of the read from the geometry table.
pub struct TelegramReceiver {
    decoder: TelegramDecoder,
}

impl TelegramReceiver {
    pub fn new(decoder: TelegramDecoder) -> TelegramReceiver {
        TelegramReceiver { decoder }
    }

    /// Reads and dispatches telegrams until the peer closes the connection
    /// (clean termination) or the stream turns out to be unusable.
    ///
    /// A decode failure is not recoverable here: with an unknown subtype the
    /// telegram's length is unknown too, so there is no way to resync within
    /// the stream. The error is returned and the caller drops the connection.
    pub fn receive_loop(&self, reader: &mut impl Read, handler: &dyn TelegramHandler) -> anyhow::Result<()> {
        let mut header = [0u8; HEADER_LEN];
        loop {
            if !read_or_clean_eof(reader, &mut header)? {
                debug!("peer closed the connection");
                return Ok(());
            }

            let subtype = u16::from_be_bytes([header[0], header[1]]);
            let telegram_len = self.decoder.expected_len(subtype)?;

            let mut telegram_buf = vec![0u8; telegram_len];
            telegram_buf[..HEADER_LEN].copy_from_slice(&header);
            reader.read_exact(&mut telegram_buf[HEADER_LEN..])?;

            let telegram = self.decoder.decode(&telegram_buf, 0)?;
            trace!("received telegram subtype={} serial={}", telegram.subtype, telegram.serial);
            handler.on_telegram(telegram);
        }
    }
}

/// Fills `buf` completely. Returns `false` on EOF *before the first byte* -
/// the clean end of the stream; EOF in the middle of the buffer is an error.
fn read_or_clean_eof(reader: &mut impl Read, buf: &mut [u8]) -> anyhow::Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            if filled == 0 {
                return Ok(false);
            }
            bail!("connection closed mid-telegram, {} of {} header bytes read", filled, buf.len());
        }
        filled += n;
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::telegram::decoder::DecodeError;
    use crate::telegram::geometry::SUBTYPE_TRANSPORT_ORDER;

    fn transport_order_bytes(serial: u32) -> Vec<u8> {
        let mut buf = vec![0u8; 110];
        buf[0..2].copy_from_slice(&SUBTYPE_TRANSPORT_ORDER.to_be_bytes());
        buf[2..6].copy_from_slice(&serial.to_be_bytes());
        buf[20..28].copy_from_slice(b"A01-01-1");
        buf[42..48].copy_from_slice(b"LU0001");
        buf[76..82].copy_from_slice(b"LU0002");
        buf
    }

    #[test]
    fn test_receives_consecutive_telegrams_until_eof() {
        let mut stream = transport_order_bytes(41);
        stream.extend(transport_order_bytes(42));
        let mut reader = Cursor::new(stream);

        let mut handler = MockTelegramHandler::new();
        let mut seq = mockall::Sequence::new();
        for expected_serial in [41u32, 42] {
            handler.expect_on_telegram()
                .times(1)
                .in_sequence(&mut seq)
                .withf(move |telegram| {
                    telegram.subtype == SUBTYPE_TRANSPORT_ORDER && telegram.serial == expected_serial
                })
                .return_const(());
        }

        let receiver = TelegramReceiver::new(TelegramDecoder::standard());
        receiver.receive_loop(&mut reader, &handler).unwrap();
    }

    #[test]
    fn test_unknown_subtype_terminates_the_loop() {
        let mut stream = transport_order_bytes(1);
        stream[0..2].copy_from_slice(&9999u16.to_be_bytes());
        let mut reader = Cursor::new(stream);

        let handler = MockTelegramHandler::new();
        let receiver = TelegramReceiver::new(TelegramDecoder::standard());

        let error = receiver.receive_loop(&mut reader, &handler).unwrap_err();
        assert_eq!(
            error.downcast::<DecodeError>().unwrap(),
            DecodeError::UnknownSubtype { subtype: 9999 },
        );
    }

    #[test]
    fn test_eof_mid_telegram_is_an_error() {
        let stream = transport_order_bytes(1)[..60].to_vec();
        let mut reader = Cursor::new(stream);

        let handler = MockTelegramHandler::new();
        let receiver = TelegramReceiver::new(TelegramDecoder::standard());

        assert!(receiver.receive_loop(&mut reader, &handler).is_err());
    }

    #[test]
    fn test_eof_mid_header_is_an_error() {
        let stream = transport_order_bytes(1)[..7].to_vec();
        let mut reader = Cursor::new(stream);

        let handler = MockTelegramHandler::new();
        let receiver = TelegramReceiver::new(TelegramDecoder::standard());

        assert!(receiver.receive_loop(&mut reader, &handler).is_err());
    }

    #[test]
    fn test_empty_stream_terminates_cleanly() {
        let mut reader = Cursor::new(Vec::new());

        let handler = MockTelegramHandler::new();
        let receiver = TelegramReceiver::new(TelegramDecoder::standard());

        receiver.receive_loop(&mut reader, &handler).unwrap();
    }
}
