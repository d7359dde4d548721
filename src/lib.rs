//! Control link between a warehouse field controller and its supervisory system.
//!
//! The supervisory system and the field controller exchange fixed-layout binary
//! *telegrams* over one persistent TCP connection. This crate covers the two parts
//! of that link where getting it wrong is expensive:
//!
//! * decoding telegrams: a byte buffer at a given offset is mapped into a typed,
//!   nested record. The exact layout depends on a subtype code discovered at
//!   runtime; per-subtype geometry (block counts and byte offsets) lives in a
//!   data-driven registry, so adding a subtype means adding a table row, not code.
//! * establishing the connection: a blocking connect task that retries forever
//!   against transport failure, with a configurable delay between attempts, and
//!   that can be cancelled promptly and safely from another thread - including
//!   while the worker is stuck inside a connect call with no native timeout.
//!
//! Telegram encoding, the full subtype catalog and the worker pool the connect
//! task runs on are deliberately out of scope; the pool is consumed through a
//! submit-a-callable contract only.
//!
//! ## Telegram layout
//!
//! All integers are big-endian, all text fields are fixed-width ASCII padded with
//! trailing spaces or NULs. All offsets are relative to the telegram's base offset
//! in the enclosing buffer - block offsets are *not* chained from the previous
//! block, gaps between blocks are reserved space.
//!
//! Header (16 bytes, common to all subtypes):
//! ```ascii
//! 0:  subtype code (u16)
//! 2:  telegram serial (u32)
//! 6:  acknowledged serial (u32)
//! 10: reserved (6 bytes)
//! ```
//!
//! Subtype 1020 (one transport order carrying two load units, 110 bytes total):
//! ```ascii
//! 16: TO block - order number (u32)
//! 20:            source position (8 bytes ASCII)
//! 28:            target position (8 bytes ASCII)
//! 36:            transport kind (u8)
//! 37:            priority (u8)
//! 38:            reserved (4 bytes)
//! 42: first TU block  (34 bytes, layout below)
//! 76: second TU block (34 bytes)
//! ```
//!
//! TU block (34 bytes, offsets relative to the block):
//! ```ascii
//! 0:  load unit id (20 bytes ASCII)
//! 20: tu kind (u16)
//! 22: weight (u32, grams)
//! 26: height (u16, millimetres)
//! 28: occupied flag (u8)
//! 29: reserved (5 bytes)
//! ```

pub mod config;
pub mod connect;
pub mod receiver;
pub mod telegram;

#[cfg(test)]
mod test {
    use tracing::Level;

    #[ctor::ctor]
    fn init_test_logging() {
        tracing_subscriber::fmt()
            .with_max_level(Level::TRACE)
            .try_init()
            .ok();
    }
}
