//! Buffered, endian-aware byte I/O underneath the token codec.
//!
//! - [`ByteReader`] reads from a [`Source`]: a plain stream, an in-memory
//!   buffer, or a memory-mapped file (the last two support random access).
//! - [`ByteWriter`] writes to any `std::io::Write`, with a rewindable buffer
//!   used to patch element tokens in place.
//! - [`BufferPool`] recycles scratch buffers between streams.

pub mod buffer;
pub mod reader;
pub mod source;
pub mod writer;

pub use buffer::{BufferPool, PooledBuffer};
pub use reader::ByteReader;
pub use source::Source;
pub use writer::ByteWriter;

/// Byte order of multi-byte numbers on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ByteOrder {
    /// Most significant byte first (the format default).
    #[default]
    BigEndian,
    /// Least significant byte first.
    LittleEndian,
}

impl ByteOrder {
    /// Byte order of the running platform.
    pub fn native() -> Self {
        if cfg!(target_endian = "little") {
            ByteOrder::LittleEndian
        } else {
            ByteOrder::BigEndian
        }
    }
}

macro_rules! order_codec {
    ($($ty:ty => $from:ident, $to:ident);* $(;)?) => {
        impl ByteOrder {
            $(
                #[inline]
                pub(crate) fn $from(self, bytes: [u8; std::mem::size_of::<$ty>()]) -> $ty {
                    match self {
                        ByteOrder::BigEndian => <$ty>::from_be_bytes(bytes),
                        ByteOrder::LittleEndian => <$ty>::from_le_bytes(bytes),
                    }
                }

                #[inline]
                pub(crate) fn $to(self, value: $ty) -> [u8; std::mem::size_of::<$ty>()] {
                    match self {
                        ByteOrder::BigEndian => value.to_be_bytes(),
                        ByteOrder::LittleEndian => value.to_le_bytes(),
                    }
                }
            )*
        }
    };
}

order_codec! {
    i16 => i16_from, i16_to;
    u16 => u16_from, u16_to;
    i32 => i32_from, i32_to;
    i64 => i64_from, i64_to;
    f32 => f32_from, f32_to;
    f64 => f64_from, f64_to;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_codec() {
        assert_eq!(ByteOrder::BigEndian.i32_to(1), [0, 0, 0, 1]);
        assert_eq!(ByteOrder::LittleEndian.i32_to(1), [1, 0, 0, 0]);
        assert_eq!(ByteOrder::BigEndian.u16_from([0x12, 0x34]), 0x1234);
        assert_eq!(ByteOrder::LittleEndian.u16_from([0x12, 0x34]), 0x3412);
        let bits = ByteOrder::LittleEndian.f64_to(2.5);
        assert_eq!(ByteOrder::LittleEndian.f64_from(bits), 2.5);
    }
}
