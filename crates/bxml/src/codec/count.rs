//! Variable-length `Count` encoding.
//!
//! A count is a non-negative integer stored in the narrowest of four forms:
//!
//! | First byte | Form | Total size |
//! |---|---|---|
//! | `0..=239` | the value itself (`SmallNum`) | 1 |
//! | `0xF3` | unsigned 16-bit | 3 |
//! | `0xF4` | signed 32-bit, non-negative | 5 |
//! | `0xF6` | signed 64-bit, non-negative | 9 |
//!
//! Every other first byte is illegal for a count: 0xF0..=0xF2 are reserved,
//! and the remaining codes belong to other value kinds.

use crate::error::{DecodeError, EncodeError};
use crate::io::ByteOrder;

/// Largest value stored inline in a single byte.
pub const MAX_SMALL_NUM: u8 = 239;

/// Selector byte for the 16-bit form.
pub const USHORT_SELECTOR: u8 = 0xF3;

/// Selector byte for the 32-bit form.
pub const INT_SELECTOR: u8 = 0xF4;

/// Selector byte for the 64-bit form.
pub const LONG_SELECTOR: u8 = 0xF6;

/// Largest encodable count.
pub const MAX_COUNT: u64 = i64::MAX as u64;

/// Longest encoded count in bytes.
pub const MAX_ENCODED_LEN: usize = 9;

/// The four representations of a count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountForm {
    /// One byte, 0..=239.
    Small,
    /// Selector + u16.
    UShort,
    /// Selector + i32.
    Int,
    /// Selector + i64.
    Long,
}

impl CountForm {
    /// Chooses the narrowest form able to hold `value`.
    pub fn for_value(value: u64) -> Result<Self, EncodeError> {
        match value {
            0..=239 => Ok(CountForm::Small),
            240..=0xFFFF => Ok(CountForm::UShort),
            0x1_0000..=0x7FFF_FFFF => Ok(CountForm::Int),
            v if v <= MAX_COUNT => Ok(CountForm::Long),
            v => Err(EncodeError::CountOutOfRange { value: v }),
        }
    }

    /// Dispatches on the first byte of an encoded count.
    pub fn from_first_byte(byte: u8) -> Result<Self, DecodeError> {
        match byte {
            0..=MAX_SMALL_NUM => Ok(CountForm::Small),
            USHORT_SELECTOR => Ok(CountForm::UShort),
            INT_SELECTOR => Ok(CountForm::Int),
            LONG_SELECTOR => Ok(CountForm::Long),
            code => Err(DecodeError::InvalidCount { code }),
        }
    }

    /// Total encoded size in bytes, selector included.
    pub fn encoded_len(self) -> usize {
        match self {
            CountForm::Small => 1,
            CountForm::UShort => 3,
            CountForm::Int => 5,
            CountForm::Long => 9,
        }
    }

    /// Number of bytes following the first byte.
    pub fn payload_len(self) -> usize {
        self.encoded_len() - 1
    }
}

/// Returns the encoded size of `value`.
pub fn encoded_len(value: u64) -> Result<usize, EncodeError> {
    CountForm::for_value(value).map(CountForm::encoded_len)
}

/// Encodes `value` into `out`, returning the number of bytes used.
pub fn encode_count(
    value: u64,
    order: ByteOrder,
    out: &mut [u8; MAX_ENCODED_LEN],
) -> Result<usize, EncodeError> {
    let form = CountForm::for_value(value)?;
    match form {
        CountForm::Small => out[0] = value as u8,
        CountForm::UShort => {
            out[0] = USHORT_SELECTOR;
            out[1..3].copy_from_slice(&order.u16_to(value as u16));
        }
        CountForm::Int => {
            out[0] = INT_SELECTOR;
            out[1..5].copy_from_slice(&order.i32_to(value as i32));
        }
        CountForm::Long => {
            out[0] = LONG_SELECTOR;
            out[1..9].copy_from_slice(&order.i64_to(value as i64));
        }
    }
    Ok(form.encoded_len())
}

/// Decodes the payload of a count whose first byte selected `form`.
///
/// `payload` must hold exactly `form.payload_len()` bytes.
pub fn decode_payload(
    first: u8,
    form: CountForm,
    payload: &[u8],
    order: ByteOrder,
) -> Result<u64, DecodeError> {
    let eof = || DecodeError::UnexpectedEof { context: "count" };
    match form {
        CountForm::Small => Ok(u64::from(first)),
        CountForm::UShort => {
            let bytes: [u8; 2] = payload.try_into().map_err(|_| eof())?;
            Ok(u64::from(order.u16_from(bytes)))
        }
        CountForm::Int => {
            let bytes: [u8; 4] = payload.try_into().map_err(|_| eof())?;
            let value = order.i32_from(bytes);
            if value < 0 {
                return Err(DecodeError::NegativeCount {
                    value: i64::from(value),
                });
            }
            Ok(value as u64)
        }
        CountForm::Long => {
            let bytes: [u8; 8] = payload.try_into().map_err(|_| eof())?;
            let value = order.i64_from(bytes);
            if value < 0 {
                return Err(DecodeError::NegativeCount { value });
            }
            Ok(value as u64)
        }
    }
}

/// Decodes a count from the start of `bytes`, returning the value and the
/// number of bytes consumed.
pub fn decode_count(bytes: &[u8], order: ByteOrder) -> Result<(u64, usize), DecodeError> {
    let first = *bytes
        .first()
        .ok_or(DecodeError::UnexpectedEof { context: "count" })?;
    let form = CountForm::from_first_byte(first)?;
    let end = form.encoded_len();
    if bytes.len() < end {
        return Err(DecodeError::UnexpectedEof { context: "count" });
    }
    let value = decode_payload(first, form, &bytes[1..end], order)?;
    Ok((value, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn encode(value: u64, order: ByteOrder) -> Vec<u8> {
        let mut buf = [0u8; MAX_ENCODED_LEN];
        let len = encode_count(value, order, &mut buf).unwrap();
        buf[..len].to_vec()
    }

    #[test]
    fn test_boundaries() {
        assert_eq!(encode(239, ByteOrder::BigEndian), vec![239]);
        assert_eq!(encode(240, ByteOrder::BigEndian), vec![0xF3, 0x00, 0xF0]);
        assert_eq!(encode(65535, ByteOrder::BigEndian).len(), 3);
        assert_eq!(encode(65536, ByteOrder::BigEndian), vec![0xF4, 0, 1, 0, 0]);
        assert_eq!(encode(i32::MAX as u64, ByteOrder::BigEndian).len(), 5);
        assert_eq!(encode(i32::MAX as u64 + 1, ByteOrder::BigEndian).len(), 9);
        assert_eq!(encode(240, ByteOrder::LittleEndian), vec![0xF3, 0xF0, 0x00]);
    }

    #[test]
    fn test_out_of_range() {
        let mut buf = [0u8; MAX_ENCODED_LEN];
        let result = encode_count(u64::MAX, ByteOrder::BigEndian, &mut buf);
        assert!(matches!(result, Err(EncodeError::CountOutOfRange { .. })));
    }

    #[test]
    fn test_reserved_selectors() {
        for code in [0xF0, 0xF1, 0xF2, 0xF5, 0xF7, 0xFA, 0xFF] {
            assert!(matches!(
                CountForm::from_first_byte(code),
                Err(DecodeError::InvalidCount { .. })
            ));
        }
    }

    #[test]
    fn test_negative_payload_rejected() {
        let bytes = [INT_SELECTOR, 0xFF, 0xFF, 0xFF, 0xFF];
        let result = decode_count(&bytes, ByteOrder::BigEndian);
        assert!(matches!(result, Err(DecodeError::NegativeCount { value: -1 })));
    }

    #[test]
    fn test_truncated() {
        let result = decode_count(&[USHORT_SELECTOR, 0x01], ByteOrder::BigEndian);
        assert!(matches!(result, Err(DecodeError::UnexpectedEof { .. })));
        assert!(decode_count(&[], ByteOrder::BigEndian).is_err());
    }

    fn minimal_len(value: u64) -> usize {
        if value <= 239 {
            1
        } else if value <= 0xFFFF {
            3
        } else if value <= i32::MAX as u64 {
            5
        } else {
            9
        }
    }

    proptest! {
        #[test]
        fn prop_count_minimal(value in 0u64..=MAX_COUNT, little in any::<bool>()) {
            let order = if little { ByteOrder::LittleEndian } else { ByteOrder::BigEndian };
            let bytes = encode(value, order);
            prop_assert_eq!(bytes.len(), minimal_len(value));
            let (decoded, used) = decode_count(&bytes, order).unwrap();
            prop_assert_eq!(decoded, value);
            prop_assert_eq!(used, bytes.len());
        }

        #[test]
        fn prop_small_counts(value in 0u64..1024) {
            let bytes = encode(value, ByteOrder::BigEndian);
            prop_assert_eq!(decode_count(&bytes, ByteOrder::BigEndian).unwrap().0, value);
        }
    }
}
