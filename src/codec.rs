//! Boundary adapters for the fixed-point types.
//!
//! Across the boundary a number is either a 256-bit big-endian integer
//! (unsigned as-is, signed as two's complement) or an 18-decimal string.
//! Serde uses the string form; everything round-trips exactly.

use std::fmt;
use std::str::FromStr;

use primitive_types::U256;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};
use crate::fixed_point::{IFixed, UFixed, DECIMALS, SCALE};

/// Most negative magnitude representable in 256-bit two's complement: 2^255.
const TWOS_COMPLEMENT_MIN_MAG: U256 = U256([0, 0, 0, 0x8000_0000_0000_0000]);

pub fn encode_unsigned(value: UFixed) -> [u8; 32] {
    value.raw().to_big_endian()
}

pub fn decode_unsigned(bytes: &[u8; 32]) -> UFixed {
    UFixed::from_raw(U256::from_big_endian(bytes))
}

/// Two's-complement encoding. Fails with `Overflow` for magnitudes outside
/// the signed 256-bit range.
pub fn encode_signed(value: IFixed) -> Result<[u8; 32]> {
    let mag = value.abs().raw();
    if value.is_negative() {
        if mag > TWOS_COMPLEMENT_MIN_MAG {
            return Err(Error::Overflow);
        }
        Ok(((!mag).overflowing_add(U256::one()).0).to_big_endian())
    } else {
        if mag >= TWOS_COMPLEMENT_MIN_MAG {
            return Err(Error::Overflow);
        }
        Ok(mag.to_big_endian())
    }
}

pub fn decode_signed(bytes: &[u8; 32]) -> IFixed {
    let raw = U256::from_big_endian(bytes);
    if raw.bit(255) {
        let mag = (!raw).overflowing_add(U256::one()).0;
        IFixed::from_parts(true, UFixed::from_raw(mag))
    } else {
        IFixed::from_parts(false, UFixed::from_raw(raw))
    }
}

// ---------------------------------------------------------------------------
// Decimal strings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseFixedError {
    #[error("empty or malformed number")]
    Malformed,
    #[error("more than {DECIMALS} fractional digits")]
    TooManyDecimals,
    #[error("value out of range")]
    OutOfRange,
    #[error("negative value for an unsigned type")]
    Negative,
}

fn fmt_raw(raw: U256, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let int = raw / SCALE;
    let frac = raw % SCALE;
    if frac.is_zero() {
        return write!(f, "{int}");
    }
    let digits = format!("{:018}", frac.low_u128());
    write!(f, "{int}.{}", digits.trim_end_matches('0'))
}

fn parse_raw(input: &str) -> std::result::Result<U256, ParseFixedError> {
    let (int_part, frac_part) = match input.split_once('.') {
        Some((i, fr)) => (i, fr),
        None => (input, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(ParseFixedError::Malformed);
    }
    if frac_part.len() > DECIMALS as usize {
        return Err(ParseFixedError::TooManyDecimals);
    }
    let int = if int_part.is_empty() {
        U256::zero()
    } else {
        U256::from_dec_str(int_part).map_err(|_| ParseFixedError::Malformed)?
    };
    let mut frac = if frac_part.is_empty() {
        U256::zero()
    } else {
        U256::from_dec_str(frac_part).map_err(|_| ParseFixedError::Malformed)?
    };
    for _ in 0..(DECIMALS as usize - frac_part.len()) {
        frac = frac * U256::from(10u8);
    }
    int.checked_mul(SCALE)
        .and_then(|scaled| scaled.checked_add(frac))
        .ok_or(ParseFixedError::OutOfRange)
}

impl fmt::Display for UFixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_raw(self.raw(), f)
    }
}

impl fmt::Debug for UFixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for IFixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_negative() {
            write!(f, "-")?;
        }
        fmt_raw(self.abs().raw(), f)
    }
}

impl fmt::Debug for IFixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for UFixed {
    type Err = ParseFixedError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if let Some(rest) = s.strip_prefix('-') {
            // "-0" is the only tolerated negative spelling.
            return match parse_raw(rest) {
                Ok(raw) if raw.is_zero() => Ok(UFixed::ZERO),
                Ok(_) => Err(ParseFixedError::Negative),
                Err(e) => Err(e),
            };
        }
        parse_raw(s).map(UFixed::from_raw)
    }
}

impl FromStr for IFixed {
    type Err = ParseFixedError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let raw = parse_raw(digits)?;
        Ok(IFixed::from_parts(negative, UFixed::from_raw(raw)))
    }
}

// ---------------------------------------------------------------------------
// Serde (decimal-string form)
// ---------------------------------------------------------------------------

impl Serialize for UFixed {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for UFixed {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

impl Serialize for IFixed {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for IFixed {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed_point::SCALE_U128;

    fn u(raw: u128) -> UFixed {
        UFixed::from_raw(U256::from(raw))
    }

    fn s(raw: i128) -> IFixed {
        IFixed::from_parts(raw < 0, u(raw.unsigned_abs()))
    }

    #[test]
    fn unsigned_bytes_round_trip() {
        for v in [UFixed::ZERO, UFixed::ONE, u(123_456_789), UFixed::from_int(u64::MAX)] {
            assert_eq!(decode_unsigned(&encode_unsigned(v)), v);
        }
    }

    #[test]
    fn signed_bytes_round_trip() {
        for v in [
            IFixed::ZERO,
            s(1),
            s(-1),
            s(SCALE_U128 as i128),
            s(-(SCALE_U128 as i128)),
            s(-123_456_789_987_654_321),
        ] {
            assert_eq!(decode_signed(&encode_signed(v).unwrap()), v);
        }
    }

    #[test]
    fn negative_one_unit_is_all_ones_prefix() {
        // -1 raw unit in two's complement is 0xFF...FF.
        let bytes = encode_signed(s(-1)).unwrap();
        assert!(bytes.iter().all(|b| *b == 0xFF));
    }

    #[test]
    fn signed_encode_range_limits() {
        let too_big = IFixed::from_parts(false, UFixed::from_raw(TWOS_COMPLEMENT_MIN_MAG));
        assert_eq!(encode_signed(too_big), Err(Error::Overflow));
        // 2^255 is representable only as a negative.
        let min = IFixed::from_parts(true, UFixed::from_raw(TWOS_COMPLEMENT_MIN_MAG));
        assert_eq!(decode_signed(&encode_signed(min).unwrap()), min);
    }

    #[test]
    fn display_trims_trailing_zeros() {
        assert_eq!(u(1_500_000_000_000_000_000).to_string(), "1.5");
        assert_eq!(UFixed::from_int(42).to_string(), "42");
        assert_eq!(u(1).to_string(), "0.000000000000000001");
        assert_eq!(s(-2_500_000_000_000_000_000).to_string(), "-2.5");
        assert_eq!(IFixed::ZERO.to_string(), "0");
    }

    #[test]
    fn parse_round_trips_display() {
        for text in ["0", "1.5", "42", "0.000000000000000001", "123456.789"] {
            let v: UFixed = text.parse().unwrap();
            assert_eq!(v.to_string(), text);
        }
        for text in ["-1.5", "-0.25", "3.14159"] {
            let v: IFixed = text.parse().unwrap();
            assert_eq!(v.to_string(), text);
        }
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("".parse::<UFixed>().is_err());
        assert!(".".parse::<UFixed>().is_err());
        assert!("abc".parse::<UFixed>().is_err());
        assert!("1.2.3".parse::<UFixed>().is_err());
        assert_eq!(
            "0.0000000000000000001".parse::<UFixed>(),
            Err(ParseFixedError::TooManyDecimals)
        );
        assert_eq!("-1".parse::<UFixed>(), Err(ParseFixedError::Negative));
        assert_eq!("-0".parse::<UFixed>(), Ok(UFixed::ZERO));
    }

    #[test]
    fn serde_uses_decimal_strings() {
        let v = s(-1_250_000_000_000_000_000);
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, "\"-1.25\"");
        let back: IFixed = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);

        let v = u(1_250_000_000_000_000_000);
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, "\"1.25\"");
        let back: UFixed = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
    }
}
