//! 18-decimal fixed-point arithmetic over 256-bit integers.
//!
//! A raw value `v` represents the real number `v / 10^18`. Unsigned values
//! live in [`UFixed`]; signed values in [`IFixed`], stored sign-magnitude
//! internally (the two's-complement wire form is produced by `codec`).
//! Products widen through `U256::full_mul` into 512 bits before rescaling,
//! and every division truncates toward zero, so results are bit-identical
//! across platforms and word sizes.

use primitive_types::{U256, U512};

use crate::error::{Error, Result};

/// Number of decimal places carried by every fixed-point value.
pub const DECIMALS: u32 = 18;

/// `10^18` as a raw `U256` (single limb).
pub const SCALE: U256 = U256([1_000_000_000_000_000_000, 0, 0, 0]);

pub(crate) const SCALE_U128: u128 = 1_000_000_000_000_000_000;

/// `ln(2)` in 18-decimal fixed point.
pub(crate) const LN_2_U128: u128 = 693_147_180_559_945_309;

/// `exp` underflows to zero below `-41`, and is rejected above `+50`.
const EXP_UNDERFLOW_RAW: u128 = 41 * SCALE_U128;
const EXP_OVERFLOW_RAW: u128 = 50 * SCALE_U128;

/// Terms of the Horner-evaluated series for `e^r` on the reduced argument.
const EXP_SERIES_TERMS: u32 = 15;

/// Newton iteration cap for the integer square root.
const SQRT_MAX_ITER: u32 = 64;

fn narrow(value: U512) -> Result<U256> {
    U256::try_from(value).map_err(|_| Error::Overflow)
}

// ---------------------------------------------------------------------------
// Unsigned
// ---------------------------------------------------------------------------

/// Unsigned 18-decimal fixed-point number.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UFixed(U256);

impl UFixed {
    pub const ZERO: UFixed = UFixed(U256([0, 0, 0, 0]));
    pub const ONE: UFixed = UFixed(SCALE);

    pub const fn from_raw(raw: U256) -> Self {
        UFixed(raw)
    }

    /// Whole number of units, e.g. `UFixed::from_int(3)` is 3.0.
    pub fn from_int(n: u64) -> Self {
        UFixed(U256::from(n) * SCALE)
    }

    pub fn raw(self) -> U256 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    pub fn checked_add(self, rhs: Self) -> Result<Self> {
        self.0.checked_add(rhs.0).map(UFixed).ok_or(Error::Overflow)
    }

    /// Subtraction; going below zero is reported as `Overflow`.
    pub fn checked_sub(self, rhs: Self) -> Result<Self> {
        self.0.checked_sub(rhs.0).map(UFixed).ok_or(Error::Overflow)
    }

    pub fn saturating_sub(self, rhs: Self) -> Self {
        UFixed(self.0.saturating_sub(rhs.0))
    }

    /// `(a * b) / 10^18`, widened to 512 bits, truncated toward zero.
    pub fn checked_mul(self, rhs: Self) -> Result<Self> {
        let wide = self.0.full_mul(rhs.0) / U512::from(SCALE);
        narrow(wide).map(UFixed)
    }

    /// `(a * 10^18) / b`, widened to 512 bits, truncated toward zero.
    pub fn checked_div(self, rhs: Self) -> Result<Self> {
        if rhs.0.is_zero() {
            return Err(Error::DivByZero);
        }
        let wide = self.0.full_mul(SCALE) / U512::from(rhs.0);
        narrow(wide).map(UFixed)
    }

    /// Fixed-point square root: `⌊√(raw · 10^18)⌋`.
    pub fn sqrt(self) -> Result<Self> {
        narrow(isqrt(self.0.full_mul(SCALE))).map(UFixed)
    }
}

/// Integer square root by Newton iteration, seeded one bit above the root.
fn isqrt(value: U512) -> U512 {
    if value.is_zero() {
        return U512::zero();
    }
    let mut x = U512::one() << ((value.bits() + 1) / 2);
    let mut y = (x + value / x) >> 1;
    let mut iter = 0;
    while y < x && iter < SQRT_MAX_ITER {
        x = y;
        y = (x + value / x) >> 1;
        iter += 1;
    }
    x
}

// ---------------------------------------------------------------------------
// Signed
// ---------------------------------------------------------------------------

/// Signed 18-decimal fixed-point number, sign-magnitude.
///
/// Invariant: zero is never negative, so derived equality is sound.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct IFixed {
    negative: bool,
    mag: U256,
}

impl IFixed {
    pub const ZERO: IFixed = IFixed { negative: false, mag: U256([0, 0, 0, 0]) };
    pub const ONE: IFixed = IFixed { negative: false, mag: SCALE };

    pub fn from_parts(negative: bool, mag: UFixed) -> Self {
        IFixed { negative: negative && !mag.is_zero(), mag: mag.raw() }
    }

    pub fn from_int(n: i64) -> Self {
        Self::from_parts(n < 0, UFixed::from_int(n.unsigned_abs()))
    }

    pub fn is_zero(self) -> bool {
        self.mag.is_zero()
    }

    pub fn is_negative(self) -> bool {
        self.negative
    }

    /// Magnitude as an unsigned value.
    pub fn abs(self) -> UFixed {
        UFixed(self.mag)
    }

    pub fn neg(self) -> Self {
        Self::from_parts(!self.negative, UFixed(self.mag))
    }

    pub fn checked_add(self, rhs: Self) -> Result<Self> {
        if self.negative == rhs.negative {
            let mag = self.mag.checked_add(rhs.mag).ok_or(Error::Overflow)?;
            Ok(Self::from_parts(self.negative, UFixed(mag)))
        } else if self.mag >= rhs.mag {
            Ok(Self::from_parts(self.negative, UFixed(self.mag - rhs.mag)))
        } else {
            Ok(Self::from_parts(rhs.negative, UFixed(rhs.mag - self.mag)))
        }
    }

    pub fn checked_sub(self, rhs: Self) -> Result<Self> {
        self.checked_add(rhs.neg())
    }

    pub fn checked_mul(self, rhs: Self) -> Result<Self> {
        let mag = UFixed(self.mag).checked_mul(UFixed(rhs.mag))?;
        Ok(Self::from_parts(self.negative ^ rhs.negative, mag))
    }

    pub fn checked_div(self, rhs: Self) -> Result<Self> {
        let mag = UFixed(self.mag).checked_div(UFixed(rhs.mag))?;
        Ok(Self::from_parts(self.negative ^ rhs.negative, mag))
    }

    /// Square root of a non-negative value; negative inputs fail.
    pub fn sqrt(self) -> Result<UFixed> {
        if self.negative {
            return Err(Error::NegativeSqrt);
        }
        UFixed(self.mag).sqrt()
    }

    /// Divide the magnitude by a small positive integer, truncating.
    fn div_int(self, n: u32) -> Self {
        Self::from_parts(self.negative, UFixed(self.mag / U256::from(n)))
    }

    /// Natural exponential.
    ///
    /// Defined on `[-41, +50]` (in units, i.e. raw `[-41·10^18, +50·10^18]`).
    /// Inputs below the domain underflow to zero; inputs above it fail with
    /// `ExpInputTooLarge`. Computed as `e^s = 2^n · e^r` with
    /// `s = n·ln2 + r`, `r ∈ [-ln2/2, +ln2/2]`, and a 15-term Horner series
    /// for `e^r`; negative arguments go through the reciprocal.
    pub fn exp(self) -> Result<UFixed> {
        if self.negative && self.mag > U256::from(EXP_UNDERFLOW_RAW) {
            return Ok(UFixed::ZERO);
        }
        if !self.negative && self.mag > U256::from(EXP_OVERFLOW_RAW) {
            return Err(Error::ExpInputTooLarge);
        }

        // |s| ≤ 50 so the magnitude fits in 128 bits.
        let a = self.mag.low_u128();
        let n = ((a + LN_2_U128 / 2) / LN_2_U128) as u32;
        let n_ln2 = u128::from(n) * LN_2_U128;
        let r = if a >= n_ln2 {
            IFixed::from_parts(false, UFixed(U256::from(a - n_ln2)))
        } else {
            IFixed::from_parts(true, UFixed(U256::from(n_ln2 - a)))
        };

        // Horner: e^r = (((r/15 + 1)·r/14 + 1)···)·r/1 + 1
        let mut acc = IFixed::ONE;
        for i in (1..=EXP_SERIES_TERMS).rev() {
            acc = acc.checked_mul(r)?.div_int(i).checked_add(IFixed::ONE)?;
        }
        // e^r ≥ e^(-ln2/2) > 0, so the accumulator is strictly positive.
        let exp_abs = UFixed(acc.abs().raw() << n);

        if self.negative {
            UFixed::ONE.checked_div(exp_abs)
        } else {
            Ok(exp_abs)
        }
    }
}

impl From<UFixed> for IFixed {
    fn from(value: UFixed) -> Self {
        IFixed { negative: false, mag: value.raw() }
    }
}

impl Ord for IFixed {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use std::cmp::Ordering;
        match (self.negative, other.negative) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => self.mag.cmp(&other.mag),
            (true, true) => other.mag.cmp(&self.mag),
        }
    }
}

impl PartialOrd for IFixed {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn u(raw: u128) -> UFixed {
        UFixed::from_raw(U256::from(raw))
    }

    fn s(raw: i128) -> IFixed {
        IFixed::from_parts(raw < 0, u(raw.unsigned_abs()))
    }

    fn to_f64(v: UFixed) -> f64 {
        v.raw().low_u128() as f64 / SCALE_U128 as f64
    }

    #[test]
    fn mul_basic() {
        // 1.5 * 2.0 = 3.0
        let r = u(1_500_000_000_000_000_000).checked_mul(u(2_000_000_000_000_000_000)).unwrap();
        assert_eq!(r, u(3_000_000_000_000_000_000));
    }

    #[test]
    fn div_basic() {
        // 3.0 / 2.0 = 1.5
        let r = u(3_000_000_000_000_000_000).checked_div(u(2_000_000_000_000_000_000)).unwrap();
        assert_eq!(r, u(1_500_000_000_000_000_000));
    }

    #[test]
    fn div_by_zero_rejected() {
        assert_eq!(UFixed::ONE.checked_div(UFixed::ZERO), Err(Error::DivByZero));
    }

    #[test]
    fn sub_below_zero_rejected() {
        assert_eq!(UFixed::ZERO.checked_sub(UFixed::ONE), Err(Error::Overflow));
    }

    #[test]
    fn mul_widens_past_128_bits() {
        // (10^18 units)^2: the raw product is 10^72 before rescale, far past 128 bits.
        let big = UFixed::from_int(1_000_000_000_000_000_000); // 10^18 units, raw 10^36
        let r = big.checked_mul(big).unwrap();
        let expected = U256::from(SCALE_U128) * U256::from(SCALE_U128) * U256::from(SCALE_U128);
        assert_eq!(r.raw(), expected); // raw 10^54
    }

    #[test]
    fn sqrt_exact_squares() {
        assert_eq!(UFixed::from_int(4).sqrt().unwrap(), UFixed::from_int(2));
        assert_eq!(UFixed::from_int(144).sqrt().unwrap(), UFixed::from_int(12));
        assert_eq!(UFixed::ZERO.sqrt().unwrap(), UFixed::ZERO);
    }

    #[test]
    fn sqrt_round_trip_is_tight() {
        for raw in [
            2_000_000_000_000_000_000u128,
            35_449_077_018_110_320_540,
            123_456_789_012_345_678,
            7,
        ] {
            let x = u(raw);
            let root = x.sqrt().unwrap();
            let back = root.checked_mul(root).unwrap();
            let diff = x.raw().saturating_sub(back.raw());
            assert!(back <= x, "floor sqrt must not overshoot");
            assert!(diff <= U256::from(4u8), "round trip drift {diff} for raw {raw}");
        }
    }

    #[test]
    fn signed_add_mixed_signs() {
        let r = s(5_000_000_000_000_000_000).checked_add(s(-7_000_000_000_000_000_000)).unwrap();
        assert_eq!(r, s(-2_000_000_000_000_000_000));
        let r = r.checked_add(s(2_000_000_000_000_000_000)).unwrap();
        assert_eq!(r, IFixed::ZERO);
        assert!(!r.is_negative(), "zero is normalized to non-negative");
    }

    #[test]
    fn signed_mul_signs() {
        let r = s(-2_000_000_000_000_000_000).checked_mul(s(3_000_000_000_000_000_000)).unwrap();
        assert_eq!(r, s(-6_000_000_000_000_000_000));
        let r = s(-2_000_000_000_000_000_000).checked_mul(s(-3_000_000_000_000_000_000)).unwrap();
        assert_eq!(r, s(6_000_000_000_000_000_000));
    }

    #[test]
    fn signed_ordering() {
        assert!(s(-3_000_000_000_000_000_000) < s(-1_000_000_000_000_000_000));
        assert!(s(-1_000_000_000_000_000_000) < IFixed::ZERO);
        assert!(IFixed::ZERO < s(1));
        assert!(s(1) < s(2));
    }

    #[test]
    fn negative_sqrt_rejected() {
        assert_eq!(s(-1_000_000_000_000_000_000).sqrt(), Err(Error::NegativeSqrt));
    }

    #[test]
    fn exp_zero_is_one() {
        assert_eq!(IFixed::ZERO.exp().unwrap(), UFixed::ONE);
    }

    #[test]
    fn exp_matches_reference() {
        // Accuracy: within 1e-12 of a unit in absolute raw terms, or 1e-12
        // relative for large results (where the f64 oracle itself carries
        // ~1e-16). Truncation leaves sub-ulp error on tiny outputs.
        for units in [0.5f64, 1.0, 2.0, 5.0, 10.0, 20.0, -0.5, -1.0, -5.0, -20.0] {
            let raw = (units.abs() * SCALE_U128 as f64) as i128;
            let arg = if units < 0.0 { s(-raw) } else { s(raw) };
            let got = arg.exp().unwrap();
            let exact = if units < 0.0 { -(raw as f64) } else { raw as f64 } / SCALE_U128 as f64;
            let expected = exact.exp();
            let got_f = to_f64(got);
            let abs_raw = (got_f - expected).abs() * SCALE_U128 as f64;
            let rel = (got_f - expected).abs() / expected;
            assert!(
                abs_raw < 1e6 || rel < 1e-12,
                "exp({units}): got {got_f}, expected {expected}"
            );
        }
    }

    #[test]
    fn exp_one_to_18_decimals() {
        // e = 2.718281828459045235...
        let e = IFixed::ONE.exp().unwrap();
        let expected = u(2_718_281_828_459_045_235);
        let diff = e.raw().max(expected.raw()) - e.raw().min(expected.raw());
        assert!(diff <= U256::from(1_000u32), "e drifted by {diff} raw units");
    }

    #[test]
    fn exp_domain_edges() {
        // Below -41: hard zero.
        assert_eq!(s(-(41 * SCALE_U128 as i128) - 1).exp().unwrap(), UFixed::ZERO);
        // At -41: tiny but still representable.
        let floor = s(-(41 * SCALE_U128 as i128)).exp().unwrap();
        assert!(!floor.is_zero());
        // At +50: allowed.
        assert!(s(50 * SCALE_U128 as i128).exp().is_ok());
        // Above +50: rejected.
        assert_eq!(
            s(50 * SCALE_U128 as i128 + 1).exp(),
            Err(Error::ExpInputTooLarge)
        );
    }

    #[test]
    fn exp_of_sum_is_product_of_exps() {
        let a = s(1_234_567_890_123_456_789);
        let b = s(2_500_000_000_000_000_000);
        let lhs = a.checked_add(b).unwrap().exp().unwrap();
        let rhs = a.exp().unwrap().checked_mul(b.exp().unwrap()).unwrap();
        let diff = lhs.raw().max(rhs.raw()) - lhs.raw().min(rhs.raw());
        // Both sides carry independent sub-1e-12 error.
        assert!(diff <= lhs.raw() / U256::from(1_000_000_000u64));
    }
}
