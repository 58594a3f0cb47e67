//! Scaled-Gaussian kernel.
//!
//! A market distribution is `f(x; μ, σ, k) = λ(σ, k) · N(x; μ, σ)` where `N`
//! is the Gaussian PDF and `λ(σ, k) = k·√(2σ√π)` makes the L2 norm of `f`
//! equal `k`. The boundary relation `σ ≥ σ_min(k, b)` (equivalently
//! `k ≤ k_max(σ, b)`) keeps the peak payout `f(μ)` within the backing `b`.

use primitive_types::U256;

use crate::error::{Error, Result};
use crate::fixed_point::{IFixed, UFixed};

// 18-decimal constants.
pub const PI: UFixed = UFixed::from_raw(U256([3_141_592_653_589_793_238, 0, 0, 0]));
pub const SQRT_PI: UFixed = UFixed::from_raw(U256([1_772_453_850_905_516_027, 0, 0, 0]));
pub const SQRT_2: UFixed = UFixed::from_raw(U256([1_414_213_562_373_095_048, 0, 0, 0]));
pub const SQRT_2PI: UFixed = UFixed::from_raw(U256([2_506_628_274_631_000_502, 0, 0, 0]));

/// L2-norm scaling factor `λ(σ, k) = k·√(2σ√π)`.
pub fn lambda(sigma: UFixed, k: UFixed) -> Result<UFixed> {
    let two_sigma = sigma.checked_add(sigma)?;
    k.checked_mul(two_sigma.checked_mul(SQRT_PI)?.sqrt()?)
}

/// Scaled-Gaussian value `f(x; μ, σ, k)`. Non-negative by construction;
/// returns zero once the exponent `z²/2` leaves the `exp` domain.
pub fn f(x: IFixed, mu: IFixed, sigma: UFixed, k: UFixed) -> Result<UFixed> {
    let d = x.checked_sub(mu)?;
    // z = (x−μ)/σ. A z that does not even fit 256 bits is deep in the tail.
    let z = match d.checked_div(IFixed::from(sigma)) {
        Ok(z) => z,
        Err(Error::Overflow) => return Ok(UFixed::ZERO),
        Err(e) => return Err(e),
    };
    let half_z_sq = match z.checked_mul(z) {
        Ok(sq) => UFixed::from_raw(sq.abs().raw() >> 1),
        Err(Error::Overflow) => return Ok(UFixed::ZERO),
        Err(e) => return Err(e),
    };
    // exp underflows to exactly zero past z²/2 = 41.
    let gauss = IFixed::from(half_z_sq).neg().exp()?;
    let norm = gauss.checked_div(sigma.checked_mul(SQRT_2PI)?)?;
    lambda(sigma, k)?.checked_mul(norm)
}

/// First derivative `f′(x) = −(x−μ)/σ² · f(x)`.
pub fn f_prime(x: IFixed, mu: IFixed, sigma: UFixed, k: UFixed) -> Result<IFixed> {
    let value = f(x, mu, sigma, k)?;
    if value.is_zero() {
        return Ok(IFixed::ZERO);
    }
    let sigma_sq = sigma.checked_mul(sigma)?;
    let ratio = x.checked_sub(mu)?.checked_div(IFixed::from(sigma_sq))?;
    ratio.neg().checked_mul(IFixed::from(value))
}

/// Second derivative `f″(x) = ((x−μ)²/σ⁴ − 1/σ²) · f(x)`.
pub fn f_second(x: IFixed, mu: IFixed, sigma: UFixed, k: UFixed) -> Result<IFixed> {
    let value = f(x, mu, sigma, k)?;
    if value.is_zero() {
        return Ok(IFixed::ZERO);
    }
    let d = x.checked_sub(mu)?;
    let sigma_sq = IFixed::from(sigma.checked_mul(sigma)?);
    let quad = d.checked_mul(d)?.checked_div(sigma_sq)?.checked_div(sigma_sq)?;
    let curvature_floor = IFixed::from(UFixed::ONE).checked_div(sigma_sq)?;
    quad.checked_sub(curvature_floor)?.checked_mul(IFixed::from(value))
}

/// Smallest admissible σ for a given L2 constraint and backing:
/// `σ_min = k² / (b²·√π)`.
pub fn sigma_min(k: UFixed, b: UFixed) -> Result<UFixed> {
    let k_sq = k.checked_mul(k)?;
    let b_sq = b.checked_mul(b)?;
    k_sq.checked_div(b_sq)?.checked_div(SQRT_PI)
}

/// Largest admissible L2 constraint for a given σ and backing:
/// `k_max = b·√(σ·√π)`.
pub fn k_max(sigma: UFixed, b: UFixed) -> Result<UFixed> {
    b.checked_mul(sigma.checked_mul(SQRT_PI)?.sqrt()?)
}
