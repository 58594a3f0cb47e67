//! Maximum-loss search and collateral pricing.
//!
//! A trade moves the market distribution from `(μ_f, σ_f)` to `(μ_t, σ_t)`
//! at a shared L2 constraint `k`. The collateral owed is the worst-case
//! payout differential `max_x |f(x; to) − f(x; from)|`, located by damped
//! Newton on `g(x) = f(x; to) − f(x; from)`.
//!
//! `g` has critical points on both sides of `μ_t`. The seed rule places the
//! iterate on the side of `μ_t` facing away from `μ_f`, and the clamp keeps
//! it from crossing back; without both, Newton converges to the spurious
//! critical point near `μ_f` whenever the hint starts close to it.

use primitive_types::U256;
use tracing::trace;

use crate::error::Result;
use crate::fixed_point::{IFixed, UFixed};
use crate::gaussian::{f, f_prime, f_second};

/// Iteration cap used by `required_collateral`.
pub const DEFAULT_MAX_ITER: u32 = 20;

/// Convergence tolerance used by `required_collateral`: 10⁻⁶.
pub const DEFAULT_TOL: UFixed = UFixed::from_raw(U256([1_000_000_000_000, 0, 0, 0]));

/// Newton step damping factor, 0.875.
const DAMPING: UFixed = UFixed::from_raw(U256([875_000_000_000_000_000, 0, 0, 0]));

/// Curvature magnitude below which the step is considered unreliable
/// and the search stops at the current iterate (10⁻¹⁰).
const CURVATURE_FLOOR: UFixed = UFixed::from_raw(U256([100_000_000, 0, 0, 0]));

/// Locate `max_x |f(x; μ_to, σ_to, k) − f(x; μ_from, σ_from, k)|`.
///
/// Returns the maximum differential and its argmax. Exhausting `max_iter`
/// is not an error; the best iterate so far is evaluated and returned.
#[allow(clippy::too_many_arguments)]
pub fn find_max_loss(
    mu_from: IFixed,
    sigma_from: UFixed,
    mu_to: IFixed,
    sigma_to: UFixed,
    hint: IFixed,
    k: UFixed,
    max_iter: u32,
    tol: UFixed,
) -> Result<(UFixed, IFixed)> {
    let mut x = seed(mu_from, mu_to, sigma_to, hint)?;

    for iter in 0..max_iter {
        let slope = f_prime(x, mu_to, sigma_to, k)?
            .checked_sub(f_prime(x, mu_from, sigma_from, k)?)?;
        if slope.abs() < tol {
            trace!(iter, "converged on slope");
            break;
        }
        let curvature = f_second(x, mu_to, sigma_to, k)?
            .checked_sub(f_second(x, mu_from, sigma_from, k)?)?;
        if curvature.abs() < CURVATURE_FLOOR {
            trace!(iter, "curvature too flat, stopping at current iterate");
            break;
        }

        let step = slope.checked_div(curvature)?.checked_mul(IFixed::from(DAMPING))?;
        let mut next = x.checked_sub(step)?;
        // Never cross μ_t back toward μ_f.
        if mu_from < mu_to && next < mu_to {
            next = mu_to;
        } else if mu_from > mu_to && next > mu_to {
            next = mu_to;
        }

        let moved = next.checked_sub(x)?;
        x = next;
        if moved.abs() < tol {
            trace!(iter, "converged on step size");
            break;
        }
    }

    let loss = IFixed::from(f(x, mu_to, sigma_to, k)?)
        .checked_sub(IFixed::from(f(x, mu_from, sigma_from, k)?))?
        .abs();
    Ok((loss, x))
}

/// Place the starting iterate on the side of `μ_t` opposite `μ_f`.
/// With `μ_f == μ_t` the hint is used untouched.
fn seed(mu_from: IFixed, mu_to: IFixed, sigma_to: UFixed, hint: IFixed) -> Result<IFixed> {
    if mu_from < mu_to && hint <= mu_to {
        mu_to.checked_add(IFixed::from(sigma_to))
    } else if mu_from > mu_to && hint >= mu_to {
        mu_to.checked_sub(IFixed::from(sigma_to))
    } else {
        Ok(hint)
    }
}

/// Collateral a trader must post to move the market from
/// `(μ_from, σ_from)` to `(μ_to, σ_to)`: the maximum loss over all
/// settlement points. `hint = 0` is a sentinel for "start at μ_to".
pub fn required_collateral(
    mu_from: IFixed,
    sigma_from: UFixed,
    mu_to: IFixed,
    sigma_to: UFixed,
    k: UFixed,
    hint: IFixed,
) -> Result<UFixed> {
    let hint = if hint.is_zero() { mu_to } else { hint };
    let (loss, _) = find_max_loss(
        mu_from, sigma_from, mu_to, sigma_to, hint, k, DEFAULT_MAX_ITER, DEFAULT_TOL,
    )?;
    Ok(loss)
}
