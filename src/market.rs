//! Market state machine: positions, LP shares, and the
//! initialize → trade* → settle → claim lifecycle.
//!
//! The market is an owned value; the host serializes access to it. Every
//! entry point validates first and mutates last, so a returned error leaves
//! the state untouched. All payout math is delegated to the kernel.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::fixed_point::{IFixed, UFixed};
use crate::gaussian::{f, sigma_min};
use crate::solver::required_collateral;

/// Opaque participant identity; the kernel never inspects it.
pub type AccountId = u64;

/// Handle to a position issued by this market.
pub type PositionId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Uninitialized,
    Open,
    Settled,
}

/// What a position is a claim on: LPs own a shape, traders own the
/// difference between the shape they left and the shape they installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionKind {
    Lp,
    Trader { mu_old: IFixed, sigma_old: UFixed },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub owner: AccountId,
    pub mu: IFixed,
    pub sigma: UFixed,
    pub k: UFixed,
    pub collateral: UFixed,
    pub kind: PositionKind,
    pub settled: bool,
}

/// Read-only view of the market-global numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub phase: Phase,
    pub mu: IFixed,
    pub sigma: UFixed,
    pub k: UFixed,
    pub backing: UFixed,
    pub total_shares: UFixed,
    pub x_final: Option<IFixed>,
}

#[derive(Debug, Default)]
pub struct Market {
    phase: Option<PhaseState>,
    positions: BTreeMap<PositionId, Position>,
    next_position: PositionId,
}

/// State that only exists once the market has been initialized.
#[derive(Debug)]
struct PhaseState {
    oracle: AccountId,
    mu: IFixed,
    sigma: UFixed,
    k: UFixed,
    backing: UFixed,
    x_final: Option<IFixed>,
    /// Residual backing pool for LP shares, frozen at settlement.
    residual: UFixed,
    shares: BTreeMap<AccountId, UFixed>,
    total_shares: UFixed,
    trader_collateral: UFixed,
}

impl Market {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        match &self.phase {
            None => Phase::Uninitialized,
            Some(s) if s.x_final.is_some() => Phase::Settled,
            Some(_) => Phase::Open,
        }
    }

    pub fn snapshot(&self) -> MarketSnapshot {
        match &self.phase {
            None => MarketSnapshot {
                phase: Phase::Uninitialized,
                mu: IFixed::ZERO,
                sigma: UFixed::ZERO,
                k: UFixed::ZERO,
                backing: UFixed::ZERO,
                total_shares: UFixed::ZERO,
                x_final: None,
            },
            Some(s) => MarketSnapshot {
                phase: self.phase(),
                mu: s.mu,
                sigma: s.sigma,
                k: s.k,
                backing: s.backing,
                total_shares: s.total_shares,
                x_final: s.x_final,
            },
        }
    }

    pub fn position(&self, id: PositionId) -> Option<&Position> {
        self.positions.get(&id)
    }

    pub fn shares_of(&self, holder: AccountId) -> UFixed {
        self.phase
            .as_ref()
            .and_then(|s| s.shares.get(&holder).copied())
            .unwrap_or(UFixed::ZERO)
    }

    /// Open the market with an initial distribution and backing. The caller
    /// becomes the settlement authority and the initial LP: they receive a
    /// position on the starting shape and `b0` LP shares.
    pub fn initialize(
        &mut self,
        caller: AccountId,
        mu0: IFixed,
        sigma0: UFixed,
        b0: UFixed,
        k0: UFixed,
    ) -> Result<PositionId> {
        if self.phase.is_some() {
            return Err(Error::MarketAlreadyInitialized);
        }
        if sigma0 < sigma_min(k0, b0)? {
            return Err(Error::SigmaBelowMinimum);
        }

        let mut shares = BTreeMap::new();
        shares.insert(caller, b0);
        self.phase = Some(PhaseState {
            oracle: caller,
            mu: mu0,
            sigma: sigma0,
            k: k0,
            backing: b0,
            x_final: None,
            residual: UFixed::ZERO,
            shares,
            total_shares: b0,
            trader_collateral: UFixed::ZERO,
        });
        let id = self.issue(Position {
            owner: caller,
            mu: mu0,
            sigma: sigma0,
            k: k0,
            collateral: b0,
            kind: PositionKind::Lp,
            settled: false,
        });
        debug!(caller, id, "market initialized");
        Ok(id)
    }

    /// Add backing to an open market. The L2 constraint scales with the new
    /// backing (`k' = k·(b+Δb)/b`) and the caller receives a position on the
    /// incremental shape `k' − k` plus a pro-rata share mint.
    pub fn add_liquidity(
        &mut self,
        caller: AccountId,
        amount: UFixed,
    ) -> Result<(PositionId, UFixed)> {
        let state = self.require_open()?;

        let new_backing = state.backing.checked_add(amount)?;
        let new_k = state.k.checked_mul(new_backing)?.checked_div(state.backing)?;
        let k_delta = new_k.checked_sub(state.k)?;
        let minted = state.total_shares.checked_mul(amount)?.checked_div(state.backing)?;
        // k and b scale together, so σ_min is unchanged up to truncation
        // (which only ever lowers it); re-check all the same.
        if state.sigma < sigma_min(new_k, new_backing)? {
            return Err(Error::SigmaBelowMinimum);
        }
        let new_holding = state
            .shares
            .get(&caller)
            .copied()
            .unwrap_or(UFixed::ZERO)
            .checked_add(minted)?;
        let new_total = state.total_shares.checked_add(minted)?;
        let position = Position {
            owner: caller,
            mu: state.mu,
            sigma: state.sigma,
            k: k_delta,
            collateral: amount,
            kind: PositionKind::Lp,
            settled: false,
        };

        let state = self.state_mut()?;
        state.backing = new_backing;
        state.k = new_k;
        state.shares.insert(caller, new_holding);
        state.total_shares = new_total;
        let id = self.issue(position);
        debug!(caller, id, "liquidity added");
        Ok((id, minted))
    }

    /// Move the market to a new distribution. The caller posts the maximum
    /// loss of the move as collateral (rejected if above `max_collateral`)
    /// and receives a position on the shape differential.
    pub fn trade(
        &mut self,
        caller: AccountId,
        mu_new: IFixed,
        sigma_new: UFixed,
        max_collateral: UFixed,
    ) -> Result<(PositionId, UFixed)> {
        let state = self.require_open()?;

        if sigma_new < sigma_min(state.k, state.backing)? {
            return Err(Error::SigmaBelowMinimum);
        }
        let cost = required_collateral(
            state.mu, state.sigma, mu_new, sigma_new, state.k, mu_new,
        )?;
        if cost > max_collateral {
            return Err(Error::InsufficientCollateral);
        }
        let new_collateral_total = state.trader_collateral.checked_add(cost)?;
        let position = Position {
            owner: caller,
            mu: mu_new,
            sigma: sigma_new,
            k: state.k,
            collateral: cost,
            kind: PositionKind::Trader {
                mu_old: state.mu,
                sigma_old: state.sigma,
            },
            settled: false,
        };

        let state = self.state_mut()?;
        state.trader_collateral = new_collateral_total;
        state.mu = mu_new;
        state.sigma = sigma_new;
        let id = self.issue(position);
        debug!(caller, id, "trade executed");
        Ok((id, cost))
    }

    /// Freeze the settlement outcome. Only the settlement authority recorded
    /// at initialization may call this; the residual LP pool is computed and
    /// frozen here as well.
    pub fn settle(&mut self, caller: AccountId, outcome: IFixed) -> Result<()> {
        let state = self.require_open()?;
        if caller != state.oracle {
            return Err(Error::NotSettlementAuthority);
        }
        let final_value = f(outcome, state.mu, state.sigma, state.k)?;
        let residual = state.backing.saturating_sub(final_value);

        let state = self.state_mut()?;
        state.x_final = Some(outcome);
        state.residual = residual;
        debug!(caller, "market settled");
        Ok(())
    }

    /// Redeem a position at the frozen outcome. LP positions pay the value
    /// of their shape; trader positions pay their collateral plus the shape
    /// differential. A position settles exactly once.
    pub fn claim(&mut self, caller: AccountId, id: PositionId) -> Result<UFixed> {
        let outcome = self.require_settled()?;
        let position = self.positions.get_mut(&id).ok_or(Error::PositionNotFound)?;
        if position.owner != caller {
            return Err(Error::NotPositionOwner);
        }
        if position.settled {
            return Err(Error::PositionAlreadySettled);
        }

        let value = f(outcome, position.mu, position.sigma, position.k)?;
        let payout = match position.kind {
            PositionKind::Lp => value,
            PositionKind::Trader { mu_old, sigma_old } => {
                let old = f(outcome, mu_old, sigma_old, position.k)?;
                let total = IFixed::from(position.collateral)
                    .checked_add(IFixed::from(value))?
                    .checked_sub(IFixed::from(old))?;
                // The collateral covers the worst case; anything below zero
                // is truncation dust.
                if total.is_negative() {
                    UFixed::ZERO
                } else {
                    total.abs()
                }
            }
        };
        position.settled = true;
        debug!(caller, id, "position claimed");
        Ok(payout)
    }

    /// Burn a holder's LP shares for their slice of the residual backing.
    /// The pool and supply shrink together, so the proportional claim is
    /// exact regardless of claim order.
    pub fn claim_lp_shares(&mut self, holder: AccountId) -> Result<UFixed> {
        self.require_settled()?;
        let state = self.state_mut()?;
        let held = state.shares.get(&holder).copied().unwrap_or(UFixed::ZERO);
        if held.is_zero() {
            return Err(Error::InsufficientShares);
        }
        let payout = held.checked_mul(state.residual)?.checked_div(state.total_shares)?;
        let new_residual = state.residual.checked_sub(payout)?;
        let new_total = state.total_shares.checked_sub(held)?;
        state.residual = new_residual;
        state.total_shares = new_total;
        state.shares.remove(&holder);
        debug!(holder, "lp shares burned");
        Ok(payout)
    }

    fn issue(&mut self, position: Position) -> PositionId {
        let id = self.next_position;
        self.next_position += 1;
        self.positions.insert(id, position);
        id
    }

    fn require_open(&self) -> Result<&PhaseState> {
        match &self.phase {
            None => Err(Error::MarketNotInitialized),
            Some(s) if s.x_final.is_some() => Err(Error::MarketAlreadySettled),
            Some(s) => Ok(s),
        }
    }

    fn require_settled(&self) -> Result<IFixed> {
        match &self.phase {
            None => Err(Error::MarketNotInitialized),
            Some(s) => s.x_final.ok_or(Error::MarketNotSettled),
        }
    }

    fn state_mut(&mut self) -> Result<&mut PhaseState> {
        self.phase.as_mut().ok_or(Error::MarketNotInitialized)
    }
}
