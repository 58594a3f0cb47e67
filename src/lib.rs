//! Distribution Prediction Market Engine
//!
//! Deterministic core for a market over a continuous outcome: participants
//! push a scaled Gaussian PDF around the real line, post the worst-case
//! payout differential as collateral, and at settlement each position pays
//! the value of its shape (or shape differential) at the realized outcome.
//!
//! The crate is pure and embeddable: 18-decimal fixed-point arithmetic over
//! 256-bit integers, no I/O, no global state, bit-identical results across
//! platforms.

pub mod codec;
pub mod error;
pub mod fixed_point;
pub mod gaussian;
pub mod market;
pub mod solver;

pub use error::{Error, Result};
pub use fixed_point::{IFixed, UFixed};
pub use market::{AccountId, Market, Position, PositionId};
