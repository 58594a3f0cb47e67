//! Error taxonomy for the engine.
//!
//! Arithmetic errors (`DivByZero`, `Overflow`, ...) are never caught or
//! remapped inside the crate; the market layer rejects invalid transitions
//! with the validation variants and commits no state on any error path.

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    // Arithmetic
    #[error("division by zero")]
    DivByZero,
    #[error("arithmetic overflow")]
    Overflow,
    #[error("square root of a negative value")]
    NegativeSqrt,
    #[error("exp input above the supported domain")]
    ExpInputTooLarge,

    // Validation
    #[error("sigma is below the minimum allowed for the market's k and backing")]
    SigmaBelowMinimum,
    #[error("required collateral exceeds the caller's limit")]
    InsufficientCollateral,

    // Market phase
    #[error("market is already initialized")]
    MarketAlreadyInitialized,
    #[error("market is not initialized")]
    MarketNotInitialized,
    #[error("market is already settled")]
    MarketAlreadySettled,
    #[error("market is not settled")]
    MarketNotSettled,

    // Positions and shares
    #[error("no position with this id")]
    PositionNotFound,
    #[error("caller does not own this position")]
    NotPositionOwner,
    #[error("position is already settled")]
    PositionAlreadySettled,
    #[error("caller is not the settlement authority")]
    NotSettlementAuthority,
    #[error("holder has no LP shares to claim")]
    InsufficientShares,
}
