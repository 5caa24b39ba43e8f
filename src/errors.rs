use rust_decimal::Decimal;
use thiserror::Error;

/// Unified error type for every core operation.
///
/// Validation failures (`NotFound`, `Inactive`, `Conflict`, `BadRequest`,
/// `InsufficientFunds`) are raised before any mutation where possible; the
/// request layer maps them to transport codes. `OutOfStock` and `Delivery`
/// can surface after a debit has been staged, in which case the enclosing
/// transaction must be rolled back as a unit.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    #[error("{entity} is inactive")]
    Inactive { entity: &'static str },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("insufficient balance: current {current}, required {required}")]
    InsufficientFunds { current: Decimal, required: Decimal },

    #[error("no eligible stock account available")]
    OutOfStock,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("internal error: {0}")]
    Internal(String),
}

// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
