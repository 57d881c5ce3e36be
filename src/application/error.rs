use thiserror::Error;

use crate::domain::HouseNumber;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("House not found: {0}")]
    HouseNotFound(HouseNumber),

    #[error("House already exists: {0}")]
    HouseAlreadyExists(HouseNumber),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// A store failure inside the recharge transaction; the transaction was rolled back.
    #[error("Recharge transaction failed: {0:#}")]
    TransactionFailed(anyhow::Error),

    #[error("Database error: {0:#}")]
    Database(#[from] anyhow::Error),
}

impl AppError {
    /// True when the error comes from the store rather than from the request.
    pub fn is_internal(&self) -> bool {
        matches!(self, AppError::TransactionFailed(_) | AppError::Database(_))
    }
}
