use rust_decimal::Decimal;
use thiserror::Error;

use crate::service::ServiceError;
use crate::storage::StorageError;
use crate::transactions::{TransactionError, TransactionId};

/// Bad user input, rejected before anything leaves the process.
#[derive(Error, Debug, PartialEq, Clone)]
pub enum ValidationError {
    #[error("description must not be empty")]
    EmptyDescription,
    #[error("{0:?} is not a number")]
    InvalidAmount(String),
    #[error("amount must be greater than zero")]
    NonPositiveAmount,
    #[error("amount {0} exceeds the largest accepted amount")]
    AmountTooLarge(Decimal),
    #[error("{0:?} is not a transaction type, expected income or expense")]
    UnknownKind(String),
}

/// Everything a [`crate::store::TransactionStore`] operation can fail with.
///
/// None of these are fatal: the store always keeps its last consistent
/// collection, so callers report the message and carry on.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),
    #[error("transaction service failed: {0}")]
    Remote(ServiceError),
    #[error("unable to fetch transactions: {0}")]
    Fetch(ServiceError),
    #[error("transaction {0} not found")]
    NotFound(TransactionId),
    #[error(transparent)]
    Sync(#[from] TransactionError),
    #[error("unable to save budget: {0}")]
    Storage(#[from] StorageError),
}

impl StoreError {
    /// remote classifies a failed mutation, keeping a missing id distinct
    pub(crate) fn remote(err: ServiceError) -> StoreError {
        match err {
            ServiceError::NotFound(id) => StoreError::NotFound(id),
            err => StoreError::Remote(err),
        }
    }
}
