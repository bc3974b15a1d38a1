//! Error types for the billing core

use thiserror::Error;

/// Errors surfaced by billing operations
#[derive(Debug, Error)]
pub enum BillingError {
    /// An entity id has no record behind it
    #[error("not found: {0}")]
    NotFound(String),

    /// The requested action is incompatible with the entity's current state
    /// (e.g. renewing a cancelled subscription)
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// Malformed numeric or date input to the billing calculator
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A payment was attempted against a subscription that cannot accept one
    #[error("invalid payment: {0}")]
    InvalidPayment(String),

    /// The record store failed to read or write
    #[error("store error: {0}")]
    Store(String),
}

pub type BillingResult<T> = Result<T, BillingError>;
