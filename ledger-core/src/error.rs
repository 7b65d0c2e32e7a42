//! Error types for the ledger

use crate::types::{OrderId, ReservationStatus, UserId};
use rust_decimal::Decimal;
use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// User has never deposited
    #[error("Account not found: user {0}")]
    AccountNotFound(UserId),

    /// Balance too low for the requested debit
    #[error("Insufficient funds: user {user} requested {requested}, available {available}")]
    InsufficientFunds {
        /// User whose balance was checked
        user: UserId,
        /// Amount the caller asked to reserve
        requested: Decimal,
        /// Balance available at the time of the attempt
        available: Decimal,
    },

    /// A reservation already exists for this (user, order) key
    #[error("Duplicate reservation: user {user} already holds order {order}")]
    DuplicateReservation {
        /// Owning user
        user: UserId,
        /// Conflicting order
        order: OrderId,
    },

    /// No reservation for this (user, order) key
    #[error("Reservation not found: user {user}, order {order}")]
    ReservationNotFound {
        /// Owning user
        user: UserId,
        /// Requested order
        order: OrderId,
    },

    /// Reservation is not in the state the transition requires
    #[error("Invalid reservation state: user {user}, order {order} is already {status}")]
    InvalidState {
        /// Owning user
        user: UserId,
        /// Requested order
        order: OrderId,
        /// Status the reservation is actually in
        status: ReservationStatus,
    },

    /// Crediting the amount would exceed the representable decimal range
    #[error("Balance overflow: user {user} balance cannot absorb {amount}")]
    BalanceOverflow {
        /// User whose balance would overflow
        user: UserId,
        /// Amount that could not be credited
        amount: Decimal,
    },

    /// Non-positive amount or id
    #[error("Validation error: {0}")]
    Validation(String),

    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_carry_ids() {
        let err = Error::InsufficientFunds {
            user: UserId::new(1),
            requested: Decimal::new(5000, 2),
            available: Decimal::new(1000, 2),
        };
        let msg = err.to_string();
        assert!(msg.contains("user 1"));
        assert!(msg.contains("50.00"));
        assert!(msg.contains("10.00"));

        let err = Error::InvalidState {
            user: UserId::new(1),
            order: OrderId::new(42),
            status: ReservationStatus::Recognized,
        };
        assert!(err.to_string().contains("recognized"));
    }
}
