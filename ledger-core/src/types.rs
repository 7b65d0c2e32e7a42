//! Core types for the balance ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Memory safety (no unsafe code)
//! - Exact arithmetic (Decimal for money)

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// User identifier (positive integer)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(u64);

impl UserId {
    /// Create new user ID
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get raw value
    pub fn get(&self) -> u64 {
        self.0
    }

    /// Ids are 1-based; zero is never a valid user
    pub fn is_valid(&self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Service identifier (positive integer)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ServiceId(u64);

impl ServiceId {
    /// Create new service ID
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get raw value
    pub fn get(&self) -> u64 {
        self.0
    }

    /// Ids are 1-based; zero is never a valid service
    pub fn is_valid(&self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Order identifier (positive integer)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrderId(u64);

impl OrderId {
    /// Create new order ID
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get raw value
    pub fn get(&self) -> u64 {
        self.0
    }

    /// Ids are 1-based; zero is never a valid order
    pub fn is_valid(&self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Account holding a user's current balance
///
/// Created implicitly on first deposit, never deleted.
/// Invariant: `balance >= 0` at all observable times.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Owning user
    pub user_id: UserId,

    /// Current balance (exact decimal)
    pub balance: Decimal,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create a fresh account with zero balance
    pub fn new(user_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            balance: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Reservation status (state machine)
///
/// Transitions are monotonic: `Reserved -> Recognized | Cancelled`.
/// Both `Recognized` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ReservationStatus {
    /// Funds held, pending finalization
    Reserved = 1,
    /// Finalized into a transaction record (terminal)
    Recognized = 2,
    /// Hold released, funds credited back (terminal)
    Cancelled = 3,
}

impl ReservationStatus {
    /// Check if the status admits no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReservationStatus::Recognized | ReservationStatus::Cancelled)
    }

    /// Status name as stored/logged
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Reserved => "reserved",
            ReservationStatus::Recognized => "recognized",
            ReservationStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Hold placed on part of a user's balance against a specific order
///
/// Keyed by `(user_id, order_id)` — globally unique. Rows are never
/// physically deleted; terminal reservations are kept for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    /// Owning user
    pub user_id: UserId,

    /// Service the order belongs to
    pub service_id: ServiceId,

    /// Order the hold is placed against
    pub order_id: OrderId,

    /// Reserved amount (always positive)
    pub amount: Decimal,

    /// Current state
    pub status: ReservationStatus,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last transition timestamp
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    /// Create a new reservation in `Reserved` state
    pub fn new(user_id: UserId, service_id: ServiceId, order_id: OrderId, amount: Decimal) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            service_id,
            order_id,
            amount,
            status: ReservationStatus::Reserved,
            created_at: now,
            updated_at: now,
        }
    }

    /// Transition `Reserved -> Recognized`
    ///
    /// Not idempotent: a second call on the same reservation is an error.
    pub fn recognize(&mut self) -> crate::Result<()> {
        self.transition_to(ReservationStatus::Recognized)
    }

    /// Transition `Reserved -> Cancelled`
    pub fn cancel(&mut self) -> crate::Result<()> {
        self.transition_to(ReservationStatus::Cancelled)
    }

    fn transition_to(&mut self, next: ReservationStatus) -> crate::Result<()> {
        if self.status != ReservationStatus::Reserved {
            return Err(crate::Error::InvalidState {
                user: self.user_id,
                order: self.order_id,
                status: self.status,
            });
        }

        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Immutable record of a recognized reservation
///
/// Created exactly once per successful recognition; never mutated or
/// deleted. Ids are assigned by the single writer and strictly increase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Auto-increment id (monotonically increasing)
    pub id: u64,

    /// Owning user
    pub user_id: UserId,

    /// Service the order belongs to
    pub service_id: ServiceId,

    /// Order that was paid
    pub order_id: OrderId,

    /// Recognized amount
    pub amount: Decimal,

    /// Recognition timestamp (nanoseconds since Unix epoch)
    pub timestamp_nanos: i64,
}

impl Transaction {
    /// Recognition timestamp as UTC datetime
    pub fn timestamp(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_nanos(self.timestamp_nanos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_validity() {
        assert!(UserId::new(1).is_valid());
        assert!(!UserId::new(0).is_valid());
        assert!(OrderId::new(42).is_valid());
        assert!(!ServiceId::new(0).is_valid());
    }

    #[test]
    fn test_new_account_starts_at_zero() {
        let account = Account::new(UserId::new(7));
        assert_eq!(account.balance, Decimal::ZERO);
    }

    #[test]
    fn test_status_terminal() {
        assert!(!ReservationStatus::Reserved.is_terminal());
        assert!(ReservationStatus::Recognized.is_terminal());
        assert!(ReservationStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_recognize_transition() {
        let mut reservation = Reservation::new(
            UserId::new(1),
            ServiceId::new(5),
            OrderId::new(42),
            Decimal::new(4000, 2),
        );
        assert_eq!(reservation.status, ReservationStatus::Reserved);

        reservation.recognize().unwrap();
        assert_eq!(reservation.status, ReservationStatus::Recognized);

        // Second recognize is an error, not a no-op
        let err = reservation.recognize().unwrap_err();
        assert!(matches!(err, crate::Error::InvalidState { .. }));
    }

    #[test]
    fn test_cancel_then_recognize_rejected() {
        let mut reservation = Reservation::new(
            UserId::new(1),
            ServiceId::new(5),
            OrderId::new(42),
            Decimal::new(4000, 2),
        );

        reservation.cancel().unwrap();
        assert_eq!(reservation.status, ReservationStatus::Cancelled);

        let err = reservation.recognize().unwrap_err();
        assert!(matches!(
            err,
            crate::Error::InvalidState {
                status: ReservationStatus::Cancelled,
                ..
            }
        ));
    }

    #[test]
    fn test_transaction_timestamp_roundtrip() {
        let now = Utc::now();
        let txn = Transaction {
            id: 1,
            user_id: UserId::new(1),
            service_id: ServiceId::new(5),
            order_id: OrderId::new(42),
            amount: Decimal::new(4000, 2),
            timestamp_nanos: now.timestamp_nanos_opt().unwrap(),
        };
        assert_eq!(txn.timestamp(), now);
    }
}
