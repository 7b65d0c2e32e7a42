//! Balance Ledger Core
//!
//! Per-user balance tracking with a two-phase reserve/recognize flow for
//! order payments.
//!
//! # Architecture
//!
//! - **Single Writer**: one logical writer task owns every mutation,
//!   eliminating check-then-act races over shared balance state
//! - **Atomic Commits**: compound mutations (debit+insert, flip+append,
//!   flip+credit) go through a single storage write batch
//! - **Soft Reads**: balance and transaction queries hit storage directly
//!   and never block the writer
//!
//! # Invariants
//!
//! - Balances never go negative at any observable time
//! - Reservation transitions are monotonic: reserved → recognized|cancelled
//! - Transactions are append-only with strictly increasing ids
//! - A (user, order) reservation key is claimed at most once

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod actor;
pub mod config;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod query;
pub mod storage;
pub mod types;

// Re-exports
pub use config::Config;
pub use error::{Error, Result};
pub use ledger::Ledger;
pub use query::{SortBy, SortOrder, TransactionQuery};
pub use storage::Storage;
pub use types::{
    Account, OrderId, Reservation, ReservationStatus, ServiceId, Transaction, UserId,
};
