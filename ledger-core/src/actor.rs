//! Actor-based concurrency for the ledger
//!
//! This module implements the single-writer pattern using Tokio actors:
//! - One logical writer task owns every balance and reservation mutation
//! - Validation and mutation happen inside the same message handler, so
//!   there is no time-of-check/time-of-use gap between them
//! - Async message passing with backpressure (bounded mailbox)
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │              Calling layer (API/CLI)                  │
//! │             Concurrent request handlers               │
//! └─────────────────────┬────────────────────────────────┘
//!                       │
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │               LedgerHandle (Clone)                    │
//! │         Sends messages to actor mailbox              │
//! └─────────────────────┬────────────────────────────────┘
//!                       │ mpsc::channel (bounded)
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │              LedgerActor (Single Task)                │
//! │   validate → mutate → Storage::commit_* (WriteBatch)  │
//! └──────────────────────────────────────────────────────┘
//! ```

use crate::types::{Account, OrderId, Reservation, ServiceId, Transaction, UserId};
use crate::{Error, Result, Storage};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Message sent to the ledger actor
pub enum LedgerMessage {
    /// Add funds to a user's balance, creating the account if absent
    Deposit {
        /// Target user
        user: UserId,
        /// Amount to add (validated positive by the caller)
        amount: Decimal,
        /// New balance on success
        response: oneshot::Sender<Result<Decimal>>,
    },

    /// Hold funds against an order
    Reserve {
        /// Target user
        user: UserId,
        /// Service the order belongs to
        service: ServiceId,
        /// Order to hold against
        order: OrderId,
        /// Amount to hold
        amount: Decimal,
        /// Created reservation on success
        response: oneshot::Sender<Result<Reservation>>,
    },

    /// Finalize a reserved hold into a transaction record
    Recognize {
        /// Target user
        user: UserId,
        /// Order whose hold is finalized
        order: OrderId,
        /// Appended transaction on success
        response: oneshot::Sender<Result<Transaction>>,
    },

    /// Release a reserved hold, crediting the amount back
    Cancel {
        /// Target user
        user: UserId,
        /// Order whose hold is released
        order: OrderId,
        /// Cancelled reservation on success
        response: oneshot::Sender<Result<Reservation>>,
    },

    /// Shutdown actor; acked once storage is released
    Shutdown {
        /// Ack sent after the actor has dropped its storage handle
        response: oneshot::Sender<()>,
    },
}

/// Convert a timestamp to nanoseconds, rejecting values outside the
/// representable i64 range instead of silently mapping them to the epoch
fn timestamp_nanos(ts: DateTime<Utc>) -> Result<i64> {
    ts.timestamp_nanos_opt().ok_or_else(|| {
        Error::Storage(format!("timestamp {} outside nanosecond range", ts))
    })
}

/// Actor that processes ledger mutations
pub struct LedgerActor {
    /// Storage backend
    storage: Arc<Storage>,

    /// Mailbox for incoming messages
    mailbox: mpsc::Receiver<LedgerMessage>,

    /// Next transaction id to assign (persisted with each recognition)
    next_transaction_id: u64,
}

impl LedgerActor {
    /// Create new actor
    pub fn new(
        storage: Arc<Storage>,
        mailbox: mpsc::Receiver<LedgerMessage>,
        next_transaction_id: u64,
    ) -> Self {
        Self {
            storage,
            mailbox,
            next_transaction_id,
        }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        let mut shutdown_ack = None;

        while let Some(msg) = self.mailbox.recv().await {
            match msg {
                LedgerMessage::Shutdown { response } => {
                    shutdown_ack = Some(response);
                    break;
                }
                _ => self.handle_message(msg),
            }
        }

        // Release storage before acking so callers can reopen the data dir
        let Self { storage, .. } = self;
        drop(storage);

        if let Some(ack) = shutdown_ack {
            let _ = ack.send(());
        }
    }

    /// Handle a single mutation message
    fn handle_message(&mut self, msg: LedgerMessage) {
        match msg {
            LedgerMessage::Deposit {
                user,
                amount,
                response,
            } => {
                let _ = response.send(self.deposit(user, amount));
            }

            LedgerMessage::Reserve {
                user,
                service,
                order,
                amount,
                response,
            } => {
                let _ = response.send(self.reserve(user, service, order, amount));
            }

            LedgerMessage::Recognize {
                user,
                order,
                response,
            } => {
                let _ = response.send(self.recognize(user, order));
            }

            LedgerMessage::Cancel {
                user,
                order,
                response,
            } => {
                let _ = response.send(self.cancel(user, order));
            }

            LedgerMessage::Shutdown { .. } => {
                // Handled in main loop
            }
        }
    }

    fn deposit(&mut self, user: UserId, amount: Decimal) -> Result<Decimal> {
        let mut account = self
            .storage
            .get_account(user)?
            .unwrap_or_else(|| Account::new(user));

        account.balance = account
            .balance
            .checked_add(amount)
            .ok_or(Error::BalanceOverflow { user, amount })?;
        account.updated_at = Utc::now();

        self.storage.put_account(&account)?;

        tracing::info!(user_id = %user, amount = %amount, new_balance = %account.balance, "Deposit");

        Ok(account.balance)
    }

    fn reserve(
        &mut self,
        user: UserId,
        service: ServiceId,
        order: OrderId,
        amount: Decimal,
    ) -> Result<Reservation> {
        let mut account = self
            .storage
            .get_account(user)?
            .ok_or(Error::AccountNotFound(user))?;

        // The key is unique across all statuses; a second reserve on the
        // same order must not overwrite the first
        if self.storage.get_reservation(user, order)?.is_some() {
            return Err(Error::DuplicateReservation { user, order });
        }

        if amount > account.balance {
            return Err(Error::InsufficientFunds {
                user,
                requested: amount,
                available: account.balance,
            });
        }

        account.balance -= amount;
        account.updated_at = Utc::now();

        let reservation = Reservation::new(user, service, order, amount);

        // Debit and insert commit together or not at all
        self.storage.commit_reserve(&account, &reservation)?;

        tracing::info!(
            user_id = %user,
            order_id = %order,
            amount = %amount,
            new_balance = %account.balance,
            "Funds reserved"
        );

        Ok(reservation)
    }

    fn recognize(&mut self, user: UserId, order: OrderId) -> Result<Transaction> {
        let mut reservation = self
            .storage
            .get_reservation(user, order)?
            .ok_or(Error::ReservationNotFound { user, order })?;

        reservation.recognize()?;

        let txn = Transaction {
            id: self.next_transaction_id,
            user_id: reservation.user_id,
            service_id: reservation.service_id,
            order_id: reservation.order_id,
            amount: reservation.amount,
            timestamp_nanos: timestamp_nanos(Utc::now())?,
        };

        // Status flip, append and counter bump commit together
        self.storage.commit_recognize(&reservation, &txn)?;
        self.next_transaction_id += 1;

        tracing::info!(
            user_id = %user,
            order_id = %order,
            transaction_id = txn.id,
            amount = %txn.amount,
            "Transaction recognized"
        );

        Ok(txn)
    }

    fn cancel(&mut self, user: UserId, order: OrderId) -> Result<Reservation> {
        let mut reservation = self
            .storage
            .get_reservation(user, order)?
            .ok_or(Error::ReservationNotFound { user, order })?;

        reservation.cancel()?;

        let mut account = self
            .storage
            .get_account(user)?
            .ok_or(Error::AccountNotFound(user))?;

        account.balance = account
            .balance
            .checked_add(reservation.amount)
            .ok_or(Error::BalanceOverflow {
                user,
                amount: reservation.amount,
            })?;
        account.updated_at = Utc::now();

        // Status flip and credit commit together
        self.storage.commit_cancel(&reservation, &account)?;

        tracing::info!(
            user_id = %user,
            order_id = %order,
            amount = %reservation.amount,
            new_balance = %account.balance,
            "Reservation cancelled"
        );

        Ok(reservation)
    }
}

/// Handle for sending messages to the actor
#[derive(Clone)]
pub struct LedgerHandle {
    sender: mpsc::Sender<LedgerMessage>,
}

impl LedgerHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<LedgerMessage>) -> Self {
        Self { sender }
    }

    /// Deposit funds
    pub async fn deposit(&self, user: UserId, amount: Decimal) -> Result<Decimal> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(LedgerMessage::Deposit {
                user,
                amount,
                response: tx,
            })
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Reserve funds against an order
    pub async fn reserve(
        &self,
        user: UserId,
        service: ServiceId,
        order: OrderId,
        amount: Decimal,
    ) -> Result<Reservation> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(LedgerMessage::Reserve {
                user,
                service,
                order,
                amount,
                response: tx,
            })
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Recognize a reserved hold
    pub async fn recognize(&self, user: UserId, order: OrderId) -> Result<Transaction> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(LedgerMessage::Recognize {
                user,
                order,
                response: tx,
            })
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Cancel a reserved hold
    pub async fn cancel(&self, user: UserId, order: OrderId) -> Result<Reservation> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(LedgerMessage::Cancel {
                user,
                order,
                response: tx,
            })
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Shutdown actor and wait for it to release storage
    pub async fn shutdown(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(LedgerMessage::Shutdown { response: tx })
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))
    }
}

/// Spawn the ledger actor
pub fn spawn_ledger_actor(storage: Arc<Storage>, next_transaction_id: u64) -> LedgerHandle {
    let (tx, rx) = mpsc::channel(1000); // Bounded channel for backpressure
    let actor = LedgerActor::new(storage, rx, next_transaction_id);

    tokio::spawn(async move {
        actor.run().await;
    });

    LedgerHandle::new(tx)
}
