//! Main ledger orchestration layer
//!
//! This module ties together storage, the single-writer actor and metrics
//! into a high-level API for balance and reservation operations.
//!
//! # Example
//!
//! ```no_run
//! use ledger_core::{Config, Ledger, UserId};
//! use rust_decimal::Decimal;
//!
//! #[tokio::main]
//! async fn main() -> ledger_core::Result<()> {
//!     let config = Config::default();
//!     let ledger = Ledger::open(config).await?;
//!
//!     let balance = ledger.deposit(UserId::new(1), Decimal::new(10000, 2)).await?;
//!     assert_eq!(balance, Decimal::new(10000, 2));
//!
//!     ledger.shutdown().await?;
//!     Ok(())
//! }
//! ```

use crate::{
    actor::{spawn_ledger_actor, LedgerHandle},
    metrics::Metrics,
    query::{paginate, TransactionQuery},
    storage::StorageStats,
    types::{OrderId, Reservation, ServiceId, Transaction, UserId},
    Config, Error, Result, Storage,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Instant;

/// Main ledger interface
///
/// Mutations go through the actor handle (totally ordered); reads go
/// directly against storage and never block writers.
pub struct Ledger {
    /// Actor handle for mutations
    handle: LedgerHandle,

    /// Direct storage access (for reads)
    storage: Arc<Storage>,

    /// Operation metrics
    metrics: Metrics,

    /// Configuration
    config: Config,
}

impl Ledger {
    /// Open ledger with configuration
    pub async fn open(config: Config) -> Result<Self> {
        // Open storage
        let storage = Arc::new(Storage::open(&config)?);

        // The writer owns the transaction-id counter from here on
        let next_transaction_id = storage.next_transaction_id()?;

        // Spawn actor
        let handle = spawn_ledger_actor(storage.clone(), next_transaction_id);

        let metrics = Metrics::new()
            .map_err(|e| Error::Config(format!("Failed to create metrics: {}", e)))?;

        Ok(Self {
            handle,
            storage,
            metrics,
            config,
        })
    }

    /// Deposit funds to a user's account
    ///
    /// Creates the account at zero if absent. Returns the new balance.
    pub async fn deposit(&self, user: UserId, amount: Decimal) -> Result<Decimal> {
        Self::validate_user(user)?;
        Self::validate_amount(amount)?;

        let start = Instant::now();
        let result = self.handle.deposit(user, amount).await;
        self.observe(start, result.is_ok());

        if result.is_ok() {
            self.metrics.record_deposit();
        }
        result
    }

    /// Get a user's current balance
    ///
    /// Soft read: returns zero for unknown users, never an error.
    pub fn get_balance(&self, user: UserId) -> Result<Decimal> {
        Self::validate_user(user)?;

        let balance = self
            .storage
            .get_account(user)?
            .map(|account| account.balance)
            .unwrap_or(Decimal::ZERO);

        Ok(balance)
    }

    /// Reserve funds against an order
    ///
    /// Debits the balance and creates the reservation in one atomic unit.
    pub async fn reserve(
        &self,
        user: UserId,
        service: ServiceId,
        order: OrderId,
        amount: Decimal,
    ) -> Result<Reservation> {
        Self::validate_user(user)?;
        Self::validate_service(service)?;
        Self::validate_order(order)?;
        Self::validate_amount(amount)?;

        let start = Instant::now();
        let result = self.handle.reserve(user, service, order, amount).await;
        self.observe(start, result.is_ok());

        if result.is_ok() {
            self.metrics.record_reservation();
        }
        result
    }

    /// Recognize a reserved hold into a permanent transaction record
    pub async fn recognize(&self, user: UserId, order: OrderId) -> Result<Transaction> {
        Self::validate_user(user)?;
        Self::validate_order(order)?;

        let start = Instant::now();
        let result = self.handle.recognize(user, order).await;
        self.observe(start, result.is_ok());

        if result.is_ok() {
            self.metrics.record_recognition();
        }
        result
    }

    /// Cancel a reserved hold, crediting the amount back
    pub async fn cancel(&self, user: UserId, order: OrderId) -> Result<Reservation> {
        Self::validate_user(user)?;
        Self::validate_order(order)?;

        let start = Instant::now();
        let result = self.handle.cancel(user, order).await;
        self.observe(start, result.is_ok());

        if result.is_ok() {
            self.metrics.record_cancellation();
        }
        result
    }

    /// Get a reservation by its (user, order) key
    pub fn get_reservation(&self, user: UserId, order: OrderId) -> Result<Reservation> {
        Self::validate_user(user)?;
        Self::validate_order(order)?;

        self.storage
            .get_reservation(user, order)?
            .ok_or(Error::ReservationNotFound { user, order })
    }

    /// List a user's transactions, sorted and paginated
    ///
    /// The page size is clamped to the configured maximum; an out-of-range
    /// skip yields an empty page.
    pub fn list_transactions(
        &self,
        user: UserId,
        query: &TransactionQuery,
    ) -> Result<Vec<Transaction>> {
        Self::validate_user(user)?;

        let transactions = self.storage.get_user_transactions(user)?;
        Ok(paginate(transactions, query, self.config.query.max_limit))
    }

    /// Query with the configured default page size
    pub fn default_query(&self) -> TransactionQuery {
        TransactionQuery {
            limit: self.config.query.default_limit,
            ..Default::default()
        }
    }

    /// Get storage statistics
    pub fn stats(&self) -> Result<StorageStats> {
        self.storage.get_stats()
    }

    /// Get operation metrics
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Shutdown ledger, waiting for the writer to drain and release storage
    pub async fn shutdown(self) -> Result<()> {
        let Self {
            handle, storage, ..
        } = self;

        // Drop our storage handle first; the actor acks once it drops its own
        drop(storage);
        handle.shutdown().await
    }

    // Validation

    fn validate_user(user: UserId) -> Result<()> {
        if !user.is_valid() {
            return Err(Error::Validation("user_id must be greater than 0".to_string()));
        }
        Ok(())
    }

    fn validate_service(service: ServiceId) -> Result<()> {
        if !service.is_valid() {
            return Err(Error::Validation("service_id must be greater than 0".to_string()));
        }
        Ok(())
    }

    fn validate_order(order: OrderId) -> Result<()> {
        if !order.is_valid() {
            return Err(Error::Validation("order_id must be greater than 0".to_string()));
        }
        Ok(())
    }

    fn validate_amount(amount: Decimal) -> Result<()> {
        if amount <= Decimal::ZERO {
            return Err(Error::Validation(format!(
                "amount must be greater than zero, got {}",
                amount
            )));
        }
        Ok(())
    }

    fn observe(&self, start: Instant, ok: bool) {
        self.metrics
            .record_operation_duration(start.elapsed().as_secs_f64());
        if !ok {
            self.metrics.record_rejection();
        }
    }
}
