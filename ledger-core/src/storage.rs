//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `accounts` - Account balances (key: user_id)
//! - `reservations` - Reservation rows (key: user_id || order_id)
//! - `transactions` - Append-only transaction log (key: transaction_id)
//! - `indices` - Secondary indices for fast lookups (user_id || transaction_id)
//! - `meta` - Counters (next transaction id)
//!
//! Compound mutations (reserve, recognize, cancel) commit through a single
//! `WriteBatch` so a crash between the sub-writes is never observable.

use crate::{
    error::{Error, Result},
    types::{Account, OrderId, Reservation, Transaction, UserId},
    Config,
};
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, DBCompactionStyle, Direction, IteratorMode, Options,
    WriteBatch, DB,
};
use std::sync::Arc;

/// Column family names
const CF_ACCOUNTS: &str = "accounts";
const CF_RESERVATIONS: &str = "reservations";
const CF_TRANSACTIONS: &str = "transactions";
const CF_INDICES: &str = "indices";
const CF_META: &str = "meta";

/// Meta key holding the next transaction id
const META_NEXT_TXN_ID: &[u8] = b"next_txn_id";

/// Storage wrapper for RocksDB
pub struct Storage {
    db: Arc<DB>,
    // Column family handles are stored in DB, accessed by name
}

impl Storage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        // Create directory if not exists
        std::fs::create_dir_all(path)?;

        // Database options
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        // Tuning from config
        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_target_file_size_base(config.rocksdb.target_file_size_mb * 1024 * 1024);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        // Universal compaction for write-heavy workload
        db_opts.set_compaction_style(DBCompactionStyle::Universal);

        // Column family descriptors
        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_ACCOUNTS, Self::cf_options_accounts()),
            ColumnFamilyDescriptor::new(CF_RESERVATIONS, Self::cf_options_reservations()),
            ColumnFamilyDescriptor::new(CF_TRANSACTIONS, Self::cf_options_transactions()),
            ColumnFamilyDescriptor::new(CF_INDICES, Self::cf_options_indices()),
            ColumnFamilyDescriptor::new(CF_META, Options::default()),
        ];

        // Open database
        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!(path = ?path, "Opened RocksDB");

        Ok(Self { db: Arc::new(db) })
    }

    // Column family options

    fn cf_options_accounts() -> Options {
        let mut opts = Options::default();
        // Balances are frequently read, use LZ4 for speed
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_options_reservations() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_options_transactions() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts.set_bottommost_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf_options_indices() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        // Indices benefit from bloom filters
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false); // 10 bits per key
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    // Helper: get column family handle

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    // Key helpers (big-endian so byte order matches numeric order)

    fn account_key(user: UserId) -> [u8; 8] {
        user.get().to_be_bytes()
    }

    fn reservation_key(user: UserId, order: OrderId) -> [u8; 16] {
        let mut key = [0u8; 16];
        key[..8].copy_from_slice(&user.get().to_be_bytes());
        key[8..].copy_from_slice(&order.get().to_be_bytes());
        key
    }

    fn transaction_key(id: u64) -> [u8; 8] {
        id.to_be_bytes()
    }

    fn index_key_user_transaction(user: UserId, transaction_id: u64) -> [u8; 16] {
        let mut key = [0u8; 16];
        key[..8].copy_from_slice(&user.get().to_be_bytes());
        key[8..].copy_from_slice(&transaction_id.to_be_bytes());
        key
    }

    // Account operations

    /// Get account by user id, `None` if the user has never deposited
    pub fn get_account(&self, user: UserId) -> Result<Option<Account>> {
        let cf = self.cf_handle(CF_ACCOUNTS)?;

        match self.db.get_cf(cf, Self::account_key(user))? {
            Some(value) => {
                let account: Account = bincode::deserialize(&value)?;
                Ok(Some(account))
            }
            None => Ok(None),
        }
    }

    /// Put account (single, unbatched — used by deposit)
    pub fn put_account(&self, account: &Account) -> Result<()> {
        let cf = self.cf_handle(CF_ACCOUNTS)?;
        let value = bincode::serialize(account)?;

        self.db.put_cf(cf, Self::account_key(account.user_id), &value)?;

        tracing::debug!(
            user_id = %account.user_id,
            balance = %account.balance,
            "Account updated"
        );

        Ok(())
    }

    // Reservation operations

    /// Get reservation by (user, order) key
    pub fn get_reservation(&self, user: UserId, order: OrderId) -> Result<Option<Reservation>> {
        let cf = self.cf_handle(CF_RESERVATIONS)?;

        match self.db.get_cf(cf, Self::reservation_key(user, order))? {
            Some(value) => {
                let reservation: Reservation = bincode::deserialize(&value)?;
                Ok(Some(reservation))
            }
            None => Ok(None),
        }
    }

    // Transaction operations

    /// Get transaction by id
    pub fn get_transaction(&self, id: u64) -> Result<Option<Transaction>> {
        let cf = self.cf_handle(CF_TRANSACTIONS)?;

        match self.db.get_cf(cf, Self::transaction_key(id))? {
            Some(value) => {
                let txn: Transaction = bincode::deserialize(&value)?;
                Ok(Some(txn))
            }
            None => Ok(None),
        }
    }

    /// Get all transactions for a user (via index)
    pub fn get_user_transactions(&self, user: UserId) -> Result<Vec<Transaction>> {
        let cf_indices = self.cf_handle(CF_INDICES)?;

        let prefix = user.get().to_be_bytes();
        let iter = self
            .db
            .iterator_cf(cf_indices, IteratorMode::From(&prefix, Direction::Forward));

        let mut transactions = Vec::new();
        for item in iter {
            let (key, _) = item?;

            // Stop once the scan leaves this user's prefix
            if key.len() < 16 || key[..8] != prefix {
                break;
            }

            let id_bytes: [u8; 8] = key[8..16]
                .try_into()
                .map_err(|_| Error::Storage("Malformed index key".to_string()))?;
            let id = u64::from_be_bytes(id_bytes);

            let txn = self.get_transaction(id)?.ok_or_else(|| {
                Error::Storage(format!("Index points at missing transaction {}", id))
            })?;
            transactions.push(txn);
        }

        Ok(transactions)
    }

    /// Next transaction id to assign (1 if the ledger is empty)
    pub fn next_transaction_id(&self) -> Result<u64> {
        let cf = self.cf_handle(CF_META)?;

        match self.db.get_cf(cf, META_NEXT_TXN_ID)? {
            Some(value) => {
                let bytes: [u8; 8] = value
                    .as_slice()
                    .try_into()
                    .map_err(|_| Error::Storage("Malformed transaction counter".to_string()))?;
                Ok(u64::from_be_bytes(bytes))
            }
            None => Ok(1),
        }
    }

    // Compound operations (atomic)

    /// Commit a reserve: debited account + new reservation (atomic)
    pub fn commit_reserve(&self, account: &Account, reservation: &Reservation) -> Result<()> {
        let mut batch = WriteBatch::default();

        let cf_accounts = self.cf_handle(CF_ACCOUNTS)?;
        batch.put_cf(
            cf_accounts,
            Self::account_key(account.user_id),
            bincode::serialize(account)?,
        );

        let cf_reservations = self.cf_handle(CF_RESERVATIONS)?;
        batch.put_cf(
            cf_reservations,
            Self::reservation_key(reservation.user_id, reservation.order_id),
            bincode::serialize(reservation)?,
        );

        self.db.write(batch)?;

        tracing::debug!(
            user_id = %reservation.user_id,
            order_id = %reservation.order_id,
            amount = %reservation.amount,
            "Reservation committed"
        );

        Ok(())
    }

    /// Commit a recognition: flipped reservation + transaction record +
    /// user index + bumped counter (atomic)
    pub fn commit_recognize(&self, reservation: &Reservation, txn: &Transaction) -> Result<()> {
        let mut batch = WriteBatch::default();

        let cf_reservations = self.cf_handle(CF_RESERVATIONS)?;
        batch.put_cf(
            cf_reservations,
            Self::reservation_key(reservation.user_id, reservation.order_id),
            bincode::serialize(reservation)?,
        );

        let cf_transactions = self.cf_handle(CF_TRANSACTIONS)?;
        batch.put_cf(
            cf_transactions,
            Self::transaction_key(txn.id),
            bincode::serialize(txn)?,
        );

        let cf_indices = self.cf_handle(CF_INDICES)?;
        batch.put_cf(
            cf_indices,
            Self::index_key_user_transaction(txn.user_id, txn.id),
            [],
        );

        let cf_meta = self.cf_handle(CF_META)?;
        batch.put_cf(cf_meta, META_NEXT_TXN_ID, (txn.id + 1).to_be_bytes());

        self.db.write(batch)?;

        tracing::debug!(
            user_id = %txn.user_id,
            order_id = %txn.order_id,
            transaction_id = txn.id,
            amount = %txn.amount,
            "Transaction recognized"
        );

        Ok(())
    }

    /// Commit a cancellation: flipped reservation + credited account (atomic)
    pub fn commit_cancel(&self, reservation: &Reservation, account: &Account) -> Result<()> {
        let mut batch = WriteBatch::default();

        let cf_reservations = self.cf_handle(CF_RESERVATIONS)?;
        batch.put_cf(
            cf_reservations,
            Self::reservation_key(reservation.user_id, reservation.order_id),
            bincode::serialize(reservation)?,
        );

        let cf_accounts = self.cf_handle(CF_ACCOUNTS)?;
        batch.put_cf(
            cf_accounts,
            Self::account_key(account.user_id),
            bincode::serialize(account)?,
        );

        self.db.write(batch)?;

        tracing::debug!(
            user_id = %reservation.user_id,
            order_id = %reservation.order_id,
            amount = %reservation.amount,
            "Reservation cancelled"
        );

        Ok(())
    }

    // Statistics

    /// Get storage statistics
    pub fn get_stats(&self) -> Result<StorageStats> {
        let cf_accounts = self.cf_handle(CF_ACCOUNTS)?;
        let cf_reservations = self.cf_handle(CF_RESERVATIONS)?;
        let cf_transactions = self.cf_handle(CF_TRANSACTIONS)?;

        Ok(StorageStats {
            total_accounts: self.approximate_count(cf_accounts)?,
            total_reservations: self.approximate_count(cf_reservations)?,
            total_transactions: self.approximate_count(cf_transactions)?,
        })
    }

    fn approximate_count(&self, cf: &ColumnFamily) -> Result<u64> {
        // RocksDB property for approximate count
        let prop = self
            .db
            .property_int_value_cf(cf, "rocksdb.estimate-num-keys")?
            .unwrap_or(0);

        Ok(prop)
    }

    /// Close database (graceful shutdown)
    pub fn close(self) -> Result<()> {
        drop(self.db);
        tracing::info!("RocksDB closed gracefully");
        Ok(())
    }
}

/// Storage statistics
#[derive(Debug, Clone)]
pub struct StorageStats {
    /// Accounts with at least one deposit
    pub total_accounts: u64,
    /// Reservations in any state
    pub total_reservations: u64,
    /// Recognized transactions
    pub total_transactions: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ReservationStatus, ServiceId};
    use chrono::Utc;
    use rust_decimal::Decimal;
    use tempfile::TempDir;

    fn test_config() -> (Config, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        (config, temp_dir)
    }

    fn test_account(user: u64, balance: Decimal) -> Account {
        let mut account = Account::new(UserId::new(user));
        account.balance = balance;
        account
    }

    fn test_reservation(user: u64, order: u64, amount: Decimal) -> Reservation {
        Reservation::new(
            UserId::new(user),
            ServiceId::new(5),
            OrderId::new(order),
            amount,
        )
    }

    fn test_transaction(id: u64, user: u64, amount: Decimal) -> Transaction {
        Transaction {
            id,
            user_id: UserId::new(user),
            service_id: ServiceId::new(5),
            order_id: OrderId::new(id),
            amount,
            timestamp_nanos: Utc::now().timestamp_nanos_opt().unwrap(),
        }
    }

    #[test]
    fn test_storage_open() {
        let (config, _temp) = test_config();
        let storage = Storage::open(&config).unwrap();
        assert!(storage.db.cf_handle(CF_ACCOUNTS).is_some());
        assert!(storage.db.cf_handle(CF_RESERVATIONS).is_some());
        assert!(storage.db.cf_handle(CF_TRANSACTIONS).is_some());
    }

    #[test]
    fn test_account_roundtrip() {
        let (config, _temp) = test_config();
        let storage = Storage::open(&config).unwrap();

        let user = UserId::new(1);
        assert!(storage.get_account(user).unwrap().is_none());

        let account = test_account(1, Decimal::new(10000, 2));
        storage.put_account(&account).unwrap();

        let retrieved = storage.get_account(user).unwrap().unwrap();
        assert_eq!(retrieved.user_id, user);
        assert_eq!(retrieved.balance, Decimal::new(10000, 2));
    }

    #[test]
    fn test_commit_reserve_atomic() {
        let (config, _temp) = test_config();
        let storage = Storage::open(&config).unwrap();

        let account = test_account(1, Decimal::new(6000, 2));
        let reservation = test_reservation(1, 42, Decimal::new(4000, 2));

        storage.commit_reserve(&account, &reservation).unwrap();

        // Both sides of the batch are visible
        let retrieved_account = storage.get_account(UserId::new(1)).unwrap().unwrap();
        assert_eq!(retrieved_account.balance, Decimal::new(6000, 2));

        let retrieved = storage
            .get_reservation(UserId::new(1), OrderId::new(42))
            .unwrap()
            .unwrap();
        assert_eq!(retrieved.status, ReservationStatus::Reserved);
        assert_eq!(retrieved.amount, Decimal::new(4000, 2));
    }

    #[test]
    fn test_commit_recognize_atomic() {
        let (config, _temp) = test_config();
        let storage = Storage::open(&config).unwrap();

        let mut reservation = test_reservation(1, 42, Decimal::new(4000, 2));
        reservation.recognize().unwrap();
        let txn = test_transaction(1, 1, Decimal::new(4000, 2));

        storage.commit_recognize(&reservation, &txn).unwrap();

        let retrieved = storage
            .get_reservation(UserId::new(1), OrderId::new(42))
            .unwrap()
            .unwrap();
        assert_eq!(retrieved.status, ReservationStatus::Recognized);

        let retrieved_txn = storage.get_transaction(1).unwrap().unwrap();
        assert_eq!(retrieved_txn.amount, Decimal::new(4000, 2));

        // Counter bumped in the same batch
        assert_eq!(storage.next_transaction_id().unwrap(), 2);

        // Index resolves the transaction by user
        let txns = storage.get_user_transactions(UserId::new(1)).unwrap();
        assert_eq!(txns.len(), 1);
        assert_eq!(txns[0].id, 1);
    }

    #[test]
    fn test_commit_cancel_atomic() {
        let (config, _temp) = test_config();
        let storage = Storage::open(&config).unwrap();

        let mut reservation = test_reservation(1, 42, Decimal::new(4000, 2));
        reservation.cancel().unwrap();
        let account = test_account(1, Decimal::new(10000, 2));

        storage.commit_cancel(&reservation, &account).unwrap();

        let retrieved = storage
            .get_reservation(UserId::new(1), OrderId::new(42))
            .unwrap()
            .unwrap();
        assert_eq!(retrieved.status, ReservationStatus::Cancelled);

        let retrieved_account = storage.get_account(UserId::new(1)).unwrap().unwrap();
        assert_eq!(retrieved_account.balance, Decimal::new(10000, 2));
    }

    #[test]
    fn test_next_transaction_id_defaults_to_one() {
        let (config, _temp) = test_config();
        let storage = Storage::open(&config).unwrap();
        assert_eq!(storage.next_transaction_id().unwrap(), 1);
    }

    #[test]
    fn test_user_transactions_isolated_by_user() {
        let (config, _temp) = test_config();
        let storage = Storage::open(&config).unwrap();

        for (id, user) in [(1u64, 1u64), (2, 2), (3, 1)] {
            let mut reservation = test_reservation(user, id, Decimal::ONE);
            reservation.recognize().unwrap();
            let txn = test_transaction(id, user, Decimal::ONE);
            storage.commit_recognize(&reservation, &txn).unwrap();
        }

        let user1 = storage.get_user_transactions(UserId::new(1)).unwrap();
        assert_eq!(user1.len(), 2);
        assert!(user1.iter().all(|t| t.user_id == UserId::new(1)));

        let user2 = storage.get_user_transactions(UserId::new(2)).unwrap();
        assert_eq!(user2.len(), 1);

        let user3 = storage.get_user_transactions(UserId::new(3)).unwrap();
        assert!(user3.is_empty());
    }

    #[test]
    fn test_counter_survives_reopen() {
        let (config, _temp) = test_config();

        {
            let storage = Storage::open(&config).unwrap();
            let mut reservation = test_reservation(1, 42, Decimal::ONE);
            reservation.recognize().unwrap();
            let txn = test_transaction(1, 1, Decimal::ONE);
            storage.commit_recognize(&reservation, &txn).unwrap();
            storage.close().unwrap();
        }

        let storage = Storage::open(&config).unwrap();
        assert_eq!(storage.next_transaction_id().unwrap(), 2);
        let txns = storage.get_user_transactions(UserId::new(1)).unwrap();
        assert_eq!(txns.len(), 1);
    }
}
