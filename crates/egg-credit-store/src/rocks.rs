//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store` trait.
//! Values are CBOR-encoded. Balance increments are written as merge operands so
//! that concurrent debits never lose an update; the merge operator folds them
//! into the stored document on read and during compaction.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode,
    MergeOperands, MultiThreaded, Options,
};
use serde::{Deserialize, Serialize};

use egg_credit_core::{
    Balance, BalanceDelta, LedgerEvent, MainPackageAssignment, Package, PackageId,
    RecomputedBalance, TopupPackageAssignment, TopupPurchase, UserId,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf, BALANCE_MERGE_OPERATOR};
use crate::Store;

type Db = DBWithThreadMode<MultiThreaded>;

/// One queued balance increment.
#[derive(Debug, Serialize, Deserialize)]
struct BalanceOp {
    delta: BalanceDelta,
    at: DateTime<Utc>,
}

/// RocksDB-backed storage implementation.
#[derive(Clone)]
pub struct RocksStore {
    db: Arc<Db>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| {
                let mut cf_opts = Options::default();
                if name == cf::BALANCES {
                    cf_opts.set_merge_operator(
                        BALANCE_MERGE_OPERATOR,
                        full_merge_balance,
                        partial_merge_balance,
                    );
                }
                ColumnFamilyDescriptor::new(name, cf_opts)
            })
            .collect();

        let db = Db::open_cf_descriptors(&opts, path.as_ref(), cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        tracing::info!(path = %path.as_ref().display(), "Opened RocksDB store");
        Ok(Self { db: Arc::new(db) })
    }

    // =========================================================================
    // Reference Data Writers
    // =========================================================================

    /// Insert or replace a package.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn put_package(&self, package: &Package) -> Result<()> {
        put(
            &self.db,
            cf::PACKAGES,
            keys::package_key(&package.package_id),
            package,
        )
    }

    /// Insert or replace a main package assignment.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn put_main_assignment(&self, assignment: &MainPackageAssignment) -> Result<()> {
        let key = keys::user_scoped_key(&assignment.user_id, assignment.subscription_id.as_str());
        put(&self.db, cf::MAIN_ASSIGNMENTS, key, assignment)
    }

    /// Insert or replace the user's topup package assignment.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn put_topup_assignment(&self, assignment: &TopupPackageAssignment) -> Result<()> {
        let key = keys::balance_key(&assignment.user_id);
        put(&self.db, cf::TOPUP_ASSIGNMENTS, key, assignment)
    }

    /// Insert or replace a topup purchase.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn put_topup_purchase(&self, purchase: &TopupPurchase) -> Result<()> {
        let key = keys::user_scoped_key(&purchase.user_id, &purchase.topup_id);
        put(&self.db, cf::TOPUP_PURCHASES, key, purchase)
    }

    /// Run a blocking database closure off the async executor.
    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Db) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?
    }
}

/// Get a column family handle.
fn cf_handle<'a>(db: &'a Db, name: &str) -> Result<Arc<BoundColumnFamily<'a>>> {
    db.cf_handle(name)
        .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
}

/// Serialize a value using CBOR.
fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(buf)
}

/// Deserialize a value from CBOR.
fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
    ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn get<T: serde::de::DeserializeOwned>(db: &Db, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
    let cf = cf_handle(db, cf_name)?;
    db.get_cf(&cf, key)
        .map_err(|e| StoreError::Database(e.to_string()))?
        .map(|data| deserialize(&data))
        .transpose()
}

fn put<T: Serialize>(db: &Db, cf_name: &str, key: Vec<u8>, value: &T) -> Result<()> {
    let cf = cf_handle(db, cf_name)?;
    let value = serialize(value)?;
    db.put_cf(&cf, key, value)
        .map_err(|e| StoreError::Database(e.to_string()))
}

/// Collect every value whose key starts with `prefix`, in key order.
fn scan_prefix<T: serde::de::DeserializeOwned>(
    db: &Db,
    cf_name: &str,
    prefix: &[u8],
) -> Result<Vec<T>> {
    let cf = cf_handle(db, cf_name)?;
    let iter = db.iterator_cf(&cf, IteratorMode::From(prefix, Direction::Forward));

    let mut values = Vec::new();
    for item in iter {
        let (key, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
        if !key.starts_with(prefix) {
            break;
        }
        values.push(deserialize(&value)?);
    }
    Ok(values)
}

fn decode_ops(operands: &MergeOperands) -> Option<Vec<BalanceOp>> {
    let mut ops = Vec::new();
    for operand in operands.iter() {
        match deserialize::<Vec<BalanceOp>>(operand) {
            Ok(batch) => ops.extend(batch),
            Err(e) => {
                tracing::error!(error = %e, "Undecodable balance merge operand");
                return None;
            }
        }
    }
    Some(ops)
}

/// Apply queued increments to the stored balance, creating it when missing.
fn full_merge_balance(
    key: &[u8],
    existing: Option<&[u8]>,
    operands: &MergeOperands,
) -> Option<Vec<u8>> {
    let ops = decode_ops(operands)?;

    let mut balance = match existing {
        Some(data) => match deserialize::<Balance>(data) {
            Ok(balance) => balance,
            Err(e) => {
                tracing::error!(error = %e, "Undecodable balance document");
                return None;
            }
        },
        None => {
            let user_id = keys::user_from_balance_key(key).ok()?;
            let created = ops.first().map_or_else(Utc::now, |op| op.at);
            Balance::new(user_id, created)
        }
    };

    for op in &ops {
        balance.apply_delta(&op.delta, op.at);
    }
    serialize(&balance).ok()
}

/// Concatenate queued increments without a base document.
fn partial_merge_balance(
    _key: &[u8],
    _existing: Option<&[u8]>,
    operands: &MergeOperands,
) -> Option<Vec<u8>> {
    serialize(&decode_ops(operands)?).ok()
}

#[async_trait]
impl Store for RocksStore {
    // =========================================================================
    // Event Store
    // =========================================================================

    async fn list_events(&self, user_id: &UserId) -> Result<Vec<LedgerEvent>> {
        let prefix = keys::user_prefix(user_id);
        self.blocking(move |db| scan_prefix(db, cf::EVENTS, &prefix))
            .await
    }

    async fn append_event(&self, event: &LedgerEvent) -> Result<()> {
        let key = keys::event_key(&event.user_id, event.timestamp, &event.event_id);
        let value = serialize(event)?;
        self.blocking(move |db| {
            let cf = cf_handle(db, cf::EVENTS)?;
            db.put_cf(&cf, key, value)
                .map_err(|e| StoreError::Database(e.to_string()))
        })
        .await
    }

    // =========================================================================
    // Reference Data
    // =========================================================================

    async fn get_package(&self, package_id: &PackageId) -> Result<Option<Package>> {
        let key = keys::package_key(package_id);
        self.blocking(move |db| get(db, cf::PACKAGES, &key)).await
    }

    async fn get_active_main_package(
        &self,
        user_id: &UserId,
    ) -> Result<Option<MainPackageAssignment>> {
        let prefix = keys::user_prefix(user_id);
        self.blocking(move |db| {
            let assignments: Vec<MainPackageAssignment> =
                scan_prefix(db, cf::MAIN_ASSIGNMENTS, &prefix)?;
            Ok(assignments.into_iter().find(MainPackageAssignment::is_active))
        })
        .await
    }

    async fn get_active_topup_package(
        &self,
        user_id: &UserId,
    ) -> Result<Option<TopupPackageAssignment>> {
        let key = keys::balance_key(user_id);
        self.blocking(move |db| {
            let assignment: Option<TopupPackageAssignment> =
                get(db, cf::TOPUP_ASSIGNMENTS, &key)?;
            Ok(assignment.filter(TopupPackageAssignment::is_active))
        })
        .await
    }

    async fn list_active_topup_purchases(&self, user_id: &UserId) -> Result<Vec<TopupPurchase>> {
        let prefix = keys::user_prefix(user_id);
        self.blocking(move |db| {
            let purchases: Vec<TopupPurchase> = scan_prefix(db, cf::TOPUP_PURCHASES, &prefix)?;
            Ok(purchases.into_iter().filter(TopupPurchase::is_active).collect())
        })
        .await
    }

    // =========================================================================
    // Balance Store
    // =========================================================================

    async fn get_balance(&self, user_id: &UserId) -> Result<Option<Balance>> {
        let key = keys::balance_key(user_id);
        self.blocking(move |db| get(db, cf::BALANCES, &key)).await
    }

    async fn increment_balance(
        &self,
        user_id: &UserId,
        delta: &BalanceDelta,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let key = keys::balance_key(user_id);
        let operand = serialize(&vec![BalanceOp { delta: *delta, at }])?;
        self.blocking(move |db| {
            let cf = cf_handle(db, cf::BALANCES)?;
            db.merge_cf(&cf, key, operand)
                .map_err(|e| StoreError::Database(e.to_string()))
        })
        .await
    }

    /// Read-modify-write of the balance document.
    ///
    /// An increment merged between the read and the write is overwritten; the
    /// recompute result is authoritative.
    async fn upsert_balance(
        &self,
        user_id: &UserId,
        recomputed: &RecomputedBalance,
        at: DateTime<Utc>,
    ) -> Result<Balance> {
        let key = keys::balance_key(user_id);
        let user_id = user_id.clone();
        let recomputed = *recomputed;
        self.blocking(move |db| {
            let existing: Option<Balance> = get(db, cf::BALANCES, &key)?;
            let balance = Balance::upsert(existing, user_id, &recomputed, at);
            put(db, cf::BALANCES, key, &balance)?;
            Ok(balance)
        })
        .await
    }

    async fn list_balance_users(&self) -> Result<Vec<UserId>> {
        self.blocking(|db| {
            let cf = cf_handle(db, cf::BALANCES)?;
            let mut users = Vec::new();
            for item in db.iterator_cf(&cf, IteratorMode::Start) {
                let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;
                users.push(keys::user_from_balance_key(&key)?);
            }
            Ok(users)
        })
        .await
    }
}
