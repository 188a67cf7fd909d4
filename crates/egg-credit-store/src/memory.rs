//! In-memory storage implementation.
//!
//! All state lives behind one `RwLock`, so each write (including the balance
//! increment) is atomic with respect to every other store call.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use egg_credit_core::{
    Balance, BalanceDelta, LedgerEvent, MainPackageAssignment, Package, PackageId,
    RecomputedBalance, TopupPackageAssignment, TopupPurchase, UserId,
};

use crate::error::Result;
use crate::Store;

#[derive(Default)]
struct Inner {
    events: HashMap<UserId, Vec<LedgerEvent>>,
    packages: HashMap<PackageId, Package>,
    main_assignments: HashMap<UserId, Vec<MainPackageAssignment>>,
    topup_assignments: HashMap<UserId, Vec<TopupPackageAssignment>>,
    topup_purchases: HashMap<UserId, Vec<TopupPurchase>>,
    balances: HashMap<UserId, Balance>,
}

/// Memory-backed storage implementation.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a package.
    pub async fn put_package(&self, package: Package) {
        let mut inner = self.inner.write().await;
        inner.packages.insert(package.package_id.clone(), package);
    }

    /// Add a main package assignment.
    pub async fn put_main_assignment(&self, assignment: MainPackageAssignment) {
        let mut inner = self.inner.write().await;
        inner
            .main_assignments
            .entry(assignment.user_id.clone())
            .or_default()
            .push(assignment);
    }

    /// Add a topup package assignment.
    pub async fn put_topup_assignment(&self, assignment: TopupPackageAssignment) {
        let mut inner = self.inner.write().await;
        inner
            .topup_assignments
            .entry(assignment.user_id.clone())
            .or_default()
            .push(assignment);
    }

    /// Record a topup purchase.
    pub async fn put_topup_purchase(&self, purchase: TopupPurchase) {
        let mut inner = self.inner.write().await;
        inner
            .topup_purchases
            .entry(purchase.user_id.clone())
            .or_default()
            .push(purchase);
    }

    /// Insert or replace a balance document as-is.
    pub async fn put_balance(&self, balance: Balance) {
        let mut inner = self.inner.write().await;
        inner.balances.insert(balance.user_id.clone(), balance);
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_events(&self, user_id: &UserId) -> Result<Vec<LedgerEvent>> {
        let inner = self.inner.read().await;
        let mut events = inner.events.get(user_id).cloned().unwrap_or_default();
        events.sort_by(|a, b| (a.timestamp, &a.event_id).cmp(&(b.timestamp, &b.event_id)));
        Ok(events)
    }

    async fn append_event(&self, event: &LedgerEvent) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner
            .events
            .entry(event.user_id.clone())
            .or_default()
            .push(event.clone());
        Ok(())
    }

    async fn get_package(&self, package_id: &PackageId) -> Result<Option<Package>> {
        let inner = self.inner.read().await;
        Ok(inner.packages.get(package_id).cloned())
    }

    async fn get_active_main_package(
        &self,
        user_id: &UserId,
    ) -> Result<Option<MainPackageAssignment>> {
        let inner = self.inner.read().await;
        Ok(inner
            .main_assignments
            .get(user_id)
            .and_then(|list| list.iter().find(|a| a.is_active()))
            .cloned())
    }

    async fn get_active_topup_package(
        &self,
        user_id: &UserId,
    ) -> Result<Option<TopupPackageAssignment>> {
        let inner = self.inner.read().await;
        Ok(inner
            .topup_assignments
            .get(user_id)
            .and_then(|list| list.iter().find(|a| a.is_active()))
            .cloned())
    }

    async fn list_active_topup_purchases(&self, user_id: &UserId) -> Result<Vec<TopupPurchase>> {
        let inner = self.inner.read().await;
        Ok(inner
            .topup_purchases
            .get(user_id)
            .map(|list| list.iter().filter(|p| p.is_active()).cloned().collect())
            .unwrap_or_default())
    }

    async fn get_balance(&self, user_id: &UserId) -> Result<Option<Balance>> {
        let inner = self.inner.read().await;
        Ok(inner.balances.get(user_id).cloned())
    }

    async fn increment_balance(
        &self,
        user_id: &UserId,
        delta: &BalanceDelta,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner
            .balances
            .entry(user_id.clone())
            .or_insert_with(|| Balance::new(user_id.clone(), at))
            .apply_delta(delta, at);
        Ok(())
    }

    async fn upsert_balance(
        &self,
        user_id: &UserId,
        recomputed: &RecomputedBalance,
        at: DateTime<Utc>,
    ) -> Result<Balance> {
        let mut inner = self.inner.write().await;
        let existing = inner.balances.remove(user_id);
        let balance = Balance::upsert(existing, user_id.clone(), recomputed, at);
        inner.balances.insert(user_id.clone(), balance.clone());
        Ok(balance)
    }

    async fn list_balance_users(&self) -> Result<Vec<UserId>> {
        let inner = self.inner.read().await;
        let mut users: Vec<UserId> = inner.balances.keys().cloned().collect();
        users.sort();
        Ok(users)
    }
}
