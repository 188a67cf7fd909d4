//! Common test utilities for egg credit integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{HeaderName, HeaderValue};
use axum::Router;
use axum_test::TestServer;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use egg_credit_core::{
    Balance, BalanceDelta, LedgerEvent, MainPackageAssignment, Package, PackageId,
    RecomputedBalance, SubscriptionId, TopupPackageAssignment, TopupPurchase, TraceId, UserId,
};
use egg_credit_service::{
    create_router, AppState, CostError, CostProvider, CostRow, Ledger, LedgerSettings,
    ServiceConfig,
};
use egg_credit_store::{MemoryStore, Store, StoreError};

/// Package every seeded user is subscribed to.
pub const MAIN_PACKAGE: &str = "pkg-main";

/// Grant of [`MAIN_PACKAGE`].
pub const MAIN_GRANT: i64 = 1000;

/// Cost provider returning canned rows.
#[derive(Default)]
pub struct FakeCosts {
    rows: Mutex<Vec<CostRow>>,
    rejection: Mutex<Option<u16>>,
    calls: AtomicUsize,
}

impl FakeCosts {
    /// Answer every lookup with these rows.
    pub fn set_rows(&self, rows: Vec<CostRow>) {
        *self.rows.lock().unwrap() = rows;
    }

    /// Answer every lookup with a rejection.
    pub fn reject_with(&self, status: u16) {
        *self.rejection.lock().unwrap() = Some(status);
    }

    /// Number of lookups made.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CostProvider for FakeCosts {
    async fn fetch_costs(&self, _trace_id: &TraceId) -> Result<Vec<CostRow>, CostError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(status) = *self.rejection.lock().unwrap() {
            return Err(CostError::Rejected {
                status,
                body: Some(serde_json::json!({"error": {"message": "rate limited"}})),
            });
        }
        Ok(self.rows.lock().unwrap().clone())
    }
}

/// Memory store with switchable failures and delays.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    fail_appends: AtomicBool,
    fail_increments: AtomicBool,
    fail_event_reads: AtomicBool,
    hang_balance_reads: AtomicBool,
    append_delay_ms: AtomicU64,
    increment_delay_ms: AtomicU64,
}

impl FlakyStore {
    pub fn fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }

    pub fn fail_increments(&self, fail: bool) {
        self.fail_increments.store(fail, Ordering::SeqCst);
    }

    pub fn fail_event_reads(&self, fail: bool) {
        self.fail_event_reads.store(fail, Ordering::SeqCst);
    }

    /// Make balance reads never complete.
    pub fn hang_balance_reads(&self, hang: bool) {
        self.hang_balance_reads.store(hang, Ordering::SeqCst);
    }

    /// Wait this long before each event append.
    pub fn delay_appends(&self, delay: Duration) {
        self.append_delay_ms.store(millis(delay), Ordering::SeqCst);
    }

    /// Wait this long before each balance increment.
    pub fn delay_increments(&self, delay: Duration) {
        self.increment_delay_ms.store(millis(delay), Ordering::SeqCst);
    }

    async fn pause(delay_ms: &AtomicU64) {
        let ms = delay_ms.load(Ordering::SeqCst);
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }

    fn check(flag: &AtomicBool) -> Result<(), StoreError> {
        if flag.load(Ordering::SeqCst) {
            Err(StoreError::Database("injected failure".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Store for FlakyStore {
    async fn list_events(&self, user_id: &UserId) -> Result<Vec<LedgerEvent>, StoreError> {
        Self::check(&self.fail_event_reads)?;
        self.inner.list_events(user_id).await
    }

    async fn append_event(&self, event: &LedgerEvent) -> Result<(), StoreError> {
        Self::pause(&self.append_delay_ms).await;
        Self::check(&self.fail_appends)?;
        self.inner.append_event(event).await
    }

    async fn get_package(&self, package_id: &PackageId) -> Result<Option<Package>, StoreError> {
        self.inner.get_package(package_id).await
    }

    async fn get_active_main_package(
        &self,
        user_id: &UserId,
    ) -> Result<Option<MainPackageAssignment>, StoreError> {
        self.inner.get_active_main_package(user_id).await
    }

    async fn get_active_topup_package(
        &self,
        user_id: &UserId,
    ) -> Result<Option<TopupPackageAssignment>, StoreError> {
        self.inner.get_active_topup_package(user_id).await
    }

    async fn list_active_topup_purchases(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<TopupPurchase>, StoreError> {
        self.inner.list_active_topup_purchases(user_id).await
    }

    async fn get_balance(&self, user_id: &UserId) -> Result<Option<Balance>, StoreError> {
        if self.hang_balance_reads.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.inner.get_balance(user_id).await
    }

    async fn increment_balance(
        &self,
        user_id: &UserId,
        delta: &BalanceDelta,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        Self::pause(&self.increment_delay_ms).await;
        Self::check(&self.fail_increments)?;
        self.inner.increment_balance(user_id, delta, at).await
    }

    async fn upsert_balance(
        &self,
        user_id: &UserId,
        recomputed: &RecomputedBalance,
        at: DateTime<Utc>,
    ) -> Result<Balance, StoreError> {
        self.inner.upsert_balance(user_id, recomputed, at).await
    }

    async fn list_balance_users(&self) -> Result<Vec<UserId>, StoreError> {
        self.inner.list_balance_users().await
    }
}

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// The store behind the service.
    pub store: Arc<FlakyStore>,
    /// The cost provider behind the service.
    pub costs: Arc<FakeCosts>,
    /// The ledger the service uses.
    pub ledger: Arc<Ledger>,
    /// The service API key for service-to-service requests.
    pub service_api_key: String,
}

impl TestHarness {
    /// Create a new test harness with a fresh store.
    pub fn new() -> Self {
        let service_api_key = "test-service-key".to_string();
        let config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            service_api_key: Some(service_api_key.clone()),
            ..ServiceConfig::default()
        };

        let store = Arc::new(FlakyStore::default());
        let costs = Arc::new(FakeCosts::default());
        let state = AppState::with_components(store.clone(), costs.clone(), config);
        let ledger = Arc::clone(&state.ledger);

        let router: Router = create_router(state);
        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            store,
            costs,
            ledger,
            service_api_key,
        }
    }

    /// The API key header for service requests.
    pub fn api_key_header(&self) -> (HeaderName, HeaderValue) {
        (
            HeaderName::from_static("x-api-key"),
            HeaderValue::from_str(&self.service_api_key).unwrap(),
        )
    }

    /// Subscribe a user to [`MAIN_PACKAGE`] and give them a balance document.
    pub async fn seed_user(&self, user_id: &UserId, main: i64, topup: i64, ratio: Option<Decimal>) {
        seed_user(&self.store.inner, user_id, main, topup, ratio).await;
    }

    /// Read a user's balance document straight from the store.
    pub async fn balance(&self, user_id: &UserId) -> Option<Balance> {
        self.store.get_balance(user_id).await.unwrap()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Add [`MAIN_PACKAGE`] and an active assignment of it for `user_id`.
pub async fn seed_main_package(store: &MemoryStore, user_id: &UserId, ratio: Option<Decimal>) {
    store
        .put_package(Package {
            package_id: PackageId::new(MAIN_PACKAGE).unwrap(),
            egg_token: MAIN_GRANT,
            conversion_ratio: ratio,
        })
        .await;
    store
        .put_main_assignment(MainPackageAssignment {
            user_id: user_id.clone(),
            subscription_id: SubscriptionId::new("sub-1").unwrap(),
            package_id: PackageId::new(MAIN_PACKAGE).unwrap(),
            status: "A".into(),
            start_date: None,
            end_date: None,
        })
        .await;
}

/// Subscribe a user to [`MAIN_PACKAGE`] and give them a balance document.
pub async fn seed_user(
    store: &MemoryStore,
    user_id: &UserId,
    main: i64,
    topup: i64,
    ratio: Option<Decimal>,
) {
    seed_main_package(store, user_id, ratio).await;
    let mut balance = Balance::new(user_id.clone(), Utc::now());
    balance.total_token = MAIN_GRANT;
    balance.main_token_balance = main;
    balance.topup_token_balance = topup;
    balance.remaining_token_balance = main + topup;
    store.put_balance(balance).await;
}

/// A ledger over its own flaky store and fake costs, without an HTTP server.
pub fn bare_ledger(settings: LedgerSettings) -> (Arc<FlakyStore>, Arc<FakeCosts>, Arc<Ledger>) {
    let store = Arc::new(FlakyStore::default());
    let costs = Arc::new(FakeCosts::default());
    let ledger = Arc::new(Ledger::new(store.clone(), costs.clone(), settings));
    (store, costs, ledger)
}

fn millis(delay: Duration) -> u64 {
    u64::try_from(delay.as_millis()).unwrap()
}

/// Shorthand for a valid user ID.
pub fn user(raw: &str) -> UserId {
    UserId::new(raw).unwrap()
}

/// A single cost row of `cents`.
pub fn cost_row(model: &str, cents: i64) -> CostRow {
    CostRow::new(Some(model), Decimal::from(cents))
}
