//! Recompute-and-upsert and topup-total aggregation.

use std::collections::HashMap;

use chrono::Utc;

use egg_credit_core::{
    accumulate_topup_grant, rollup, Balance, PackageId, RecomputedBalance, Result, UserId,
};

use super::Ledger;

impl Ledger {
    /// Rebuild a user's balance from the event history and write it.
    ///
    /// All reads complete before the single terminal upsert; any read failure
    /// aborts without writing. Running it twice over unchanged data writes the
    /// same values.
    pub async fn recompute(&self, user_id: &UserId) -> Result<Balance> {
        let (events, main, topup) = tokio::try_join!(
            self.bounded("list_events", self.store.list_events(user_id)),
            self.bounded(
                "get_active_main_package",
                self.store.get_active_main_package(user_id)
            ),
            self.bounded(
                "get_active_topup_package",
                self.store.get_active_topup_package(user_id)
            ),
        )?;

        let main_grant = match &main {
            Some(assignment) => self
                .bounded("get_package", self.store.get_package(&assignment.package_id))
                .await?
                .map_or(0, |package| package.egg_token),
            None => 0,
        };
        let topup_grant = topup.map_or(0, |assignment| assignment.total_topup_token);

        let folded = rollup(&events);
        let values = RecomputedBalance::new(folded, main_grant.saturating_add(topup_grant));

        let balance = self
            .bounded(
                "upsert_balance",
                self.store.upsert_balance(user_id, &values, Utc::now()),
            )
            .await?;

        tracing::info!(
            user_id = %user_id,
            events = events.len(),
            main = values.main,
            topup = values.topup,
            remaining = values.remaining,
            total_token = values.total_token,
            "Balance recomputed"
        );
        Ok(balance)
    }

    /// Total tokens granted by a user's active topup purchases.
    ///
    /// Each package's purchase count is multiplied by its `eggToken`; packages
    /// missing from the master data contribute nothing.
    pub async fn recompute_total_topup_token(&self, user_id: &UserId) -> Result<i64> {
        let purchases = self
            .bounded(
                "list_active_topup_purchases",
                self.store.list_active_topup_purchases(user_id),
            )
            .await?;

        let mut grants: HashMap<PackageId, i64> = HashMap::new();
        for purchase in &purchases {
            if grants.contains_key(&purchase.package_id) {
                continue;
            }
            let grant = self
                .bounded("get_package", self.store.get_package(&purchase.package_id))
                .await?
                .map_or(0, |package| package.egg_token);
            grants.insert(purchase.package_id.clone(), grant);
        }

        let total = accumulate_topup_grant(&purchases, |id| grants.get(id).copied());
        tracing::debug!(user_id = %user_id, purchases = purchases.len(), total, "Topup total computed");
        Ok(total)
    }
}
