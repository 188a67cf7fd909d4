//! Package master data and per-user package assignments.
//!
//! These documents are owned by the subscription system and only read here.
//! Numeric fields go through the lenient deserializers so the rest of the
//! ledger sees canonical values.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ids::{PackageId, SubscriptionId, UserId};

/// Status code of an active assignment or purchase.
pub const ACTIVE_STATUS: &str = "A";

/// A package in the master data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    /// Package identifier.
    pub package_id: PackageId,

    /// Tokens granted by one unit of the package.
    #[serde(default, deserialize_with = "crate::lenient::int")]
    pub egg_token: i64,

    /// THB per token. Absent, zero and negative ratios all mean 1.
    #[serde(default, deserialize_with = "crate::lenient::decimal")]
    pub conversion_ratio: Option<Decimal>,
}

impl Package {
    /// Conversion ratio with the default applied.
    #[must_use]
    pub fn ratio(&self) -> Decimal {
        crate::conversion::effective_ratio(self.conversion_ratio)
    }
}

/// A user's main (subscription) package assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MainPackageAssignment {
    /// Assigned user.
    pub user_id: UserId,
    /// Subscription the assignment came from.
    pub subscription_id: SubscriptionId,
    /// Assigned package.
    pub package_id: PackageId,
    /// Status code, [`ACTIVE_STATUS`] when active.
    pub status: String,
    /// Start of the subscription period.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    /// End of the subscription period.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
}

impl MainPackageAssignment {
    /// Check whether the assignment is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status.trim() == ACTIVE_STATUS
    }
}

/// A user's accumulated topup package assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopupPackageAssignment {
    /// Assigned user.
    pub user_id: UserId,
    /// Status code.
    pub status: String,
    /// Tokens granted by all topups purchased so far.
    #[serde(default, deserialize_with = "crate::lenient::int")]
    pub total_topup_token: i64,
    /// Start of the topup period.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    /// End of the topup period.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
}

impl TopupPackageAssignment {
    /// Check whether the assignment is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status.trim() == ACTIVE_STATUS
    }
}

/// One topup purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopupPurchase {
    /// Purchase identifier.
    pub topup_id: String,
    /// Purchasing user.
    pub user_id: UserId,
    /// Purchased package.
    pub package_id: PackageId,
    /// Status code.
    pub status: String,
}

impl TopupPurchase {
    /// Check whether the purchase is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status.trim() == ACTIVE_STATUS
    }
}

/// Sum the token grant of a user's topup purchases.
///
/// Purchases are counted per package and each count is multiplied by the grant
/// size `grant_of` returns for that package. Inactive purchases are ignored; a
/// package `grant_of` does not know contributes nothing.
pub fn accumulate_topup_grant<'a, I, F>(purchases: I, mut grant_of: F) -> i64
where
    I: IntoIterator<Item = &'a TopupPurchase>,
    F: FnMut(&PackageId) -> Option<i64>,
{
    let mut counts: BTreeMap<&PackageId, i64> = BTreeMap::new();
    for purchase in purchases.into_iter().filter(|p| p.is_active()) {
        *counts.entry(&purchase.package_id).or_default() += 1;
    }

    counts
        .into_iter()
        .map(|(package_id, count)| grant_of(package_id).unwrap_or(0).saturating_mul(count))
        .fold(0, i64::saturating_add)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn purchase(id: &str, package: &str, status: &str) -> TopupPurchase {
        TopupPurchase {
            topup_id: id.to_string(),
            user_id: UserId::new("user-1").unwrap(),
            package_id: PackageId::new(package).unwrap(),
            status: status.to_string(),
        }
    }

    #[test]
    fn package_normalizes_stored_numbers() {
        let package: Package = serde_json::from_value(json!({
            "packageId": "pkg-basic",
            "eggToken": 1500.9,
            "conversionRatio": "2.5"
        }))
        .unwrap();

        assert_eq!(package.egg_token, 1500);
        assert_eq!(package.ratio(), Decimal::new(25, 1));
    }

    #[test]
    fn package_without_ratio_uses_one() {
        let package: Package = serde_json::from_value(json!({
            "packageId": "pkg-basic",
            "eggToken": "abc",
            "conversionRatio": 0
        }))
        .unwrap();

        assert_eq!(package.egg_token, 0);
        assert_eq!(package.ratio(), Decimal::ONE);
    }

    #[test]
    fn assignment_activity() {
        let assignment: MainPackageAssignment = serde_json::from_value(json!({
            "userId": "user-1",
            "subscriptionId": "sub-1",
            "packageId": "pkg-basic",
            "status": "A",
            "startDate": "2025-08-01T00:00:00Z"
        }))
        .unwrap();
        assert!(assignment.is_active());
        assert!(assignment.end_date.is_none());

        let topup: TopupPackageAssignment = serde_json::from_value(json!({
            "userId": "user-1",
            "status": "C",
            "totalTopupToken": 400
        }))
        .unwrap();
        assert!(!topup.is_active());
        assert_eq!(topup.total_topup_token, 400);
    }

    #[test]
    fn topup_grant_multiplies_counts_by_grant() {
        let purchases = vec![
            purchase("t1", "pkg-small", "A"),
            purchase("t2", "pkg-small", "A"),
            purchase("t3", "pkg-large", "A"),
            purchase("t4", "pkg-large", "C"),
            purchase("t5", "pkg-gone", "A"),
        ];

        let total = accumulate_topup_grant(&purchases, |id| match id.as_str() {
            "pkg-small" => Some(100),
            "pkg-large" => Some(1000),
            _ => None,
        });

        assert_eq!(total, 1200);
    }

    #[test]
    fn no_purchases_means_no_grant() {
        assert_eq!(accumulate_topup_grant(&Vec::new(), |_| Some(100)), 0);
    }
}
