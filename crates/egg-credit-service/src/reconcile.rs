//! Periodic reconciliation of balance documents.
//!
//! The fast-path debit lets a balance drift from what its history folds to. The
//! reconciler re-runs recompute-and-upsert for every user with a balance
//! document, which brings every balance back in line with its events.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use egg_credit_core::Result;

use crate::ledger::Ledger;

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    /// Users whose balance was recomputed.
    pub recomputed: usize,
    /// Users whose recompute failed.
    pub failed: usize,
}

/// Recompute every balance once, `concurrency` users at a time.
///
/// Per-user failures are logged and counted; only failing to list the users
/// fails the pass.
pub async fn reconcile_all(ledger: &Ledger, concurrency: usize) -> Result<ReconcileSummary> {
    let users = ledger.balance_users().await?;

    let summary = stream::iter(users)
        .map(|user_id| async move {
            let outcome = ledger.recompute(&user_id).await;
            (user_id, outcome)
        })
        .buffer_unordered(concurrency.max(1))
        .fold(ReconcileSummary::default(), |mut summary, (user_id, outcome)| async move {
            match outcome {
                Ok(_) => summary.recomputed += 1,
                Err(e) => {
                    summary.failed += 1;
                    tracing::warn!(user_id = %user_id, error = %e, "Recompute failed");
                }
            }
            summary
        })
        .await;

    tracing::info!(
        recomputed = summary.recomputed,
        failed = summary.failed,
        "Reconciliation pass finished"
    );
    Ok(summary)
}

/// Spawn the periodic reconciler.
///
/// The first pass runs one `interval` after startup.
#[must_use]
pub fn spawn(ledger: Arc<Ledger>, interval: Duration, concurrency: usize) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if let Err(e) = reconcile_all(&ledger, concurrency).await {
                tracing::error!(error = %e, "Reconciliation pass failed");
            }
        }
    })
}
