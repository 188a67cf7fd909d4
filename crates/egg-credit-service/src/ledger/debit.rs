//! Atomic fast-path debit.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use egg_credit_core::{
    price_usage, split, AgentId, BalanceDelta, LedgerError, LedgerEvent, PreconditionKind,
    Result, TraceId, UsageCost, UserId,
};

use super::Ledger;
use crate::portkey::CostRow;

/// One usage to be charged.
#[derive(Debug, Clone)]
pub struct DebitRequest {
    /// User to charge.
    pub user_id: UserId,
    /// Trace whose metered cost is charged.
    pub trace_id: TraceId,
    /// Agent that generated the usage.
    pub agent_id: Option<AgentId>,
    /// Websearch cost in USD reported by the caller.
    pub websearch_cost_usd: Option<Decimal>,
}

/// Sum of a trace's cost rows and the first model named among them.
fn summarize(rows: &[CostRow]) -> (Decimal, Option<String>) {
    let total = rows.iter().map(|row| row.cost_cents).sum();
    let model = rows.iter().find_map(|row| row.ai_model.clone());
    (total, model)
}

impl Ledger {
    /// Charge one usage against the user's balance document.
    ///
    /// The pool split is computed from the balance read at the start of the
    /// request and applied as an unconditional increment, so concurrent debits
    /// for the same user can drive a pool transiently negative until the next
    /// recompute. Returns the usage event recorded for the debit.
    pub async fn debit(&self, request: DebitRequest) -> Result<LedgerEvent> {
        let DebitRequest {
            user_id,
            trace_id,
            agent_id,
            websearch_cost_usd,
        } = request;

        let websearch_usd = websearch_cost_usd.unwrap_or(Decimal::ZERO);
        if websearch_usd < Decimal::ZERO {
            return Err(LedgerError::Validation(
                "websearchCost must not be negative".into(),
            ));
        }

        let (assignment, balance) = tokio::try_join!(
            async {
                self.bounded(
                    "get_active_main_package",
                    self.store.get_active_main_package(&user_id),
                )
                .await?
                .ok_or(LedgerError::Precondition(PreconditionKind::NoMainPackage))
            },
            async {
                self.bounded("get_balance", self.store.get_balance(&user_id))
                    .await?
                    .ok_or(LedgerError::Precondition(PreconditionKind::NoBalance))
            },
        )?;

        if !balance.has_remaining() {
            return Err(LedgerError::ExhaustedBalance {
                remaining: balance.remaining_token_balance,
            });
        }

        let rows = self.costs.fetch_costs(&trace_id).await?;
        let (chat_cents, ai_model) = summarize(&rows);
        if rows.is_empty() || chat_cents <= Decimal::ZERO {
            return Err(LedgerError::NoCostFound {
                trace_id: trace_id.to_string(),
            });
        }

        let package = self
            .bounded("get_package", self.store.get_package(&assignment.package_id))
            .await?
            .ok_or_else(|| LedgerError::PackageNotFound {
                package_id: assignment.package_id.to_string(),
            })?;

        let cost = UsageCost::from_chat_cents(chat_cents, websearch_usd);
        let tokens = price_usage(&cost, package.ratio(), self.settings.thb_per_usd);
        let deducted = split(
            balance.main_token_balance,
            balance.topup_token_balance,
            tokens.magnitude(),
        );

        let now = Utc::now();
        let delta = BalanceDelta::debit(tokens.egg_token, deducted.main, deducted.topup);
        self.apply_debit(&user_id, &delta, now).await?;

        tracing::info!(
            user_id = %user_id,
            trace_id = %trace_id,
            egg_token = tokens.egg_token,
            deducted = deducted.total(),
            main_deducted = deducted.main,
            topup_deducted = deducted.topup,
            "Usage debited"
        );

        let event = LedgerEvent::token_used(user_id, &tokens, &cost, now)
            .with_package(assignment.subscription_id, assignment.package_id)
            .with_trace(trace_id, ai_model, agent_id);

        self.record_usage(event.clone()).await;
        Ok(event)
    }

    /// Apply the pool decrements under the store timeout.
    ///
    /// A timed-out increment is reported as a storage error but may still land,
    /// leaving a debit with no usage event. It is counted in
    /// [`Ledger::unconfirmed_debits`].
    async fn apply_debit(
        &self,
        user_id: &UserId,
        delta: &BalanceDelta,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let timeout = self.settings.store_timeout;
        let increment = self.store.increment_balance(user_id, delta, at);
        match tokio::time::timeout(timeout, increment).await {
            Ok(result) => result.map_err(LedgerError::from),
            Err(_) => {
                self.unconfirmed_debits.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    user_id = %user_id,
                    remaining_delta = delta.remaining,
                    timeout = ?timeout,
                    "Balance increment timed out; it may still apply without a usage event"
                );
                Err(LedgerError::Storage("increment_balance timed out".into()))
            }
        }
    }

    /// Append the usage event on a detached task with its own timeout.
    ///
    /// The balance is already debited, so the append runs to completion even if
    /// the caller goes away. Failures are logged and counted, never returned.
    async fn record_usage(&self, event: LedgerEvent) {
        let store = Arc::clone(&self.store);
        let missed = Arc::clone(&self.missed_appends);
        let timeout = self.settings.append_timeout;

        let task = tokio::spawn(async move {
            let failure = match tokio::time::timeout(timeout, store.append_event(&event)).await {
                Ok(Ok(())) => return,
                Ok(Err(e)) => e.to_string(),
                Err(_) => format!("timed out after {timeout:?}"),
            };
            missed.fetch_add(1, Ordering::Relaxed);
            tracing::error!(
                event_id = %event.event_id,
                user_id = %event.user_id,
                egg_token = event.egg_token,
                error = %failure,
                "Failed to record usage event; balance already debited"
            );
        });

        if let Err(e) = task.await {
            self.missed_appends.fetch_add(1, Ordering::Relaxed);
            tracing::error!(error = %e, "Usage event task failed");
        }
    }
}
