//! Ledger event types.
//!
//! The ledger is an append-only history of credits (subscriptions, topups) and
//! debits (usage, expiries) per user. Events are never mutated; the balance fold
//! treats the ordered history as ground truth.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::conversion::{TokenDebit, UsageCost};
use crate::ids::{AgentId, EventId, PackageId, SubscriptionId, TraceId, UserId};

/// Kind of a ledger event.
///
/// Stored as the event's `eventType` string. Unrecognized strings are kept
/// verbatim in [`EventKind::Other`] and ignored by the balance fold.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    /// Subscription grant into the main pool.
    Subscribe,
    /// Purchased tokens into the topup pool.
    Topup,
    /// Metered usage debit.
    TokenUsed,
    /// Expiry taken from main first, then topup.
    Expired,
    /// Expiry of the main pool only.
    MainExpired,
    /// Expiry of the topup pool only.
    TopupExpired,
    /// Any other event type found in the history.
    Other(String),
}

impl EventKind {
    /// Get the stored name of this kind.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Subscribe => "Subscribe",
            Self::Topup => "Topup",
            Self::TokenUsed => "Token Used",
            Self::Expired => "Expired",
            Self::MainExpired => "MainExpired",
            Self::TopupExpired => "TopupExpired",
            Self::Other(name) => name,
        }
    }
}

impl From<String> for EventKind {
    fn from(raw: String) -> Self {
        match raw.trim() {
            "Subscribe" => Self::Subscribe,
            "Topup" => Self::Topup,
            "Token Used" | "TokenUsed" => Self::TokenUsed,
            "Expired" => Self::Expired,
            "MainExpired" => Self::MainExpired,
            "TopupExpired" => Self::TopupExpired,
            _ => Self::Other(raw),
        }
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        match kind {
            EventKind::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable entry in a user's ledger.
///
/// Field names follow the stored document layout (`camelCase`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEvent {
    /// Unique event ID (ULID), generated for documents written without one.
    #[serde(default = "EventId::generate")]
    pub event_id: EventId,

    /// When the event happened. The fold orders by this field.
    #[serde(rename = "eventTimeStamp")]
    pub timestamp: DateTime<Utc>,

    /// The user whose balance the event affects.
    pub user_id: UserId,

    /// What happened.
    #[serde(rename = "eventType")]
    pub kind: EventKind,

    /// Token amount. Debits are stored negative; the fold uses the magnitude.
    #[serde(default, deserialize_with = "crate::lenient::int")]
    pub egg_token: i64,

    /// Subscription the event belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<SubscriptionId>,

    /// Package the event belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_id: Option<PackageId>,

    /// Chat part of a usage debit, in tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_token: Option<i64>,

    /// Websearch part of a usage debit, in tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub websearch_token: Option<i64>,

    /// Total metered cost in USD.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_cost_usd: Option<Decimal>,

    /// Chat cost in USD.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_cost_usd: Option<Decimal>,

    /// Websearch cost in USD.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub websearch_cost_usd: Option<Decimal>,

    /// Trace the usage was metered under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<TraceId>,

    /// Model reported by the cost provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_model: Option<String>,

    /// Agent that generated the usage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<AgentId>,
}

impl LedgerEvent {
    /// Create a bare event with no linkage or cost breakdown.
    #[must_use]
    pub fn new(user_id: UserId, kind: EventKind, egg_token: i64, timestamp: DateTime<Utc>) -> Self {
        Self {
            event_id: EventId::generate(),
            timestamp,
            user_id,
            kind,
            egg_token,
            subscription_id: None,
            package_id: None,
            chat_token: None,
            websearch_token: None,
            total_cost_usd: None,
            chat_cost_usd: None,
            websearch_cost_usd: None,
            trace_id: None,
            ai_model: None,
            agent_id: None,
        }
    }

    /// Create a usage debit event carrying its full cost breakdown.
    #[must_use]
    pub fn token_used(
        user_id: UserId,
        debit: &TokenDebit,
        cost: &UsageCost,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let mut event = Self::new(user_id, EventKind::TokenUsed, debit.egg_token, timestamp);
        event.chat_token = Some(debit.chat_token);
        event.websearch_token = Some(debit.websearch_token);
        event.total_cost_usd = Some(cost.total_usd());
        event.chat_cost_usd = Some(cost.chat_usd);
        event.websearch_cost_usd = Some(cost.websearch_usd);
        event
    }

    /// Link the event to a subscription and package.
    #[must_use]
    pub fn with_package(mut self, subscription_id: SubscriptionId, package_id: PackageId) -> Self {
        self.subscription_id = Some(subscription_id);
        self.package_id = Some(package_id);
        self
    }

    /// Attach trace, model and agent attribution.
    #[must_use]
    pub fn with_trace(
        mut self,
        trace_id: TraceId,
        ai_model: Option<String>,
        agent_id: Option<AgentId>,
    ) -> Self {
        self.trace_id = Some(trace_id);
        self.ai_model = ai_model;
        self.agent_id = agent_id;
        self
    }

    /// Unsigned token magnitude used by the balance fold.
    #[must_use]
    pub const fn magnitude(&self) -> i64 {
        self.egg_token.saturating_abs()
    }
}
