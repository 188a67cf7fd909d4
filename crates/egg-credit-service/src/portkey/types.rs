//! Portkey analytics API types.

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

/// One cost row for a trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CostRow {
    /// Model that served the generation.
    pub ai_model: Option<String>,
    /// Cost in US cents.
    pub cost_cents: Decimal,
}

impl CostRow {
    /// Create a row.
    #[must_use]
    pub fn new(ai_model: Option<&str>, cost_cents: Decimal) -> Self {
        Self {
            ai_model: ai_model.map(str::to_string),
            cost_cents,
        }
    }

    /// Read a row from one element of the response's `data` array.
    ///
    /// Non-object elements are skipped. A missing or non-numeric `cost` counts
    /// as zero.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        let row = value.as_object()?;
        let ai_model = row
            .get("ai_model")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .map(str::to_string);
        let cost_cents = row.get("cost").and_then(number_to_decimal).unwrap_or_default();
        Some(Self {
            ai_model,
            cost_cents,
        })
    }
}

fn number_to_decimal(value: &Value) -> Option<Decimal> {
    if let Some(i) = value.as_i64() {
        return Some(Decimal::from(i));
    }
    value.as_f64().and_then(|f| Decimal::try_from(f).ok())
}

/// Body of a successful analytics response.
#[derive(Debug, Deserialize)]
pub struct AnalyticsResponse {
    /// Result rows. Anything other than an array means no rows.
    #[serde(default)]
    pub data: Value,
}

impl AnalyticsResponse {
    /// Extract the cost rows.
    #[must_use]
    pub fn rows(&self) -> Vec<CostRow> {
        self.data
            .as_array()
            .map(|rows| rows.iter().filter_map(CostRow::from_value).collect())
            .unwrap_or_default()
    }
}
