//! Projection calculator DTOs.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::projection::{RateBenchmark, SAVIUM_RATE, SavingsRate};

const fn default_rate() -> f64 {
    SAVIUM_RATE
}

/// Query of `GET /projections`.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProjectionQuery {
    /// Monthly contribution.
    pub monthly: f64,
    /// Annual rate in percent; the Savium rate when omitted.
    #[serde(default = "default_rate")]
    pub rate: f64,
    /// Horizon in years.
    pub years: u32,
}

/// Response of `GET /projections`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ProjectionResponse {
    /// Monthly contribution.
    pub monthly_contribution: f64,
    /// Annual rate in percent.
    pub annual_rate_percent: f64,
    /// Horizon in years.
    pub years: u32,
    /// Sum of all contributions.
    pub total_invested: f64,
    /// Value at the end of the horizon.
    pub future_value: f64,
    /// Growth over the amount invested, percent.
    pub growth_percent: f64,
}

/// Query of `GET /projections/savings-rate`.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SavingsRateQuery {
    /// Monthly income.
    pub income: f64,
    /// Monthly expenses.
    pub expenses: f64,
}

/// Response of `GET /projections/savings-rate`.
#[derive(Debug, Serialize, ToSchema)]
pub struct SavingsRateResponse {
    /// Savings as a whole percent of income.
    pub percentage: i64,
    /// Qualitative band.
    pub rate: SavingsRate,
    /// Headline for the band.
    pub title: String,
}

/// Query of `GET /projections/completion`.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CompletionQuery {
    /// Amount saved so far.
    pub current: f64,
    /// Goal amount.
    pub target: f64,
    /// Amount added per month.
    pub monthly: f64,
}

/// Response of `GET /projections/completion`.
#[derive(Debug, Serialize, ToSchema)]
pub struct CompletionResponse {
    /// `achieved`, `unpredictable` or `on_track`.
    pub status: String,
    /// Display label, e.g. `"March 2027"`.
    pub label: String,
    /// Months from today, when predictable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub months_needed: Option<u32>,
}

/// Query of `GET /projections/scenarios`.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ScenarioQuery {
    /// Risk score, 0 to 100.
    pub risk: f64,
}

/// One entry of `GET /config/rates`.
#[derive(Debug, Serialize, ToSchema)]
pub struct RateDto {
    /// Stable key.
    pub key: String,
    /// Display label.
    pub label: String,
    /// Annual rate in percent.
    pub annual_rate_percent: f64,
}

impl From<&RateBenchmark> for RateDto {
    fn from(rate: &RateBenchmark) -> Self {
        Self {
            key: rate.key.to_string(),
            label: rate.label.to_string(),
            annual_rate_percent: rate.annual_rate_percent,
        }
    }
}
