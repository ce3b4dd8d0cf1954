//! Portfolio projection calculators. Stateless; no session required.

use axum::extract::Query;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{
    CompletionQuery, CompletionResponse, ProjectionQuery, ProjectionResponse, SavingsRateQuery,
    SavingsRateResponse, ScenarioQuery,
};
use crate::app_state::AppState;
use crate::domain::projection::{
    CompletionEstimate, ReturnScenarios, SavingsRate, estimated_completion, future_value,
    growth_percent, savings_percentage,
};
use crate::domain::timestamp;
use crate::error::{ErrorResponse, SaviumError};

/// Longest horizon accepted by `GET /projections`.
const MAX_YEARS: u32 = 100;

fn require_finite(name: &str, value: f64) -> Result<f64, SaviumError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(SaviumError::InvalidRequest(format!("{name} must be a number")))
    }
}

/// `GET /projections` — Future value of a monthly contribution.
///
/// # Errors
///
/// Returns [`SaviumError::InvalidRequest`] for negative contributions or
/// horizons beyond 100 years.
#[utoipa::path(
    get,
    path = "/api/v1/projections",
    tag = "Projections",
    summary = "Project a monthly investment",
    description = "Compounds the monthly contribution at `rate` percent a year for `years` years.",
    params(ProjectionQuery),
    responses(
        (status = 200, description = "Projection", body = ProjectionResponse),
        (status = 400, description = "Invalid parameters", body = ErrorResponse),
    )
)]
pub async fn project(Query(q): Query<ProjectionQuery>) -> Result<impl IntoResponse, SaviumError> {
    let monthly = require_finite("monthly", q.monthly)?;
    let rate = require_finite("rate", q.rate)?;
    if monthly < 0.0 {
        return Err(SaviumError::InvalidRequest("monthly must not be negative".to_string()));
    }
    if q.years > MAX_YEARS {
        return Err(SaviumError::InvalidRequest(format!(
            "years must be at most {MAX_YEARS}"
        )));
    }

    Ok(Json(ProjectionResponse {
        monthly_contribution: monthly,
        annual_rate_percent: rate,
        years: q.years,
        total_invested: monthly * f64::from(q.years * 12),
        future_value: future_value(monthly, rate, q.years),
        growth_percent: growth_percent(monthly, rate, q.years),
    }))
}

/// `GET /projections/savings-rate` — Savings share of income.
///
/// # Errors
///
/// Returns [`SaviumError::InvalidRequest`] for non-numeric input.
#[utoipa::path(
    get,
    path = "/api/v1/projections/savings-rate",
    tag = "Projections",
    summary = "Classify a savings rate",
    params(SavingsRateQuery),
    responses(
        (status = 200, description = "Savings rate", body = SavingsRateResponse),
        (status = 400, description = "Invalid parameters", body = ErrorResponse),
    )
)]
pub async fn savings_rate(
    Query(q): Query<SavingsRateQuery>,
) -> Result<impl IntoResponse, SaviumError> {
    let income = require_finite("income", q.income)?;
    let expenses = require_finite("expenses", q.expenses)?;
    let percentage = savings_percentage(income, expenses);
    let rate = SavingsRate::classify(percentage);

    Ok(Json(SavingsRateResponse {
        percentage,
        rate,
        title: rate.title().to_string(),
    }))
}

/// `GET /projections/completion` — When a savings goal is reached.
///
/// # Errors
///
/// Returns [`SaviumError::InvalidRequest`] for non-numeric input.
#[utoipa::path(
    get,
    path = "/api/v1/projections/completion",
    tag = "Projections",
    summary = "Estimate goal completion",
    description = "Counts whole months from today until `current` plus `monthly` per month reaches `target`.",
    params(CompletionQuery),
    responses(
        (status = 200, description = "Completion estimate", body = CompletionResponse),
        (status = 400, description = "Invalid parameters", body = ErrorResponse),
    )
)]
pub async fn completion(
    Query(q): Query<CompletionQuery>,
) -> Result<impl IntoResponse, SaviumError> {
    let current = require_finite("current", q.current)?;
    let target = require_finite("target", q.target)?;
    let monthly = require_finite("monthly", q.monthly)?;

    let estimate = estimated_completion(current, target, monthly, timestamp::now().date_naive());
    let (status, months_needed) = match &estimate {
        CompletionEstimate::Achieved => ("achieved", None),
        CompletionEstimate::Unpredictable => ("unpredictable", None),
        CompletionEstimate::On { months_needed, .. } => ("on_track", Some(*months_needed)),
    };

    Ok(Json(CompletionResponse {
        status: status.to_string(),
        label: estimate.to_string(),
        months_needed,
    }))
}

/// `GET /projections/scenarios` — Expected returns for a risk score.
///
/// # Errors
///
/// Returns [`SaviumError::InvalidRequest`] when `risk` is outside 0 to 100.
#[utoipa::path(
    get,
    path = "/api/v1/projections/scenarios",
    tag = "Projections",
    summary = "Return scenarios for a risk score",
    params(ScenarioQuery),
    responses(
        (status = 200, description = "Worst, average and best case", body = ReturnScenarios),
        (status = 400, description = "Risk out of range", body = ErrorResponse),
    )
)]
pub async fn scenarios(Query(q): Query<ScenarioQuery>) -> Result<impl IntoResponse, SaviumError> {
    if !(0.0..=100.0).contains(&q.risk) {
        return Err(SaviumError::InvalidRequest(
            "risk must be between 0 and 100".to_string(),
        ));
    }
    Ok(Json(ReturnScenarios::for_risk(q.risk)))
}

/// Projection routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/projections", get(project))
        .route("/projections/savings-rate", get(savings_rate))
        .route("/projections/completion", get(completion))
        .route("/projections/scenarios", get(scenarios))
}
