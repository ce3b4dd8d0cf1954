//! Portfolio projection math used by dashboard analytics.
//!
//! Pure functions only. Amounts are major currency units; rates are annual
//! percentages (e.g. `12.0` for 12 %).

use std::fmt;

use chrono::{Datelike, Months, NaiveDate};
use serde::Serialize;
use utoipa::ToSchema;

/// Average inflation rate, percent.
pub const INFLATION_RATE: f64 = 5.6;

/// Savium's offered rate: 1.5 % over inflation.
pub const SAVIUM_RATE: f64 = 1.5 + INFLATION_RATE;

/// Average mutual fund return, percent.
pub const MUTUAL_FUND_RATE: f64 = 12.0;

/// Average debt mutual fund return, percent.
pub const DEBT_FUND_RATE: f64 = 6.3;

/// Average bank fixed-deposit rate, percent.
pub const BANK_FD_RATE: f64 = 6.0;

/// A named reference rate shown next to projections.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RateBenchmark {
    /// Stable identifier.
    pub key: &'static str,
    /// Display label.
    pub label: &'static str,
    /// Annual rate in percent.
    pub annual_rate_percent: f64,
}

/// Reference rates, highest first.
pub const RATE_BENCHMARKS: [RateBenchmark; 5] = [
    RateBenchmark {
        key: "mutual_fund",
        label: "Mutual Funds",
        annual_rate_percent: MUTUAL_FUND_RATE,
    },
    RateBenchmark {
        key: "savium",
        label: "Savium",
        annual_rate_percent: SAVIUM_RATE,
    },
    RateBenchmark {
        key: "debt_fund",
        label: "Debt Mutual Funds",
        annual_rate_percent: DEBT_FUND_RATE,
    },
    RateBenchmark {
        key: "bank_fd",
        label: "Bank FD",
        annual_rate_percent: BANK_FD_RATE,
    },
    RateBenchmark {
        key: "inflation",
        label: "Inflation",
        annual_rate_percent: INFLATION_RATE,
    },
];

/// Future value of a recurring monthly contribution with monthly compounding.
///
/// `m · ((1 + r)^n − 1) / r` with `r = rate / 100 / 12` and `n = years · 12`.
/// A zero rate degenerates to `m · n`. Horizons past `i32::MAX` months
/// compound with a float exponent and saturate to infinity.
#[must_use]
pub fn future_value(monthly_contribution: f64, annual_rate_percent: f64, years: u32) -> f64 {
    let months = years.saturating_mul(12);
    let r = annual_rate_percent / 100.0 / 12.0;
    if r == 0.0 {
        return monthly_contribution * f64::from(months);
    }
    let growth = i32::try_from(months)
        .map_or_else(|_| (1.0 + r).powf(f64::from(months)), |n| (1.0 + r).powi(n));
    monthly_contribution * (growth - 1.0) / r
}

/// Growth over the contributed total, in percent.
///
/// Returns `0.0` when nothing is contributed.
#[must_use]
pub fn growth_percent(monthly_contribution: f64, annual_rate_percent: f64, years: u32) -> f64 {
    let invested = monthly_contribution * f64::from(years.saturating_mul(12));
    if invested == 0.0 {
        return 0.0;
    }
    let fv = future_value(monthly_contribution, annual_rate_percent, years);
    (fv - invested) / invested * 100.0
}

/// Estimated date at which a savings goal is reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionEstimate {
    /// The goal is already met.
    Achieved,
    /// No positive monthly rate; cannot be predicted.
    Unpredictable,
    /// The goal is reached in the given month.
    On {
        /// Calendar year.
        year: i32,
        /// Calendar month, 1–12.
        month: u32,
        /// Months from today.
        months_needed: u32,
    },
}

impl fmt::Display for CompletionEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Achieved => f.write_str("Goal achieved"),
            Self::Unpredictable => f.write_str("Cannot be predicted"),
            Self::On { year, month, .. } => {
                let name = chrono::Month::try_from(u8::try_from(*month).unwrap_or(1))
                    .map(|m| m.name())
                    .unwrap_or("January");
                write!(f, "{name} {year}")
            }
        }
    }
}

/// Estimates when `current_amount` reaches `target_amount` at `monthly_rate`
/// added per month, counting from `today`.
#[must_use]
pub fn estimated_completion(
    current_amount: f64,
    target_amount: f64,
    monthly_rate: f64,
    today: NaiveDate,
) -> CompletionEstimate {
    if current_amount >= target_amount {
        return CompletionEstimate::Achieved;
    }
    if monthly_rate <= 0.0 || !monthly_rate.is_finite() {
        return CompletionEstimate::Unpredictable;
    }

    let needed = ((target_amount - current_amount) / monthly_rate).ceil();
    if !needed.is_finite() || needed > f64::from(u32::MAX) {
        return CompletionEstimate::Unpredictable;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let months_needed = needed as u32;

    match today.checked_add_months(Months::new(months_needed)) {
        Some(date) => CompletionEstimate::On {
            year: date.year(),
            month: date.month(),
            months_needed,
        },
        None => CompletionEstimate::Unpredictable,
    }
}

/// Savings as a share of income, rounded to a whole percent.
///
/// Returns `0` when income is not positive.
#[must_use]
pub fn savings_percentage(monthly_income: f64, monthly_expenses: f64) -> i64 {
    if monthly_income <= 0.0 {
        return 0;
    }
    #[allow(clippy::cast_possible_truncation)]
    let pct = ((monthly_income - monthly_expenses) / monthly_income * 100.0).round() as i64;
    pct
}

/// Qualitative band of a savings rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SavingsRate {
    /// Saving 20 % or more of income.
    Excellent,
    /// Saving 10–20 % of income.
    Good,
    /// Saving something, under 10 %.
    NeedsImprovement,
    /// Spending exceeds income.
    Overspending,
}

impl SavingsRate {
    /// Classifies a savings percentage.
    #[must_use]
    pub const fn classify(percentage: i64) -> Self {
        if percentage >= 20 {
            Self::Excellent
        } else if percentage >= 10 {
            Self::Good
        } else if percentage > 0 {
            Self::NeedsImprovement
        } else {
            Self::Overspending
        }
    }

    /// Short headline for the band.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Excellent => "Excellent Savings Rate",
            Self::Good => "Good Savings Rate",
            Self::NeedsImprovement => "Improve Your Savings Rate",
            Self::Overspending => "Spending Exceeds Income",
        }
    }
}

/// Expected annual returns for a risk score (0–100).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReturnScenarios {
    /// Worst-case annual return, percent.
    pub worst_case: f64,
    /// Average annual return, percent.
    pub average: f64,
    /// Best-case annual return, percent.
    pub best_case: f64,
}

impl ReturnScenarios {
    /// Computes the scenarios for `risk`, each rounded to one decimal.
    #[must_use]
    pub fn for_risk(risk: f64) -> Self {
        let average = round1(5.0 + risk * 0.10);
        Self {
            worst_case: round1(average - risk * 0.12),
            average,
            best_case: round1(average + risk * 0.15),
        }
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
