//! Rolling beta of the portfolio against a benchmark.
//!
//! beta_t = Cov(r_p, r_b) / Var(r_b) over the trailing window ending at t.

use crate::domain::error::RisklabError;
use crate::domain::returns::ReturnSeries;
use crate::domain::stats;
use chrono::NaiveDate;
use std::ops::Range;

pub const DEFAULT_BETA_WINDOW: usize = 63;

/// Benchmark variance at or below this yields NaN beta.
const ZERO_VARIANCE: f64 = 1e-18;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BetaPoint {
    pub date: NaiveDate,
    /// NaN before the first full window and on flat benchmark windows.
    pub beta: f64,
}

/// Portfolio and benchmark returns aligned on their common dates.
///
/// Betas are computed on demand; iterating twice yields the same points.
#[derive(Debug, Clone)]
pub struct RollingBeta {
    dates: Vec<NaiveDate>,
    portfolio: Vec<f64>,
    benchmark: Vec<f64>,
    window: usize,
}

impl RollingBeta {
    pub fn new(
        portfolio: &ReturnSeries,
        benchmark: &ReturnSeries,
        window: usize,
    ) -> Result<Self, RisklabError> {
        if window < 2 {
            return Err(RisklabError::invalid_config(format!(
                "beta window must be at least 2, got {window}"
            )));
        }

        let (dates, portfolio, benchmark) = portfolio.align(benchmark);
        if dates.is_empty() {
            return Err(RisklabError::Alignment {
                series: "benchmark".to_string(),
                reason: "no overlapping dates".to_string(),
            });
        }

        tracing::debug!(
            observations = dates.len(),
            window,
            "aligned portfolio and benchmark"
        );

        Ok(Self {
            dates,
            portfolio,
            benchmark,
            window,
        })
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Beta at aligned index `i`, or `None` past the end.
    pub fn beta_at(&self, i: usize) -> Option<f64> {
        if i >= self.len() {
            return None;
        }
        if i + 1 < self.window {
            return Some(f64::NAN);
        }

        let span = i + 1 - self.window..i + 1;
        let bench = &self.benchmark[span.clone()];
        let var = stats::sample_variance(bench);
        if var <= ZERO_VARIANCE {
            return Some(f64::NAN);
        }
        Some(stats::sample_covariance(&self.portfolio[span], bench) / var)
    }

    pub fn iter(&self) -> impl Iterator<Item = BetaPoint> + '_ {
        self.range(0..self.len())
    }

    /// Betas for a sub-range of the aligned index. Earlier observations
    /// still feed the windows that reach back into them.
    pub fn range(&self, range: Range<usize>) -> impl Iterator<Item = BetaPoint> + '_ {
        let end = range.end.min(self.len());
        (range.start.min(end)..end).filter_map(move |i| {
            self.beta_at(i).map(|beta| BetaPoint {
                date: self.dates[i],
                beta,
            })
        })
    }

    /// Betas between two dates, inclusive.
    pub fn between(&self, from: NaiveDate, to: NaiveDate) -> impl Iterator<Item = BetaPoint> + '_ {
        let start = self.dates.partition_point(|d| *d < from);
        let end = self.dates.partition_point(|d| *d <= to);
        self.range(start..end.max(start))
    }
}
