//! Performance metrics and drawdown statistics.

use super::error::RisklabError;
use super::portfolio::wealth_curve;
use super::returns::{ReturnKind, ReturnSeries};
use super::stats;
use chrono::NaiveDate;

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Deviations at or below this are treated as zero dispersion.
const ZERO_DISPERSION: f64 = 1e-15;

#[derive(Debug, Clone, PartialEq)]
pub struct DrawdownPoint {
    pub date: NaiveDate,
    pub wealth: f64,
    pub drawdown: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub periods: usize,
    pub cagr: f64,
    pub annualized_volatility: f64,
    /// NaN when the return deviation is zero.
    pub sharpe_ratio: f64,
    /// NaN when there are no negative excess returns or their deviation is zero.
    pub sortino_ratio: f64,
    pub hit_rate: f64,
    /// Most negative peak-to-trough decline, e.g. -0.25 for a 25% fall.
    pub max_drawdown: f64,
    pub drawdown_curve: Vec<DrawdownPoint>,
}

impl Metrics {
    /// Compute metrics for `returns` sampled `periods_per_year` times a year.
    /// `risk_free_rate` is annual; its per-period share is subtracted from the
    /// Sharpe and Sortino numerators. Wealth, CAGR and drawdown compound
    /// according to `kind`.
    pub fn compute(
        returns: &ReturnSeries,
        kind: ReturnKind,
        periods_per_year: f64,
        risk_free_rate: f64,
    ) -> Result<Self, RisklabError> {
        if returns.is_empty() {
            return Err(RisklabError::insufficient("performance metrics", 0, 1));
        }
        if !(periods_per_year > 0.0) {
            return Err(RisklabError::invalid_config(
                "periods per year must be positive",
            ));
        }

        let rets = &returns.values;
        let n = rets.len() as f64;

        let growth: f64 = rets.iter().map(|&r| 1.0 + kind.to_simple(r)).product();
        let cagr = growth.powf(periods_per_year / n) - 1.0;

        let annualized_volatility = stats::std_dev(rets) * periods_per_year.sqrt();

        let per_period_rf = risk_free_rate / periods_per_year;
        let excess: Vec<f64> = rets.iter().map(|r| r - per_period_rf).collect();
        let (sharpe_ratio, sortino_ratio) = compute_risk_adjusted(&excess, periods_per_year);

        let hit_rate = rets.iter().filter(|&&r| r > 0.0).count() as f64 / n;

        let drawdown_curve = compute_drawdown(returns, kind);
        let max_drawdown = drawdown_curve
            .iter()
            .map(|p| p.drawdown)
            .fold(0.0_f64, f64::min);

        Ok(Metrics {
            periods: rets.len(),
            cagr,
            annualized_volatility,
            sharpe_ratio,
            sortino_ratio,
            hit_rate,
            max_drawdown,
            drawdown_curve,
        })
    }
}

fn compute_drawdown(returns: &ReturnSeries, kind: ReturnKind) -> Vec<DrawdownPoint> {
    let wealth = wealth_curve(&returns.values, kind);
    let mut peak = f64::NEG_INFINITY;

    returns
        .dates
        .iter()
        .zip(wealth)
        .map(|(&date, w)| {
            peak = peak.max(w);
            DrawdownPoint {
                date,
                wealth: w,
                drawdown: w / peak - 1.0,
            }
        })
        .collect()
}

fn compute_risk_adjusted(excess: &[f64], periods_per_year: f64) -> (f64, f64) {
    let annual_mean = stats::mean(excess) * periods_per_year;

    let stddev = stats::std_dev(excess);
    let sharpe = if stddev > ZERO_DISPERSION {
        annual_mean / (stddev * periods_per_year.sqrt())
    } else {
        f64::NAN
    };

    let downside: Vec<f64> = excess.iter().copied().filter(|&r| r < 0.0).collect();
    let downside_stddev = if downside.is_empty() {
        0.0
    } else {
        stats::std_dev(&downside)
    };
    let sortino = if downside_stddev > ZERO_DISPERSION {
        annual_mean / (downside_stddev * periods_per_year.sqrt())
    } else {
        f64::NAN
    };

    (sharpe, sortino)
}
