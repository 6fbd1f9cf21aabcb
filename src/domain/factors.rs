//! Factor exposure by ordinary least squares, and scenario shocks.
//!
//! r_p = a + sum_i b_i f_i + e
//!
//! Factor proxies are return series (typically ETF columns of the price
//! panel). Dates are intersected across the portfolio and every factor.

use crate::domain::error::RisklabError;
use crate::domain::returns::ReturnSeries;
use crate::domain::stats;
use chrono::NaiveDate;
use nalgebra::{DMatrix, DVector};
use std::collections::{BTreeMap, HashMap};

/// Largest singular value ratio accepted for the design matrix.
const CONDITION_LIMIT: f64 = 1e10;

/// Portfolio return variance at or below this leaves R-squared undefined.
const ZERO_VARIANCE: f64 = 1e-18;

#[derive(Debug, Clone, PartialEq)]
pub struct FactorSet {
    factors: Vec<(String, ReturnSeries)>,
}

impl FactorSet {
    pub fn new(factors: Vec<(String, ReturnSeries)>) -> Result<Self, RisklabError> {
        if factors.is_empty() {
            return Err(RisklabError::invalid_config("factor set is empty"));
        }
        for (i, (name, _)) in factors.iter().enumerate() {
            if factors[..i].iter().any(|(other, _)| other == name) {
                return Err(RisklabError::invalid_config(format!(
                    "duplicate factor '{name}'"
                )));
            }
        }
        Ok(Self { factors })
    }

    pub fn names(&self) -> Vec<&str> {
        self.factors.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.factors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }

    /// Dates observed in `portfolio` and every factor, with the factor
    /// values laid out per row.
    fn align(&self, portfolio: &ReturnSeries) -> (Vec<NaiveDate>, Vec<f64>, Vec<Vec<f64>>) {
        let lookups: Vec<HashMap<NaiveDate, f64>> = self
            .factors
            .iter()
            .map(|(_, s)| s.iter().collect())
            .collect();

        let mut dates = Vec::new();
        let mut ys = Vec::new();
        let mut rows = Vec::new();
        for (date, y) in portfolio.iter() {
            let row: Option<Vec<f64>> = lookups.iter().map(|m| m.get(&date).copied()).collect();
            if let Some(row) = row {
                dates.push(date);
                ys.push(y);
                rows.push(row);
            }
        }
        (dates, ys, rows)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Coefficient {
    pub name: String,
    pub estimate: f64,
    pub std_error: f64,
    /// NaN when the standard error is zero.
    pub t_stat: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FactorExposure {
    pub intercept: Coefficient,
    pub coefficients: Vec<Coefficient>,
    /// Absent when the portfolio returns have zero variance.
    pub r_squared: Option<f64>,
    pub residual_std_error: f64,
    pub df_resid: usize,
    pub observations: usize,
}

/// Named factor shocks, e.g. `{"SPY": -0.10}`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Scenario {
    pub shocks: BTreeMap<String, f64>,
}

impl Scenario {
    pub fn new<I, S>(shocks: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self {
            shocks: shocks.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.shocks.is_empty()
    }
}

fn coefficient(name: &str, estimate: f64, std_error: f64) -> Coefficient {
    let t = estimate / std_error;
    Coefficient {
        name: name.to_string(),
        estimate,
        std_error,
        t_stat: if t.is_finite() { t } else { f64::NAN },
    }
}

/// Regress `portfolio` on `factors` with an intercept.
pub fn regress(portfolio: &ReturnSeries, factors: &FactorSet) -> Result<FactorExposure, RisklabError> {
    let (dates, ys, rows) = factors.align(portfolio);
    let n = dates.len();
    let k = factors.len() + 1;

    if n == 0 {
        return Err(RisklabError::Alignment {
            series: "factors".to_string(),
            reason: "no dates shared by the portfolio and every factor".to_string(),
        });
    }
    if n <= k {
        return Err(RisklabError::insufficient("factor regression", n, k + 1));
    }

    let mut flat = Vec::with_capacity(n * k);
    for row in &rows {
        flat.push(1.0);
        flat.extend_from_slice(row);
    }
    let x = DMatrix::from_row_slice(n, k, &flat);
    let y = DVector::from_row_slice(&ys);

    let svd = x.clone().svd(true, true);
    let s_max = svd.singular_values.max();
    let s_min = svd.singular_values.min();
    let condition = if s_min > 0.0 { s_max / s_min } else { f64::INFINITY };
    if condition > CONDITION_LIMIT {
        return Err(RisklabError::RankDeficient { condition });
    }

    let beta = svd
        .solve(&y, f64::EPSILON)
        .map_err(|_| RisklabError::RankDeficient { condition })?;
    let xtx_inv = (x.transpose() * &x)
        .try_inverse()
        .ok_or(RisklabError::RankDeficient { condition })?;

    let residuals = &y - &x * &beta;
    let sse = residuals.norm_squared();
    let df_resid = n - k;
    let sigma2 = sse / df_resid as f64;

    let r_squared = (stats::variance(&ys) > ZERO_VARIANCE).then(|| {
        let y_mean = stats::mean(&ys);
        let tss: f64 = ys.iter().map(|v| (v - y_mean).powi(2)).sum();
        1.0 - sse / tss
    });

    let std_error = |i: usize| (xtx_inv[(i, i)] * sigma2).max(0.0).sqrt();

    let coefficients = factors
        .names()
        .iter()
        .enumerate()
        .map(|(j, name)| coefficient(name, beta[j + 1], std_error(j + 1)))
        .collect();

    tracing::debug!(observations = n, factors = k - 1, ?r_squared, "factor regression fitted");

    Ok(FactorExposure {
        intercept: coefficient("intercept", beta[0], std_error(0)),
        coefficients,
        r_squared,
        residual_std_error: sigma2.sqrt(),
        df_resid,
        observations: n,
    })
}

impl FactorExposure {
    /// Portfolio return implied by `scenario`; the intercept is excluded and
    /// factors without a shock contribute nothing.
    pub fn project(&self, scenario: &Scenario) -> Result<f64, RisklabError> {
        for name in scenario.shocks.keys() {
            if !self.coefficients.iter().any(|c| &c.name == name) {
                return Err(RisklabError::invalid_config(format!(
                    "scenario shocks unknown factor '{name}'"
                )));
            }
        }

        Ok(self
            .coefficients
            .iter()
            .map(|c| c.estimate * scenario.shocks.get(&c.name).copied().unwrap_or(0.0))
            .sum())
    }

    /// Projection for shocks given in factor order.
    pub fn project_shocks(&self, shocks: &[f64]) -> Result<f64, RisklabError> {
        if shocks.len() != self.coefficients.len() {
            return Err(RisklabError::invalid_config(format!(
                "{} shocks for {} factors",
                shocks.len(),
                self.coefficients.len()
            )));
        }
        Ok(self
            .coefficients
            .iter()
            .zip(shocks)
            .map(|(c, s)| c.estimate * s)
            .sum())
    }
}
