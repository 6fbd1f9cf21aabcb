//! Portfolio specification and weighted return aggregation.
//!
//! Between rebalance boundaries each holding drifts with its own compounded
//! growth: w_i(t) = w_i * G_i / G_p with G_p = (1 - sum w) + sum w_j * G_j,
//! so any unallocated weight sits flat at zero return. On a boundary date
//! weights snap back to target before that date's return is applied.
//! Log returns are combined through their simple equivalents and the
//! portfolio series is reported in the panel's return kind.

use crate::domain::error::RisklabError;
use crate::domain::returns::{ReturnKind, ReturnPanel, ReturnSeries};
use chrono::{Datelike, NaiveDate};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq)]
pub struct Holding {
    pub ticker: String,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioSpec {
    pub holdings: Vec<Holding>,
}

impl PortfolioSpec {
    pub fn new(holdings: Vec<Holding>) -> Result<Self, RisklabError> {
        if holdings.is_empty() {
            return Err(RisklabError::invalid_config("empty ticker/weight set"));
        }
        let mut seen = HashSet::new();
        for holding in &holdings {
            if !holding.weight.is_finite() {
                return Err(RisklabError::invalid_config(format!(
                    "weight for {} is not finite",
                    holding.ticker
                )));
            }
            if !seen.insert(holding.ticker.as_str()) {
                return Err(RisklabError::invalid_config(format!(
                    "duplicate ticker {}",
                    holding.ticker
                )));
            }
        }
        Ok(Self { holdings })
    }

    /// Pair tickers with weights positionally.
    pub fn from_pairs(tickers: &[String], weights: &[f64]) -> Result<Self, RisklabError> {
        if tickers.len() != weights.len() {
            return Err(RisklabError::invalid_config(format!(
                "{} tickers but {} weights",
                tickers.len(),
                weights.len()
            )));
        }
        Self::new(
            tickers
                .iter()
                .zip(weights)
                .map(|(ticker, &weight)| Holding {
                    ticker: ticker.clone(),
                    weight,
                })
                .collect(),
        )
    }

    /// Rescale weights to sum to 1.
    pub fn normalized(&self) -> Result<Self, RisklabError> {
        let total = self.total_weight();
        if total == 0.0 {
            return Err(RisklabError::invalid_config(
                "cannot normalize weights that sum to zero",
            ));
        }
        Ok(Self {
            holdings: self
                .holdings
                .iter()
                .map(|h| Holding {
                    ticker: h.ticker.clone(),
                    weight: h.weight / total,
                })
                .collect(),
        })
    }

    pub fn total_weight(&self) -> f64 {
        self.holdings.iter().map(|h| h.weight).sum()
    }

    pub fn tickers(&self) -> Vec<String> {
        self.holdings.iter().map(|h| h.ticker.clone()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RebalancePolicy {
    #[default]
    None,
    Monthly,
    Quarterly,
}

impl RebalancePolicy {
    /// Whether `date` opens a new rebalance period relative to `prev`.
    pub fn is_boundary(&self, prev: NaiveDate, date: NaiveDate) -> bool {
        match self {
            RebalancePolicy::None => false,
            RebalancePolicy::Monthly => (prev.year(), prev.month()) != (date.year(), date.month()),
            RebalancePolicy::Quarterly => {
                (prev.year(), prev.month0() / 3) != (date.year(), date.month0() / 3)
            }
        }
    }
}

impl FromStr for RebalancePolicy {
    type Err = RisklabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" | "" | "buy_and_hold" => Ok(RebalancePolicy::None),
            "m" | "monthly" => Ok(RebalancePolicy::Monthly),
            "q" | "quarterly" => Ok(RebalancePolicy::Quarterly),
            other => Err(RisklabError::invalid_config(format!(
                "unsupported rebalance policy '{other}'"
            ))),
        }
    }
}

impl fmt::Display for RebalancePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RebalancePolicy::None => write!(f, "None"),
            RebalancePolicy::Monthly => write!(f, "Monthly"),
            RebalancePolicy::Quarterly => write!(f, "Quarterly"),
        }
    }
}

/// A weight reset on a boundary date.
#[derive(Debug, Clone, PartialEq)]
pub struct RebalanceEvent {
    pub date: NaiveDate,
    /// Sum of |target - drifted| over holdings.
    pub turnover: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioReturns {
    pub series: ReturnSeries,
    pub rebalances: Vec<RebalanceEvent>,
}

/// Aggregate per-asset returns into portfolio returns under `policy`.
///
/// Assets without a return on a date contribute nothing that date and their
/// growth is left unchanged; the remaining weights are not renormalized.
/// Dates where no holding has a return are dropped.
pub fn combine(
    returns: &ReturnPanel,
    spec: &PortfolioSpec,
    policy: RebalancePolicy,
) -> Result<PortfolioReturns, RisklabError> {
    let mut columns = Vec::with_capacity(spec.holdings.len());
    for holding in &spec.holdings {
        let column = returns.column(&holding.ticker).ok_or_else(|| {
            RisklabError::invalid_config(format!(
                "ticker {} is not in the price panel",
                holding.ticker
            ))
        })?;
        columns.push(column);
    }

    let kind = returns.kind;
    let targets: Vec<f64> = spec.holdings.iter().map(|h| h.weight).collect();
    let cash = 1.0 - spec.total_weight();
    let mut growth = vec![1.0_f64; targets.len()];

    let mut dates = Vec::with_capacity(returns.len());
    let mut values = Vec::with_capacity(returns.len());
    let mut rebalances = Vec::new();
    let mut prev_date: Option<NaiveDate> = None;

    for (t, &date) in returns.dates.iter().enumerate() {
        if prev_date.is_some_and(|prev| policy.is_boundary(prev, date)) {
            let drifted = drifted_weights(&targets, &growth, cash);
            let turnover = targets
                .iter()
                .zip(&drifted)
                .map(|(target, w)| (target - w).abs())
                .sum();
            rebalances.push(RebalanceEvent { date, turnover });
            growth.iter_mut().for_each(|g| *g = 1.0);
        }
        prev_date = Some(date);

        let weights = drifted_weights(&targets, &growth, cash);
        let mut observed = false;
        let mut port_simple = 0.0;
        for (i, column) in columns.iter().enumerate() {
            if let Some(r) = column[t] {
                let simple = kind.to_simple(r);
                observed = true;
                port_simple += weights[i] * simple;
                growth[i] *= 1.0 + simple;
            }
        }

        if observed {
            dates.push(date);
            values.push(kind.from_simple(port_simple));
        }
    }

    Ok(PortfolioReturns {
        series: ReturnSeries { dates, values },
        rebalances,
    })
}

fn drifted_weights(targets: &[f64], growth: &[f64], cash: f64) -> Vec<f64> {
    let invested: f64 = targets.iter().zip(growth).map(|(w, g)| w * g).sum();
    let total = cash + invested;
    if total == 0.0 {
        return targets.to_vec();
    }
    targets
        .iter()
        .zip(growth)
        .map(|(w, g)| w * g / total)
        .collect()
}

/// Compounded wealth path W_t = prod_{s<=t}(1 + R_s), with R_s the simple
/// equivalent of r_s.
pub fn wealth_curve(returns: &[f64], kind: ReturnKind) -> Vec<f64> {
    returns
        .iter()
        .scan(1.0_f64, |wealth, &r| {
            *wealth *= 1.0 + kind.to_simple(r);
            Some(*wealth)
        })
        .collect()
}
