//! Price-to-return transform and return series types.
//!
//! r_t = (P_t - P_{t-1}) / P_{t-1}   (simple)
//! r_t = ln(P_t / P_{t-1})           (log)
//!
//! A single missing price is forward-filled from the previous observation.
//! Longer gaps are not bridged: every return touching an unfilled price is
//! reported as missing.

use crate::domain::error::RisklabError;
use crate::domain::price_panel::PricePanel;
use chrono::NaiveDate;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReturnKind {
    #[default]
    Simple,
    Log,
}

impl ReturnKind {
    /// The simple return equivalent to `r`.
    pub fn to_simple(self, r: f64) -> f64 {
        match self {
            ReturnKind::Simple => r,
            ReturnKind::Log => r.exp_m1(),
        }
    }

    /// The return of this kind equivalent to the simple return `r`.
    pub fn from_simple(self, r: f64) -> f64 {
        match self {
            ReturnKind::Simple => r,
            ReturnKind::Log => r.ln_1p(),
        }
    }
}

impl FromStr for ReturnKind {
    type Err = RisklabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "simple" | "pct" => Ok(ReturnKind::Simple),
            "log" => Ok(ReturnKind::Log),
            other => Err(RisklabError::invalid_config(format!(
                "unsupported return kind '{other}'"
            ))),
        }
    }
}

impl fmt::Display for ReturnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReturnKind::Simple => write!(f, "simple"),
            ReturnKind::Log => write!(f, "log"),
        }
    }
}

/// A complete dated return series (no missing values).
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnSeries {
    pub dates: Vec<NaiveDate>,
    pub values: Vec<f64>,
}

impl ReturnSeries {
    pub fn new(dates: Vec<NaiveDate>, values: Vec<f64>) -> Result<Self, RisklabError> {
        if dates.len() != values.len() {
            return Err(RisklabError::MalformedPanel {
                reason: format!("{} dates for {} returns", dates.len(), values.len()),
            });
        }
        if dates.windows(2).any(|w| w[1] <= w[0]) {
            return Err(RisklabError::MalformedPanel {
                reason: "return dates must be strictly increasing".to_string(),
            });
        }
        Ok(Self { dates, values })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.dates.iter().copied().zip(self.values.iter().copied())
    }

    /// The last `n` observations (the whole series when shorter).
    pub fn tail(&self, n: usize) -> ReturnSeries {
        let start = self.len().saturating_sub(n);
        ReturnSeries {
            dates: self.dates[start..].to_vec(),
            values: self.values[start..].to_vec(),
        }
    }

    /// Inner join on dates: `(dates, self_values, other_values)`.
    pub fn align(&self, other: &ReturnSeries) -> (Vec<NaiveDate>, Vec<f64>, Vec<f64>) {
        let mut dates = Vec::new();
        let mut left = Vec::new();
        let mut right = Vec::new();
        let (mut i, mut j) = (0, 0);

        while i < self.len() && j < other.len() {
            match self.dates[i].cmp(&other.dates[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    dates.push(self.dates[i]);
                    left.push(self.values[i]);
                    right.push(other.values[j]);
                    i += 1;
                    j += 1;
                }
            }
        }

        (dates, left, right)
    }
}

/// Per-asset returns on a shared date index. `None` marks a missing return.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnPanel {
    pub kind: ReturnKind,
    pub dates: Vec<NaiveDate>,
    pub tickers: Vec<String>,
    pub columns: Vec<Vec<Option<f64>>>,
}

impl ReturnPanel {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn column(&self, ticker: &str) -> Option<&[Option<f64>]> {
        self.tickers
            .iter()
            .position(|t| t == ticker)
            .map(|i| self.columns[i].as_slice())
    }

    /// The observed returns of one ticker, missing dates dropped.
    pub fn series(&self, ticker: &str) -> Option<ReturnSeries> {
        let column = self.column(ticker)?;
        let (dates, values) = self
            .dates
            .iter()
            .zip(column)
            .filter_map(|(&date, r)| r.map(|v| (date, v)))
            .unzip();
        Some(ReturnSeries { dates, values })
    }
}

/// Returns for one price column: N prices give N-1 returns.
pub fn column_returns(prices: &[f64], kind: ReturnKind) -> Result<Vec<Option<f64>>, RisklabError> {
    if prices.len() < 2 {
        return Err(RisklabError::insufficient("returns", prices.len(), 2));
    }

    let filled: Vec<f64> = prices
        .iter()
        .enumerate()
        .map(|(i, &p)| {
            if p.is_nan() && i > 0 && !prices[i - 1].is_nan() {
                prices[i - 1]
            } else {
                p
            }
        })
        .collect();

    Ok(filled
        .windows(2)
        .map(|w| {
            let (prev, curr) = (w[0], w[1]);
            if prev.is_nan() || curr.is_nan() {
                return None;
            }
            Some(match kind {
                ReturnKind::Simple => (curr - prev) / prev,
                ReturnKind::Log => (curr / prev).ln(),
            })
        })
        .collect())
}

/// Returns for every column of a panel.
pub fn panel_returns(panel: &PricePanel, kind: ReturnKind) -> Result<ReturnPanel, RisklabError> {
    if panel.len() < 2 {
        return Err(RisklabError::insufficient("returns", panel.len(), 2));
    }

    let mut columns = Vec::with_capacity(panel.tickers().len());
    for ticker in panel.tickers() {
        let prices = panel
            .column(ticker)
            .ok_or_else(|| RisklabError::MalformedPanel {
                reason: format!("missing column {ticker}"),
            })?;
        columns.push(column_returns(prices, kind)?);
    }

    Ok(ReturnPanel {
        kind,
        dates: panel.dates()[1..].to_vec(),
        tickers: panel.tickers().to_vec(),
        columns,
    })
}
