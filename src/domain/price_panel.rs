//! Date-aligned close price table.
//!
//! One column per ticker, one row per date. Missing prices are stored as
//! NaN; everything else must be a finite positive price.

use crate::domain::error::RisklabError;
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq)]
pub struct PricePanel {
    dates: Vec<NaiveDate>,
    tickers: Vec<String>,
    columns: Vec<Vec<f64>>,
    ticker_index: HashMap<String, usize>,
}

impl PricePanel {
    /// Build a panel from column-major data, validating the date index and
    /// every price.
    pub fn new(
        dates: Vec<NaiveDate>,
        tickers: Vec<String>,
        columns: Vec<Vec<f64>>,
    ) -> Result<Self, RisklabError> {
        if tickers.len() != columns.len() {
            return Err(malformed(format!(
                "{} tickers but {} price columns",
                tickers.len(),
                columns.len()
            )));
        }

        for pair in dates.windows(2) {
            if pair[1] <= pair[0] {
                return Err(malformed(format!(
                    "dates must be strictly increasing ({} follows {})",
                    pair[1], pair[0]
                )));
            }
        }

        let mut seen = HashSet::new();
        for ticker in &tickers {
            if ticker.trim().is_empty() {
                return Err(malformed("empty ticker name".to_string()));
            }
            if !seen.insert(ticker.as_str()) {
                return Err(malformed(format!("duplicate ticker column {ticker}")));
            }
        }

        for (ticker, column) in tickers.iter().zip(&columns) {
            if column.len() != dates.len() {
                return Err(malformed(format!(
                    "column {ticker} has {} prices for {} dates",
                    column.len(),
                    dates.len()
                )));
            }
            if let Some((i, price)) = column
                .iter()
                .enumerate()
                .find(|(_, p)| !p.is_nan() && (!p.is_finite() || **p <= 0.0))
            {
                return Err(malformed(format!(
                    "column {ticker} has invalid price {price} on {}",
                    dates[i]
                )));
            }
        }

        let ticker_index = tickers
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i))
            .collect();

        Ok(Self {
            dates,
            tickers,
            columns,
            ticker_index,
        })
    }

    /// Build a panel from row-major data: one `(date, prices)` entry per row,
    /// prices in `tickers` order.
    pub fn from_rows(
        tickers: Vec<String>,
        rows: Vec<(NaiveDate, Vec<f64>)>,
    ) -> Result<Self, RisklabError> {
        let mut dates = Vec::with_capacity(rows.len());
        let mut columns = vec![Vec::with_capacity(rows.len()); tickers.len()];

        for (date, prices) in rows {
            if prices.len() != tickers.len() {
                return Err(malformed(format!(
                    "row {date} has {} prices for {} tickers",
                    prices.len(),
                    tickers.len()
                )));
            }
            dates.push(date);
            for (column, price) in columns.iter_mut().zip(prices) {
                column.push(price);
            }
        }

        Self::new(dates, tickers, columns)
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn has_ticker(&self, ticker: &str) -> bool {
        self.ticker_index.contains_key(ticker)
    }

    pub fn column(&self, ticker: &str) -> Option<&[f64]> {
        self.ticker_index
            .get(ticker)
            .map(|&i| self.columns[i].as_slice())
    }

    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        Some((*self.dates.first()?, *self.dates.last()?))
    }

    /// Restrict the panel to `tickers`, in the order given.
    pub fn select(&self, tickers: &[String]) -> Result<PricePanel, RisklabError> {
        let mut columns = Vec::with_capacity(tickers.len());
        for ticker in tickers {
            let column = self
                .column(ticker)
                .ok_or_else(|| malformed(format!("ticker {ticker} not in price panel")))?;
            columns.push(column.to_vec());
        }
        Self::new(self.dates.clone(), tickers.to_vec(), columns)
    }
}

fn malformed(reason: String) -> RisklabError {
    RisklabError::MalformedPanel { reason }
}
