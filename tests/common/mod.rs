#![allow(dead_code)]

use chrono::{Datelike, NaiveDate, Weekday};
use risklab::domain::error::RisklabError;
use risklab::domain::price_panel::PricePanel;
use risklab::ports::price_port::PricePort;
use std::cell::Cell;

pub struct MockPricePort {
    pub panel: Option<PricePanel>,
    pub error: Option<String>,
    pub calls: Cell<usize>,
}

impl MockPricePort {
    pub fn new() -> Self {
        Self {
            panel: None,
            error: None,
            calls: Cell::new(0),
        }
    }

    pub fn with_panel(mut self, panel: PricePanel) -> Self {
        self.panel = Some(panel);
        self
    }

    pub fn with_error(mut self, reason: &str) -> Self {
        self.error = Some(reason.to_string());
        self
    }
}

impl PricePort for MockPricePort {
    fn fetch_prices(
        &self,
        tickers: &[String],
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<PricePanel, RisklabError> {
        self.calls.set(self.calls.get() + 1);
        if let Some(reason) = &self.error {
            return Err(RisklabError::DataSource {
                reason: reason.clone(),
            });
        }
        let panel = self.panel.as_ref().ok_or_else(|| RisklabError::DataSource {
            reason: "no panel loaded".to_string(),
        })?;
        let selected = panel.select(tickers)?;

        let keep: Vec<usize> = selected
            .dates()
            .iter()
            .enumerate()
            .filter(|(_, d)| start.is_none_or(|s| **d >= s) && end.is_none_or(|e| **d <= e))
            .map(|(i, _)| i)
            .collect();
        let rows = keep
            .iter()
            .map(|&i| {
                let prices = tickers
                    .iter()
                    .map(|t| selected.column(t).unwrap()[i])
                    .collect();
                (selected.dates()[i], prices)
            })
            .collect();
        PricePanel::from_rows(tickers.to_vec(), rows)
    }

    fn source(&self) -> String {
        "mock".to_string()
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// `n` consecutive weekdays starting at `start` (or the next weekday).
pub fn business_days(start: NaiveDate, n: usize) -> Vec<NaiveDate> {
    let mut out = Vec::with_capacity(n);
    let mut day = start;
    while out.len() < n {
        if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            out.push(day);
        }
        day = day.succ_opt().unwrap();
    }
    out
}

/// Prices compounded from 100 by each ticker's return path. The panel has
/// one more date than each return path.
pub fn panel_from_returns(tickers: &[&str], returns: &[Vec<f64>], start: NaiveDate) -> PricePanel {
    let n = returns[0].len();
    let dates = business_days(start, n + 1);
    let columns = returns
        .iter()
        .map(|path| {
            let mut price = 100.0;
            let mut column = vec![price];
            for r in path {
                price *= 1.0 + r;
                column.push(price);
            }
            column
        })
        .collect();
    PricePanel::new(
        dates,
        tickers.iter().map(|t| t.to_string()).collect(),
        columns,
    )
    .unwrap()
}

pub fn constant_panel(tickers: &[&str], n: usize) -> PricePanel {
    let zeros = vec![vec![0.0; n - 1]; tickers.len()];
    panel_from_returns(tickers, &zeros, date(2023, 1, 2))
}

/// Deterministic wavy market plus two assets loading on it.
pub fn market_panel(n: usize) -> PricePanel {
    let market: Vec<f64> = (0..n).map(|i| (i as f64 * 0.7).sin() * 0.012).collect();
    let a: Vec<f64> = market
        .iter()
        .enumerate()
        .map(|(i, m)| 1.3 * m + (i as f64 * 1.9).cos() * 0.003)
        .collect();
    let b: Vec<f64> = market
        .iter()
        .enumerate()
        .map(|(i, m)| 0.5 * m + (i as f64 * 0.4).sin() * 0.004)
        .collect();
    panel_from_returns(&["A", "B", "MKT"], &[a, b, market], date(2022, 1, 3))
}

pub fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
