//! Wide CSV price file adapter.
//!
//! Layout: a `Date` column followed by one close-price column per ticker.
//!
//! ```text
//! Date,AAPL,MSFT,SPY
//! 2024-01-02,185.64,370.87,472.65
//! 2024-01-03,184.25,,468.79
//! ```
//!
//! Empty and `NaN` cells are missing prices. Rows may appear in any order;
//! the first row seen for a date wins.

use crate::domain::error::RisklabError;
use crate::domain::price_panel::PricePanel;
use crate::ports::price_port::PricePort;
use chrono::NaiveDate;
use std::fs;
use std::path::PathBuf;

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y/%m/%d"];

pub struct CsvPriceAdapter {
    path: PathBuf,
}

impl CsvPriceAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Every ticker column in the file, in header order.
    pub fn list_tickers(&self) -> Result<Vec<String>, RisklabError> {
        let (tickers, _) = self.read_all()?;
        Ok(tickers)
    }

    fn read_all(&self) -> Result<(Vec<String>, Vec<(NaiveDate, Vec<f64>)>), RisklabError> {
        let content = fs::read_to_string(&self.path).map_err(|e| RisklabError::DataSource {
            reason: format!("failed to read {}: {}", self.path.display(), e),
        })?;

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());

        let headers = rdr.headers().map_err(|e| RisklabError::DataSource {
            reason: format!("CSV header error: {}", e),
        })?;
        let date_col = headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case("date"))
            .ok_or_else(|| RisklabError::DataSource {
                reason: "missing Date column".into(),
            })?;
        let ticker_cols: Vec<(usize, String)> = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != date_col)
            .map(|(i, h)| (i, h.to_string()))
            .collect();

        let mut rows = Vec::new();
        for (line, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| RisklabError::DataSource {
                reason: format!("CSV parse error: {}", e),
            })?;

            let date_str = record.get(date_col).unwrap_or_default();
            let date = parse_date(date_str).ok_or_else(|| RisklabError::DataSource {
                reason: format!("invalid date '{}' on data row {}", date_str, line + 1),
            })?;

            let mut prices = Vec::with_capacity(ticker_cols.len());
            for (col, ticker) in &ticker_cols {
                let cell = record.get(*col).unwrap_or_default();
                prices.push(parse_price(cell).ok_or_else(|| RisklabError::DataSource {
                    reason: format!("invalid {} price '{}' on {}", ticker, cell, date),
                })?);
            }
            rows.push((date, prices));
        }

        // Stable sort keeps file order among equal dates.
        rows.sort_by_key(|(date, _)| *date);
        let before = rows.len();
        rows.dedup_by_key(|(date, _)| *date);
        if rows.len() < before {
            tracing::warn!(
                dropped = before - rows.len(),
                path = %self.path.display(),
                "duplicate dates in price file, keeping first"
            );
        }

        let tickers = ticker_cols.into_iter().map(|(_, t)| t).collect();
        Ok((tickers, rows))
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

/// `None` for an unparseable cell; NaN for a missing price.
fn parse_price(cell: &str) -> Option<f64> {
    if cell.is_empty() || cell.eq_ignore_ascii_case("nan") || cell.eq_ignore_ascii_case("na") {
        return Some(f64::NAN);
    }
    cell.parse().ok()
}

impl PricePort for CsvPriceAdapter {
    fn fetch_prices(
        &self,
        tickers: &[String],
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<PricePanel, RisklabError> {
        let (all_tickers, rows) = self.read_all()?;

        let mut selected = Vec::with_capacity(tickers.len());
        for ticker in tickers {
            let idx = all_tickers
                .iter()
                .position(|t| t == ticker)
                .ok_or_else(|| RisklabError::DataSource {
                    reason: format!("ticker {} not found in {}", ticker, self.path.display()),
                })?;
            selected.push(idx);
        }

        let rows: Vec<(NaiveDate, Vec<f64>)> = rows
            .into_iter()
            .filter(|(date, _)| start.is_none_or(|s| *date >= s) && end.is_none_or(|e| *date <= e))
            .map(|(date, prices)| (date, selected.iter().map(|&i| prices[i]).collect()))
            .collect();

        tracing::debug!(
            rows = rows.len(),
            tickers = tickers.len(),
            path = %self.path.display(),
            "loaded prices"
        );

        PricePanel::from_rows(tickers.to_vec(), rows)
    }

    fn source(&self) -> String {
        format!("csv:{}", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn d(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, month, day).unwrap()
    }

    fn tickers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn setup(content: &str) -> (TempDir, CsvPriceAdapter) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prices.csv");
        fs::write(&path, content).unwrap();
        (dir, CsvPriceAdapter::new(path))
    }

    const PRICES: &str = "Date,AAPL,MSFT,SPY\n\
        2024-01-03,184.25,,468.79\n\
        2024-01-02,185.64,370.87,472.65\n\
        2024-01-04,181.91,367.94,NaN\n\
        2024-01-05,181.18,367.75,467.92\n";

    #[test]
    fn fetch_prices_sorts_rows_and_selects_columns() {
        let (_dir, adapter) = setup(PRICES);
        let panel = adapter
            .fetch_prices(&tickers(&["SPY", "AAPL"]), None, None)
            .unwrap();

        assert_eq!(panel.dates(), &[d(1, 2), d(1, 3), d(1, 4), d(1, 5)]);
        assert_eq!(panel.tickers(), &tickers(&["SPY", "AAPL"]));
        assert_eq!(panel.column("AAPL").unwrap()[0], 185.64);
        assert!(panel.column("SPY").unwrap()[2].is_nan());
    }

    #[test]
    fn empty_cells_are_missing() {
        let (_dir, adapter) = setup(PRICES);
        let panel = adapter.fetch_prices(&tickers(&["MSFT"]), None, None).unwrap();
        assert!(panel.column("MSFT").unwrap()[1].is_nan());
    }

    #[test]
    fn fetch_prices_filters_by_date() {
        let (_dir, adapter) = setup(PRICES);
        let panel = adapter
            .fetch_prices(&tickers(&["AAPL"]), Some(d(1, 3)), Some(d(1, 4)))
            .unwrap();
        assert_eq!(panel.dates(), &[d(1, 3), d(1, 4)]);
    }

    #[test]
    fn duplicate_dates_keep_first() {
        let (_dir, adapter) = setup("Date,A\n2024-01-02,10\n2024-01-02,11\n2024-01-03,12\n");
        let panel = adapter.fetch_prices(&tickers(&["A"]), None, None).unwrap();
        assert_eq!(panel.len(), 2);
        assert_eq!(panel.column("A").unwrap()[0], 10.0);
    }

    #[test]
    fn unknown_ticker_is_data_source_error() {
        let (_dir, adapter) = setup(PRICES);
        let err = adapter.fetch_prices(&tickers(&["TSLA"]), None, None).unwrap_err();
        assert!(matches!(err, RisklabError::DataSource { .. }));
    }

    #[test]
    fn missing_file_is_data_source_error() {
        let adapter = CsvPriceAdapter::new(PathBuf::from("/nonexistent/prices.csv"));
        assert!(matches!(
            adapter.list_tickers().unwrap_err(),
            RisklabError::DataSource { .. }
        ));
    }

    #[test]
    fn missing_date_column_is_rejected() {
        let (_dir, adapter) = setup("Day,A\n2024-01-02,10\n");
        assert!(adapter.list_tickers().is_err());
    }

    #[test]
    fn bad_price_is_rejected() {
        let (_dir, adapter) = setup("Date,A\n2024-01-02,ten\n");
        let err = adapter.fetch_prices(&tickers(&["A"]), None, None).unwrap_err();
        assert!(err.to_string().contains("ten"));
    }

    #[test]
    fn non_positive_price_fails_panel_validation() {
        let (_dir, adapter) = setup("Date,A\n2024-01-02,10\n2024-01-03,-1\n");
        let err = adapter.fetch_prices(&tickers(&["A"]), None, None).unwrap_err();
        assert!(matches!(err, RisklabError::MalformedPanel { .. }));
    }

    #[test]
    fn list_tickers_in_header_order() {
        let (_dir, adapter) = setup(PRICES);
        assert_eq!(adapter.list_tickers().unwrap(), tickers(&["AAPL", "MSFT", "SPY"]));
    }

    #[test]
    fn slash_dates_are_accepted() {
        let (_dir, adapter) = setup("Date,A\n2024/01/02,10\n");
        let panel = adapter.fetch_prices(&tickers(&["A"]), None, None).unwrap();
        assert_eq!(panel.dates(), &[d(1, 2)]);
    }
}
