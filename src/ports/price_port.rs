//! Price data port trait.

use crate::domain::error::RisklabError;
use crate::domain::price_panel::PricePanel;
use chrono::NaiveDate;

pub trait PricePort {
    /// Close prices for `tickers`, restricted to `[start, end]` when given.
    fn fetch_prices(
        &self,
        tickers: &[String],
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<PricePanel, RisklabError>;

    /// Label identifying where prices come from, used in cache keys.
    fn source(&self) -> String;
}
