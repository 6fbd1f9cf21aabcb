//! Time-limited cache in front of any price source.

use crate::domain::error::RisklabError;
use crate::domain::price_panel::PricePanel;
use crate::ports::price_port::PricePort;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Default entry lifetime: one hour.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    /// Sorted so request order does not matter.
    tickers: Vec<String>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    source: String,
}

struct CacheEntry {
    fetched_at: Instant,
    panel: PricePanel,
}

pub struct CachedPricePort<P> {
    inner: P,
    ttl: Duration,
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl<P: PricePort> CachedPricePort<P> {
    pub fn new(inner: P) -> Self {
        Self::with_ttl(inner, DEFAULT_TTL)
    }

    pub fn with_ttl(inner: P, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, CacheEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("price cache lock poisoned, reusing entries");
            poisoned.into_inner()
        })
    }
}

impl<P: PricePort> PricePort for CachedPricePort<P> {
    fn fetch_prices(
        &self,
        tickers: &[String],
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<PricePanel, RisklabError> {
        let mut sorted = tickers.to_vec();
        sorted.sort();
        let key = CacheKey {
            tickers: sorted,
            start,
            end,
            source: self.inner.source(),
        };

        {
            let entries = self.lock();
            if let Some(entry) = entries.get(&key) {
                if entry.fetched_at.elapsed() < self.ttl {
                    tracing::debug!(tickers = ?key.tickers, "price cache hit");
                    // Cached panel may hold the columns in a different order.
                    return entry.panel.select(tickers);
                }
                tracing::debug!(tickers = ?key.tickers, "price cache entry expired");
            }
        }

        let panel = self.inner.fetch_prices(tickers, start, end)?;
        self.lock().insert(
            key,
            CacheEntry {
                fetched_at: Instant::now(),
                panel: panel.clone(),
            },
        );
        Ok(panel)
    }

    fn source(&self) -> String {
        self.inner.source()
    }
}
