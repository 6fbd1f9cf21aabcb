//! Exponentially weighted moving average variance (RiskMetrics).
//!
//! sigma_t^2 = lambda * sigma_{t-1}^2 + (1 - lambda) * r_{t-1}^2

use super::{FallbackReason, ModelFit, VolatilityModel};
use crate::domain::stats;

const MIN_OBSERVATIONS: usize = 2;

pub const DEFAULT_LAMBDA: f64 = 0.94;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ewma {
    pub lambda: f64,
    /// Returns used for the seed variance.
    pub seed_window: usize,
}

impl Ewma {
    pub fn new(lambda: f64, seed_window: usize) -> Self {
        Self {
            lambda,
            seed_window,
        }
    }

    /// One-step-ahead variance after filtering all of `returns`.
    pub fn next_variance(&self, returns: &[f64]) -> Result<f64, FallbackReason> {
        if returns.len() < MIN_OBSERVATIONS {
            return Err(FallbackReason::TooFewObservations {
                have: returns.len(),
                need: MIN_OBSERVATIONS,
            });
        }

        let seed_len = self.seed_window.clamp(MIN_OBSERVATIONS, returns.len());
        let seed = stats::sample_variance(&returns[..seed_len]);

        Ok(returns
            .iter()
            .fold(seed, |var, r| self.lambda * var + (1.0 - self.lambda) * r * r))
    }
}

impl VolatilityModel for Ewma {
    fn name(&self) -> &'static str {
        "EWMA"
    }

    /// Flat path: EWMA carries no mean reversion.
    fn fit_forecast(&self, returns: &[f64], horizon: usize) -> Result<ModelFit, FallbackReason> {
        let next = self.next_variance(returns)?;
        Ok(ModelFit {
            variances: vec![next; horizon],
            params: None,
        })
    }
}
