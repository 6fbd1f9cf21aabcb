//! Volatility forecasting with a GARCH(1,1) model and EWMA fallback.
//!
//! The engine is a small state machine:
//!
//! ```text
//! AttemptingGarch --fit ok, stationary--> GarchFitted
//!        |
//!        +--unavailable / too short / failed / not converged / a+b >= 1--> EwmaFallback
//! ```
//!
//! Falling back is never an error; the forecast records why it happened.

pub mod ewma;
#[cfg(feature = "garch")]
pub mod garch;

use crate::domain::error::RisklabError;
use crate::domain::returns::ReturnSeries;
use crate::domain::metrics::TRADING_DAYS_PER_YEAR;
use ewma::{DEFAULT_LAMBDA, Ewma};
use std::fmt;

pub const MIN_GARCH_OBSERVATIONS: usize = 50;
pub const DEFAULT_HORIZON: usize = 20;
pub const DEFAULT_SEED_WINDOW: usize = 30;
pub const DEFAULT_MAX_ITERATIONS: u64 = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolatilityState {
    AttemptingGarch,
    GarchFitted,
    EwmaFallback,
}

impl fmt::Display for VolatilityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VolatilityState::AttemptingGarch => write!(f, "attempting_garch"),
            VolatilityState::GarchFitted => write!(f, "garch"),
            VolatilityState::EwmaFallback => write!(f, "ewma"),
        }
    }
}

/// Why the engine left the GARCH path.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FallbackReason {
    #[error("GARCH model not available in this build")]
    ModelUnavailable,

    #[error("{have} returns, model needs at least {need}")]
    TooFewObservations { have: usize, need: usize },

    #[error("returns have zero variance")]
    DegenerateSample,

    #[error("optimizer failed: {0}")]
    OptimizerFailed(String),

    #[error("optimizer did not converge within {iterations} iterations")]
    NotConverged { iterations: u64 },

    #[error("fitted persistence {persistence:.4} is not stationary")]
    NonStationary { persistence: f64 },
}

/// sigma_t^2 = omega + alpha * e_{t-1}^2 + beta * sigma_{t-1}^2
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GarchParams {
    pub omega: f64,
    pub alpha: f64,
    pub beta: f64,
}

impl GarchParams {
    pub fn persistence(&self) -> f64 {
        self.alpha + self.beta
    }

    pub fn long_run_variance(&self) -> f64 {
        self.omega / (1.0 - self.persistence())
    }

    /// Variance path for steps 1..=horizon given the one-step-ahead variance:
    /// sigma_{t+h}^2 = v + p^(h-1) (sigma_{t+1}^2 - v)
    pub fn forecast_path(&self, next_variance: f64, horizon: usize) -> Vec<f64> {
        let long_run = self.long_run_variance();
        let p = self.persistence();
        (0..horizon)
            .map(|k| long_run + p.powi(k as i32) * (next_variance - long_run))
            .collect()
    }
}

/// Per-period variance path produced by a model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelFit {
    pub variances: Vec<f64>,
    pub params: Option<GarchParams>,
}

/// A variance forecaster. Failures carry the reason the engine reports when
/// it moves on to the fallback model.
pub trait VolatilityModel {
    fn name(&self) -> &'static str;

    fn fit_forecast(&self, returns: &[f64], horizon: usize) -> Result<ModelFit, FallbackReason>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct VolatilityConfig {
    pub lambda: f64,
    pub horizon: usize,
    /// Periods per year used to annualize the forecast.
    pub annualization: f64,
    pub seed_window: usize,
    pub max_iterations: u64,
}

impl Default for VolatilityConfig {
    fn default() -> Self {
        Self {
            lambda: DEFAULT_LAMBDA,
            horizon: DEFAULT_HORIZON,
            annualization: TRADING_DAYS_PER_YEAR,
            seed_window: DEFAULT_SEED_WINDOW,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl VolatilityConfig {
    pub fn validate(&self) -> Result<(), RisklabError> {
        if !(self.lambda > 0.0 && self.lambda < 1.0) {
            return Err(RisklabError::invalid_config(format!(
                "EWMA lambda must lie in (0, 1), got {}",
                self.lambda
            )));
        }
        if self.horizon == 0 {
            return Err(RisklabError::invalid_config("forecast horizon must be positive"));
        }
        if !(self.annualization > 0.0) {
            return Err(RisklabError::invalid_config("annualization must be positive"));
        }
        if self.seed_window < 2 {
            return Err(RisklabError::invalid_config("EWMA seed window must be at least 2"));
        }
        if self.max_iterations == 0 {
            return Err(RisklabError::invalid_config("max_iterations must be positive"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VolatilityForecast {
    pub state: VolatilityState,
    pub fallback_reason: Option<FallbackReason>,
    pub params: Option<GarchParams>,
    /// Per-period volatility for steps 1..=horizon.
    pub daily: Vec<f64>,
    pub annualized: Vec<f64>,
}

/// Reports whether the GARCH fitter can be used.
pub type AvailabilityProbe = fn() -> bool;

pub fn garch_compiled() -> bool {
    cfg!(feature = "garch")
}

#[derive(Debug, Clone)]
pub struct VolatilityEngine {
    config: VolatilityConfig,
    probe: AvailabilityProbe,
}

impl VolatilityEngine {
    pub fn new(config: VolatilityConfig) -> Self {
        Self {
            config,
            probe: garch_compiled,
        }
    }

    pub fn with_probe(mut self, probe: AvailabilityProbe) -> Self {
        self.probe = probe;
        self
    }

    pub fn config(&self) -> &VolatilityConfig {
        &self.config
    }

    pub fn forecast(&self, returns: &ReturnSeries) -> Result<VolatilityForecast, RisklabError> {
        self.config.validate()?;

        let mut state = VolatilityState::AttemptingGarch;
        tracing::debug!(%state, observations = returns.len(), "forecasting volatility");

        let attempt = self.primary_model().and_then(|model| {
            tracing::debug!(model = model.name(), "fitting");
            model.fit_forecast(&returns.values, self.config.horizon)
        });
        let (fit, fallback_reason) = match attempt {
            Ok(fit) => {
                state = VolatilityState::GarchFitted;
                (fit, None)
            }
            Err(reason) => {
                let fallback = self.fallback_model();
                tracing::warn!(%reason, model = fallback.name(), "GARCH fit abandoned, using fallback");
                state = VolatilityState::EwmaFallback;
                let fit = fallback
                    .fit_forecast(&returns.values, self.config.horizon)
                    .map_err(|err| fallback_error(fallback.as_ref(), err))?;
                (fit, Some(reason))
            }
        };

        if let Some(p) = &fit.params {
            tracing::info!(
                omega = p.omega,
                alpha = p.alpha,
                beta = p.beta,
                "GARCH(1,1) fitted"
            );
        }

        let daily: Vec<f64> = fit.variances.iter().map(|v| v.sqrt()).collect();
        let scale = self.config.annualization.sqrt();
        let annualized = daily.iter().map(|v| v * scale).collect();

        Ok(VolatilityForecast {
            state,
            fallback_reason,
            params: fit.params,
            daily,
            annualized,
        })
    }

    /// The GARCH model, unless the availability check rules it out.
    pub fn primary_model(&self) -> Result<Box<dyn VolatilityModel>, FallbackReason> {
        if !(self.probe)() {
            return Err(FallbackReason::ModelUnavailable);
        }
        self.garch_model()
    }

    pub fn fallback_model(&self) -> Box<dyn VolatilityModel> {
        Box::new(Ewma::new(self.config.lambda, self.config.seed_window))
    }

    #[cfg(feature = "garch")]
    fn garch_model(&self) -> Result<Box<dyn VolatilityModel>, FallbackReason> {
        Ok(Box::new(garch::Garch::new(self.config.max_iterations)))
    }

    #[cfg(not(feature = "garch"))]
    fn garch_model(&self) -> Result<Box<dyn VolatilityModel>, FallbackReason> {
        Err(FallbackReason::ModelUnavailable)
    }
}

fn fallback_error(model: &dyn VolatilityModel, reason: FallbackReason) -> RisklabError {
    match reason {
        FallbackReason::TooFewObservations { have, need } => {
            RisklabError::insufficient(&format!("{} volatility", model.name()), have, need)
        }
        reason => RisklabError::Volatility {
            model: model.name().to_string(),
            reason,
        },
    }
}
