//! Value-at-Risk and Conditional VaR.
//!
//! All estimates are positive loss magnitudes for a one-period horizon.
//!
//! Historical:      VaR = alpha-quantile of losses (linear interpolation),
//!                  CVaR = mean of losses >= VaR
//! Normal:          z = Phi^-1(1 - alpha), VaR = -(mu + sigma z),
//!                  CVaR = -(mu - sigma phi(z) / (1 - alpha))
//! Cornish-Fisher:  z_cf = z + (z^2 - 1)S/6 + (z^3 - 3z)K/24 - (2z^3 - 5z)S^2/36,
//!                  VaR = -(mu + sigma z_cf), CVaR = mean of losses >= VaR

use crate::domain::error::RisklabError;
use crate::domain::returns::ReturnSeries;
use crate::domain::stats;
use std::fmt;
use std::str::FromStr;

/// Cornish-Fisher needs four observations for the kurtosis estimate.
const MIN_OBSERVATIONS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VarMethod {
    #[default]
    Historical,
    ParametricNormal,
    CornishFisher,
}

impl VarMethod {
    pub const ALL: [VarMethod; 3] = [
        VarMethod::Historical,
        VarMethod::ParametricNormal,
        VarMethod::CornishFisher,
    ];
}

impl FromStr for VarMethod {
    type Err = RisklabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "historical" | "hist" => Ok(VarMethod::Historical),
            "normal" | "parametric" | "parametric_normal" => Ok(VarMethod::ParametricNormal),
            "cornish_fisher" | "cornish-fisher" | "cf" => Ok(VarMethod::CornishFisher),
            other => Err(RisklabError::invalid_config(format!(
                "unsupported VaR method '{other}'"
            ))),
        }
    }
}

impl fmt::Display for VarMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VarMethod::Historical => write!(f, "Historical"),
            VarMethod::ParametricNormal => write!(f, "Parametric-Normal"),
            VarMethod::CornishFisher => write!(f, "Cornish-Fisher"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RiskConfig {
    pub confidence: f64,
    /// Use only the last N observations; `None` uses the full sample.
    pub lookback: Option<usize>,
    pub method: VarMethod,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            confidence: 0.95,
            lookback: None,
            method: VarMethod::Historical,
        }
    }
}

impl RiskConfig {
    pub fn validate(&self) -> Result<(), RisklabError> {
        validate_confidence(self.confidence)?;
        if self.lookback == Some(0) {
            return Err(RisklabError::invalid_config("lookback must be positive"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarEstimate {
    pub method: VarMethod,
    pub confidence: f64,
    pub var: f64,
    pub cvar: f64,
    pub observations: usize,
}

fn validate_confidence(alpha: f64) -> Result<(), RisklabError> {
    if alpha > 0.0 && alpha < 1.0 {
        Ok(())
    } else {
        Err(RisklabError::InvalidConfidence { alpha })
    }
}

/// Smallest sample for which the alpha tail holds at least one observation.
pub fn minimum_observations(alpha: f64) -> usize {
    let tail = (1.0 / (1.0 - alpha) - 1e-9).ceil() as usize;
    tail.max(MIN_OBSERVATIONS)
}

/// VaR and CVaR of `returns` under the configured method.
pub fn estimate(returns: &ReturnSeries, config: &RiskConfig) -> Result<VarEstimate, RisklabError> {
    config.validate()?;
    let alpha = config.confidence;

    let window = match config.lookback {
        Some(n) => returns.tail(n),
        None => returns.clone(),
    };
    let rets = &window.values;

    let need = minimum_observations(alpha);
    if rets.len() < need {
        return Err(RisklabError::insufficient(
            &format!("{} VaR at {alpha}", config.method),
            rets.len(),
            need,
        ));
    }

    let (var, cvar) = match config.method {
        VarMethod::Historical => historical(rets, alpha),
        VarMethod::ParametricNormal => parametric_normal(rets, alpha),
        VarMethod::CornishFisher => cornish_fisher(rets, alpha),
    };

    Ok(VarEstimate {
        method: config.method,
        confidence: alpha,
        var,
        cvar,
        observations: rets.len(),
    })
}

/// One estimate per method, in [`VarMethod::ALL`] order.
pub fn estimate_all(
    returns: &ReturnSeries,
    confidence: f64,
    lookback: Option<usize>,
) -> Result<Vec<VarEstimate>, RisklabError> {
    VarMethod::ALL
        .iter()
        .map(|&method| {
            estimate(
                returns,
                &RiskConfig {
                    confidence,
                    lookback,
                    method,
                },
            )
        })
        .collect()
}

fn sorted_losses(rets: &[f64]) -> Vec<f64> {
    let losses: Vec<f64> = rets.iter().map(|r| -r).collect();
    stats::sorted_ascending(&losses)
}

/// Mean of losses at or beyond `threshold`; the threshold itself when none are.
fn tail_mean(sorted_losses: &[f64], threshold: f64) -> f64 {
    let start = sorted_losses.partition_point(|&l| l < threshold);
    let tail = &sorted_losses[start..];
    if tail.is_empty() {
        threshold
    } else {
        stats::mean(tail)
    }
}

fn historical(rets: &[f64], alpha: f64) -> (f64, f64) {
    let losses = sorted_losses(rets);
    let var = stats::quantile_sorted(&losses, alpha);
    (var, tail_mean(&losses, var))
}

fn parametric_normal(rets: &[f64], alpha: f64) -> (f64, f64) {
    let mu = stats::mean(rets);
    let sigma = stats::std_dev(rets);
    let z = stats::normal_quantile(1.0 - alpha);

    let var = -(mu + sigma * z);
    let cvar = -(mu - sigma * stats::normal_pdf(z) / (1.0 - alpha));
    (var, cvar)
}

fn cornish_fisher(rets: &[f64], alpha: f64) -> (f64, f64) {
    let mu = stats::mean(rets);
    let sigma = stats::std_dev(rets);
    let s = stats::skewness(rets);
    let k = stats::excess_kurtosis(rets);
    let z = stats::normal_quantile(1.0 - alpha);

    let z_cf = z + (z.powi(2) - 1.0) * s / 6.0 + (z.powi(3) - 3.0 * z) * k / 24.0
        - (2.0 * z.powi(3) - 5.0 * z) * s.powi(2) / 36.0;

    let var = -(mu + sigma * z_cf);
    (var, tail_mean(&sorted_losses(rets), var))
}
