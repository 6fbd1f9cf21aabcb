//! GARCH(1,1) maximum-likelihood fit with Nelder-Mead.
//!
//! Returns are demeaned and scaled to unit variance before fitting so the
//! simplex starts at sensible magnitudes; omega is rescaled afterwards.

use super::{FallbackReason, GarchParams, MIN_GARCH_OBSERVATIONS, ModelFit, VolatilityModel};
use crate::domain::stats;
use argmin::core::{CostFunction, Executor, TerminationReason, TerminationStatus};
use argmin::solver::neldermead::NelderMead;

const PENALTY: f64 = 1e10;
const SD_TOLERANCE: f64 = 1e-10;
/// Upper bound on alpha + beta explored by the optimizer.
const MAX_SEARCH_PERSISTENCE: f64 = 1.2;
const LN_2PI: f64 = 1.8378770664093453;
/// Residual deviation at or below this cannot be fitted.
const ZERO_DISPERSION: f64 = 1e-12;

/// Mean negative Gaussian log-likelihood of residuals under GARCH(1,1).
struct GarchLikelihood {
    residuals: Vec<f64>,
    initial_variance: f64,
}

impl CostFunction for GarchLikelihood {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, p: &Self::Param) -> Result<Self::Output, argmin::core::Error> {
        let (omega, alpha, beta) = (p[0], p[1], p[2]);
        if !(omega > 0.0 && alpha >= 0.0 && beta >= 0.0 && alpha + beta <= MAX_SEARCH_PERSISTENCE) {
            return Ok(PENALTY);
        }

        let mut var = self.initial_variance;
        let mut total = 0.0;
        for e in &self.residuals {
            total += var.ln() + e * e / var;
            var = omega + alpha * e * e + beta * var;
        }

        let nll = 0.5 * (total / self.residuals.len() as f64 + LN_2PI);
        Ok(if nll.is_finite() { nll } else { PENALTY })
    }
}

/// Conditional variance one step past the end of `residuals`.
fn filtered_next_variance(params: &GarchParams, residuals: &[f64], initial_variance: f64) -> f64 {
    residuals.iter().fold(initial_variance, |var, e| {
        params.omega + params.alpha * e * e + params.beta * var
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Garch {
    pub max_iterations: u64,
}

impl Garch {
    pub fn new(max_iterations: u64) -> Self {
        Self { max_iterations }
    }

    /// Maximum-likelihood parameters in the units of `residuals`.
    pub fn fit(&self, residuals: &[f64]) -> Result<GarchParams, FallbackReason> {
        let scale = stats::std_dev(residuals);
        if !(scale > ZERO_DISPERSION) || !scale.is_finite() {
            return Err(FallbackReason::DegenerateSample);
        }

        let scaled: Vec<f64> = residuals.iter().map(|e| e / scale).collect();
        let cost = GarchLikelihood {
            initial_variance: stats::variance(&scaled),
            residuals: scaled,
        };

        let simplex = vec![
            vec![0.05, 0.08, 0.87],
            vec![0.10, 0.08, 0.87],
            vec![0.05, 0.15, 0.80],
            vec![0.05, 0.05, 0.93],
        ];
        let solver = NelderMead::new(simplex)
            .with_sd_tolerance(SD_TOLERANCE)
            .map_err(|e| FallbackReason::OptimizerFailed(e.to_string()))?;

        let res = Executor::new(cost, solver)
            .configure(|state| state.max_iters(self.max_iterations))
            .run()
            .map_err(|e| FallbackReason::OptimizerFailed(e.to_string()))?;

        let converged = matches!(
            res.state.termination_status,
            TerminationStatus::Terminated(TerminationReason::SolverConverged)
        );
        if !converged {
            return Err(FallbackReason::NotConverged {
                iterations: res.state.iter,
            });
        }

        let best = res
            .state
            .best_param
            .ok_or_else(|| FallbackReason::OptimizerFailed("no parameters returned".to_string()))?;

        tracing::debug!(iterations = res.state.iter, cost = res.state.best_cost, "GARCH optimizer converged");

        let params = GarchParams {
            omega: best[0] * scale * scale,
            alpha: best[1],
            beta: best[2],
        };
        if params.persistence() >= 1.0 {
            return Err(FallbackReason::NonStationary {
                persistence: params.persistence(),
            });
        }
        Ok(params)
    }
}

impl VolatilityModel for Garch {
    fn name(&self) -> &'static str {
        "GARCH(1,1)"
    }

    fn fit_forecast(&self, returns: &[f64], horizon: usize) -> Result<ModelFit, FallbackReason> {
        if returns.len() < MIN_GARCH_OBSERVATIONS {
            return Err(FallbackReason::TooFewObservations {
                have: returns.len(),
                need: MIN_GARCH_OBSERVATIONS,
            });
        }

        let mu = stats::mean(returns);
        let residuals: Vec<f64> = returns.iter().map(|r| r - mu).collect();
        let params = self.fit(&residuals)?;

        let next = filtered_next_variance(&params, &residuals, stats::variance(&residuals));
        Ok(ModelFit {
            variances: params.forecast_path(next, horizon),
            params: Some(params),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::volatility::tests::{simulate_garch, true_params};

    #[test]
    fn recovers_simulated_parameters() {
        let rets = simulate_garch(true_params(), 3000, 42);
        let mu = stats::mean(&rets);
        let residuals: Vec<f64> = rets.iter().map(|r| r - mu).collect();
        let p = Garch::new(5000).fit(&residuals).unwrap();

        assert!((p.alpha - 0.10).abs() < 0.06, "alpha {}", p.alpha);
        assert!((p.beta - 0.85).abs() < 0.10, "beta {}", p.beta);
        assert!((p.persistence() - 0.95).abs() < 0.05, "persistence {}", p.persistence());

        let truth = true_params();
        let omega_error = (p.omega - truth.omega).abs() / truth.omega;
        assert!(omega_error < 0.6, "omega {} vs {}", p.omega, truth.omega);
        let long_run_error =
            (p.long_run_variance() - truth.long_run_variance()).abs() / truth.long_run_variance();
        assert!(long_run_error < 0.5, "long-run variance {}", p.long_run_variance());
    }

    #[test]
    fn forecast_path_has_horizon_length() {
        let rets = simulate_garch(true_params(), 1000, 9);
        let fit = Garch::new(5000).fit_forecast(&rets, 10).unwrap();
        assert_eq!(fit.variances.len(), 10);
        assert!(fit.params.is_some());
        assert!(fit.variances.iter().all(|v| *v > 0.0));
    }

    #[test]
    fn constant_returns_are_degenerate() {
        let err = Garch::new(5000).fit_forecast(&[0.001; 100], 5).unwrap_err();
        assert_eq!(err, FallbackReason::DegenerateSample);
    }

    #[test]
    fn iteration_cap_reports_non_convergence() {
        let rets = simulate_garch(true_params(), 1000, 13);
        let err = Garch::new(3).fit_forecast(&rets, 5).unwrap_err();
        assert!(matches!(err, FallbackReason::NotConverged { iterations } if iterations <= 3));
    }

    #[test]
    fn likelihood_penalizes_infeasible_parameters() {
        let cost = GarchLikelihood {
            residuals: vec![0.5, -1.0, 1.5],
            initial_variance: 1.0,
        };
        assert_eq!(cost.cost(&vec![-0.1, 0.1, 0.8]).unwrap(), PENALTY);
        assert_eq!(cost.cost(&vec![0.1, -0.1, 0.8]).unwrap(), PENALTY);
        assert!(cost.cost(&vec![0.1, 0.1, 0.8]).unwrap() < PENALTY);
    }
}
