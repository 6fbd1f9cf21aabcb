//! End-to-end analytics over a price panel.
//!
//! prices -> returns -> portfolio -> metrics, VaR, beta, factors, volatility

use crate::domain::beta::{BetaPoint, DEFAULT_BETA_WINDOW, RollingBeta};
use crate::domain::error::RisklabError;
use crate::domain::factors::{self, FactorExposure, FactorSet, Scenario};
use crate::domain::metrics::{Metrics, TRADING_DAYS_PER_YEAR};
use crate::domain::portfolio::{self, PortfolioReturns, PortfolioSpec, RebalancePolicy};
use crate::domain::price_panel::PricePanel;
use crate::domain::returns::{self, ReturnKind, ReturnPanel, ReturnSeries};
use crate::domain::var::{self, RiskConfig, VarEstimate};
use crate::domain::volatility::{VolatilityConfig, VolatilityEngine, VolatilityForecast};

/// A factor proxy: a price panel column and the name it is reported under.
#[derive(Debug, Clone, PartialEq)]
pub struct FactorProxy {
    pub ticker: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalyticsRequest {
    pub portfolio: PortfolioSpec,
    /// Rescale weights to sum to one before combining.
    pub normalize: bool,
    pub rebalance: RebalancePolicy,
    pub return_kind: ReturnKind,
    pub benchmark: Option<String>,
    pub risk: RiskConfig,
    /// Annual rate subtracted in Sharpe and Sortino.
    pub risk_free_rate: f64,
    pub periods_per_year: f64,
    pub beta_window: usize,
    pub factors: Vec<FactorProxy>,
    pub scenario: Scenario,
    pub volatility: VolatilityConfig,
}

impl AnalyticsRequest {
    pub fn new(portfolio: PortfolioSpec) -> Self {
        Self {
            portfolio,
            normalize: false,
            rebalance: RebalancePolicy::None,
            return_kind: ReturnKind::Simple,
            benchmark: None,
            risk: RiskConfig::default(),
            risk_free_rate: 0.0,
            periods_per_year: TRADING_DAYS_PER_YEAR,
            beta_window: DEFAULT_BETA_WINDOW,
            factors: Vec::new(),
            scenario: Scenario::default(),
            volatility: VolatilityConfig::default(),
        }
    }

    /// Every price column the request reads, without duplicates.
    pub fn tickers(&self) -> Vec<String> {
        let mut out = self.portfolio.tickers();
        let extra = self
            .benchmark
            .iter()
            .cloned()
            .chain(self.factors.iter().map(|f| f.ticker.clone()));
        for ticker in extra {
            if !out.contains(&ticker) {
                out.push(ticker);
            }
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalyticsReport {
    pub portfolio: PortfolioReturns,
    pub metrics: Metrics,
    /// One estimate per VaR method.
    pub var: Vec<VarEstimate>,
    /// Estimate under the configured method and lookback.
    pub selected_var: VarEstimate,
    pub beta: Option<Vec<BetaPoint>>,
    pub factors: Option<FactorExposure>,
    pub scenario_return: Option<f64>,
    pub volatility: VolatilityForecast,
}

pub fn run_analytics(
    panel: &PricePanel,
    request: &AnalyticsRequest,
) -> Result<AnalyticsReport, RisklabError> {
    let engine = VolatilityEngine::new(request.volatility.clone());
    run_analytics_with(panel, request, &engine)
}

/// As [`run_analytics`], with a caller-supplied volatility engine.
pub fn run_analytics_with(
    panel: &PricePanel,
    request: &AnalyticsRequest,
    volatility: &VolatilityEngine,
) -> Result<AnalyticsReport, RisklabError> {
    request.risk.validate()?;
    if !request.scenario.is_empty() && request.factors.is_empty() {
        return Err(RisklabError::invalid_config(
            "scenario shocks given without factors",
        ));
    }

    tracing::info!(
        dates = panel.len(),
        tickers = panel.tickers().len(),
        kind = %request.return_kind,
        "computing returns"
    );
    let returns = returns::panel_returns(panel, request.return_kind)?;

    let spec = if request.normalize {
        request.portfolio.normalized()?
    } else {
        request.portfolio.clone()
    };
    let combined = portfolio::combine(&returns, &spec, request.rebalance)?;
    if combined.series.is_empty() {
        return Err(RisklabError::insufficient("portfolio returns", 0, 1));
    }
    tracing::info!(
        observations = combined.series.len(),
        rebalances = combined.rebalances.len(),
        policy = %request.rebalance,
        "portfolio combined"
    );

    let series = &combined.series;
    let metrics = Metrics::compute(
        series,
        request.return_kind,
        request.periods_per_year,
        request.risk_free_rate,
    )?;

    let var_all = var::estimate_all(series, request.risk.confidence, request.risk.lookback)?;
    let selected_var = var::estimate(series, &request.risk)?;
    tracing::info!(
        method = %selected_var.method,
        confidence = selected_var.confidence,
        var = selected_var.var,
        cvar = selected_var.cvar,
        "value at risk"
    );

    let beta = match &request.benchmark {
        Some(ticker) => {
            let bench = asset_series(&returns, ticker)?;
            let rolling = RollingBeta::new(series, &bench, request.beta_window)?;
            Some(rolling.iter().collect())
        }
        None => None,
    };

    let (factors, scenario_return) = if request.factors.is_empty() {
        (None, None)
    } else {
        let set = FactorSet::new(
            request
                .factors
                .iter()
                .map(|f| asset_series(&returns, &f.ticker).map(|s| (f.name.clone(), s)))
                .collect::<Result<Vec<_>, RisklabError>>()?,
        )?;
        let exposure = factors::regress(series, &set)?;
        let projected = if request.scenario.is_empty() {
            None
        } else {
            Some(exposure.project(&request.scenario)?)
        };
        (Some(exposure), projected)
    };

    let volatility = volatility.forecast(series)?;
    tracing::info!(state = %volatility.state, horizon = volatility.daily.len(), "volatility forecast");

    Ok(AnalyticsReport {
        portfolio: combined,
        metrics,
        var: var_all,
        selected_var,
        beta,
        factors,
        scenario_return,
        volatility,
    })
}

fn asset_series(returns: &ReturnPanel, ticker: &str) -> Result<ReturnSeries, RisklabError> {
    returns.series(ticker).ok_or_else(|| RisklabError::Alignment {
        series: ticker.to_string(),
        reason: "not in the price panel".to_string(),
    })
}
