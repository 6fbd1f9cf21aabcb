//! CSV report writer: one file per analytics section.

use crate::domain::analytics::AnalyticsReport;
use crate::domain::error::RisklabError;
use crate::ports::report_port::ReportPort;
use serde::Serialize;
use std::fs;
use std::path::Path;

pub const PERFORMANCE_FILE: &str = "performance.csv";
pub const DRAWDOWN_FILE: &str = "drawdown.csv";
pub const VAR_FILE: &str = "var.csv";
pub const BETA_FILE: &str = "beta.csv";
pub const FACTORS_FILE: &str = "factors.csv";
pub const VOLATILITY_FILE: &str = "volatility.csv";

#[derive(Debug, Serialize)]
struct PerformanceRow {
    metric: &'static str,
    value: Option<f64>,
}

#[derive(Debug, Serialize)]
struct DrawdownRow {
    date: String,
    wealth: f64,
    drawdown: f64,
}

#[derive(Debug, Serialize)]
struct VarRow {
    method: String,
    confidence: f64,
    var: f64,
    cvar: f64,
    observations: usize,
    selected: bool,
}

#[derive(Debug, Serialize)]
struct BetaRow {
    date: String,
    beta: f64,
}

#[derive(Debug, Serialize)]
struct FactorRow {
    term: String,
    estimate: f64,
    std_error: f64,
    t_stat: f64,
}

#[derive(Debug, Serialize)]
struct VolatilityRow {
    step: usize,
    model: String,
    daily: f64,
    annualized: f64,
}

/// Writes `performance.csv`, `drawdown.csv`, `var.csv` and
/// `volatility.csv` always; `beta.csv` and `factors.csv` when the report
/// has those sections.
pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CsvReportAdapter {
    fn default() -> Self {
        Self::new()
    }
}

fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), RisklabError> {
    let mut wtr = csv::Writer::from_path(path).map_err(std::io::Error::from)?;
    for row in rows {
        wtr.serialize(row).map_err(std::io::Error::from)?;
    }
    wtr.flush()?;
    tracing::debug!(path = %path.display(), rows = rows.len(), "wrote report section");
    Ok(())
}

fn performance_rows(report: &AnalyticsReport) -> Vec<PerformanceRow> {
    let m = &report.metrics;
    let turnover: f64 = report.portfolio.rebalances.iter().map(|e| e.turnover).sum();
    let mut rows = vec![
        PerformanceRow { metric: "periods", value: Some(m.periods as f64) },
        PerformanceRow { metric: "cagr", value: Some(m.cagr) },
        PerformanceRow { metric: "annualized_volatility", value: Some(m.annualized_volatility) },
        PerformanceRow { metric: "sharpe_ratio", value: Some(m.sharpe_ratio) },
        PerformanceRow { metric: "sortino_ratio", value: Some(m.sortino_ratio) },
        PerformanceRow { metric: "hit_rate", value: Some(m.hit_rate) },
        PerformanceRow { metric: "max_drawdown", value: Some(m.max_drawdown) },
        PerformanceRow {
            metric: "rebalances",
            value: Some(report.portfolio.rebalances.len() as f64),
        },
        PerformanceRow { metric: "total_turnover", value: Some(turnover) },
    ];
    if let Some(f) = &report.factors {
        rows.push(PerformanceRow { metric: "factor_r_squared", value: f.r_squared });
        rows.push(PerformanceRow {
            metric: "factor_residual_std_error",
            value: Some(f.residual_std_error),
        });
    }
    if report.scenario_return.is_some() {
        rows.push(PerformanceRow { metric: "scenario_return", value: report.scenario_return });
    }
    rows
}

impl ReportPort for CsvReportAdapter {
    fn write(&self, report: &AnalyticsReport, output: &Path) -> Result<(), RisklabError> {
        fs::create_dir_all(output)?;

        write_rows(&output.join(PERFORMANCE_FILE), &performance_rows(report))?;

        let drawdown: Vec<DrawdownRow> = report
            .metrics
            .drawdown_curve
            .iter()
            .map(|p| DrawdownRow {
                date: p.date.to_string(),
                wealth: p.wealth,
                drawdown: p.drawdown,
            })
            .collect();
        write_rows(&output.join(DRAWDOWN_FILE), &drawdown)?;

        let var: Vec<VarRow> = report
            .var
            .iter()
            .map(|e| VarRow {
                method: e.method.to_string(),
                confidence: e.confidence,
                var: e.var,
                cvar: e.cvar,
                observations: e.observations,
                selected: e.method == report.selected_var.method,
            })
            .collect();
        write_rows(&output.join(VAR_FILE), &var)?;

        if let Some(points) = &report.beta {
            let beta: Vec<BetaRow> = points
                .iter()
                .map(|p| BetaRow {
                    date: p.date.to_string(),
                    beta: p.beta,
                })
                .collect();
            write_rows(&output.join(BETA_FILE), &beta)?;
        }

        if let Some(exposure) = &report.factors {
            let factors: Vec<FactorRow> = std::iter::once(&exposure.intercept)
                .chain(&exposure.coefficients)
                .map(|c| FactorRow {
                    term: c.name.clone(),
                    estimate: c.estimate,
                    std_error: c.std_error,
                    t_stat: c.t_stat,
                })
                .collect();
            write_rows(&output.join(FACTORS_FILE), &factors)?;
        }

        let vol = &report.volatility;
        let volatility: Vec<VolatilityRow> = vol
            .daily
            .iter()
            .zip(&vol.annualized)
            .enumerate()
            .map(|(i, (daily, annualized))| VolatilityRow {
                step: i + 1,
                model: vol.state.to_string(),
                daily: *daily,
                annualized: *annualized,
            })
            .collect();
        write_rows(&output.join(VOLATILITY_FILE), &volatility)?;

        tracing::info!(output = %output.display(), "report written");
        Ok(())
    }
}
