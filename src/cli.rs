//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_price_adapter::CsvPriceAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::price_cache::CachedPricePort;
use crate::domain::analytics::{self, AnalyticsReport, AnalyticsRequest, FactorProxy};
use crate::domain::config_validation::{factor_names, parse_value, validate_config};
use crate::domain::error::RisklabError;
use crate::domain::factors::Scenario;
use crate::domain::portfolio::PortfolioSpec;
use crate::domain::var::RiskConfig;
use crate::domain::volatility::VolatilityConfig;
use crate::ports::config_port::ConfigPort;
use crate::ports::price_port::PricePort;
use crate::ports::report_port::ReportPort;

pub const DEFAULT_OUTPUT_DIR: &str = "risklab-report";

#[derive(Parser, Debug)]
#[command(name = "risklab", about = "Portfolio risk and performance analytics")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the analytics pipeline and write a CSV report
    Analyze {
        #[arg(short, long)]
        config: PathBuf,
        /// Wide CSV of close prices: a Date column plus one column per ticker
        #[arg(short, long)]
        prices: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// First date to include (YYYY-MM-DD)
        #[arg(long)]
        start: Option<NaiveDate>,
        /// Last date to include (YYYY-MM-DD)
        #[arg(long)]
        end: Option<NaiveDate>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Analyze {
            config,
            prices,
            output,
            start,
            end,
        } => run_analyze(&config, &prices, output.as_deref(), start, end),
        Command::Validate { config } => run_validate(&config),
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = RisklabError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn run_analyze(
    config_path: &Path,
    prices_path: &Path,
    output_path: Option<&Path>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> ExitCode {
    // Stage 1: Load config
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    // Stage 2: Validate and build the request
    if let Err(e) = validate_config(&adapter) {
        eprintln!("error: {e}");
        return (&e).into();
    }
    let request = match build_request(&adapter) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    if let (Some(s), Some(e)) = (start, end) {
        if s > e {
            let err = RisklabError::invalid_config(format!("start {s} is after end {e}"));
            eprintln!("error: {err}");
            return (&err).into();
        }
    }

    // Stage 3: Run against the price file
    let prices = CachedPricePort::new(CsvPriceAdapter::new(prices_path.to_path_buf()));
    let output = output_path.unwrap_or_else(|| Path::new(DEFAULT_OUTPUT_DIR));
    run_analyze_pipeline(&prices, &request, output, start, end)
}

pub fn build_risk_config(adapter: &dyn ConfigPort) -> Result<RiskConfig, RisklabError> {
    let defaults = RiskConfig::default();
    Ok(RiskConfig {
        confidence: parse_value(adapter, "risk", "confidence")?.unwrap_or(defaults.confidence),
        lookback: parse_value(adapter, "risk", "lookback")?,
        method: parse_value(adapter, "risk", "method")?.unwrap_or(defaults.method),
    })
}

pub fn build_volatility_config(adapter: &dyn ConfigPort) -> Result<VolatilityConfig, RisklabError> {
    let d = VolatilityConfig::default();
    Ok(VolatilityConfig {
        lambda: parse_value(adapter, "volatility", "lambda")?.unwrap_or(d.lambda),
        horizon: parse_value(adapter, "volatility", "horizon")?.unwrap_or(d.horizon),
        annualization: parse_value(adapter, "volatility", "annualization")?
            .unwrap_or(d.annualization),
        seed_window: parse_value(adapter, "volatility", "seed_window")?.unwrap_or(d.seed_window),
        max_iterations: parse_value(adapter, "volatility", "max_iterations")?
            .unwrap_or(d.max_iterations),
    })
}

pub fn build_request(adapter: &dyn ConfigPort) -> Result<AnalyticsRequest, RisklabError> {
    let tickers = adapter
        .get_list("portfolio", "tickers")
        .ok_or_else(|| RisklabError::ConfigMissing {
            section: "portfolio".into(),
            key: "tickers".into(),
        })?;
    let weights = adapter
        .get_list("portfolio", "weights")
        .ok_or_else(|| RisklabError::ConfigMissing {
            section: "portfolio".into(),
            key: "weights".into(),
        })?
        .iter()
        .map(|w| {
            w.parse::<f64>().map_err(|_| RisklabError::ConfigInvalid {
                section: "portfolio".into(),
                key: "weights".into(),
                reason: format!("'{w}' is not a number"),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut request = AnalyticsRequest::new(PortfolioSpec::from_pairs(&tickers, &weights)?);
    request.normalize = adapter.get_bool("portfolio", "normalize", false);
    if let Some(policy) = parse_value(adapter, "portfolio", "rebalance")? {
        request.rebalance = policy;
    }
    if let Some(kind) = parse_value(adapter, "portfolio", "return_kind")? {
        request.return_kind = kind;
    }
    request.benchmark = adapter
        .get_string("portfolio", "benchmark")
        .map(|b| b.trim().to_string())
        .filter(|b| !b.is_empty());

    request.risk = build_risk_config(adapter)?;
    if let Some(rf) = parse_value(adapter, "risk", "risk_free_rate")? {
        request.risk_free_rate = rf;
    }
    if let Some(p) = parse_value(adapter, "risk", "periods_per_year")? {
        request.periods_per_year = p;
    }
    if let Some(window) = parse_value(adapter, "beta", "window")? {
        request.beta_window = window;
    }
    request.volatility = build_volatility_config(adapter)?;

    let factor_tickers = adapter.get_list("factors", "tickers").unwrap_or_default();
    request.factors = factor_tickers
        .into_iter()
        .zip(factor_names(adapter))
        .map(|(ticker, name)| FactorProxy { ticker, name })
        .collect();

    let mut shocks = Vec::new();
    for key in adapter.keys("scenario") {
        if let Some(shock) = parse_value::<f64>(adapter, "scenario", &key)? {
            shocks.push((key, shock));
        }
    }
    request.scenario = Scenario::new(shocks);

    Ok(request)
}

pub fn run_analyze_pipeline(
    price_port: &dyn PricePort,
    request: &AnalyticsRequest,
    output: &Path,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> ExitCode {
    // Stage 4: Fetch prices
    let tickers = request.tickers();
    eprintln!(
        "Fetching {} tickers from {}",
        tickers.len(),
        price_port.source()
    );
    let panel = match price_port.fetch_prices(&tickers, start, end) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    if let Some((first, last)) = panel.date_range() {
        eprintln!("  Processing: {} dates, {} to {}", panel.len(), first, last);
    }

    // Stage 5: Analytics
    let report = match analytics::run_analytics(&panel, request) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    // Stage 6: Console summary
    print_summary(&report);

    // Stage 7: Write report
    match CsvReportAdapter::new().write(&report, output) {
        Ok(()) => {
            eprintln!("\nReport written to: {}", output.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: failed to write report: {e}");
            (&e).into()
        }
    }
}

fn print_summary(report: &AnalyticsReport) {
    let m = &report.metrics;
    eprintln!("\n=== Performance ===");
    eprintln!("Periods:          {}", m.periods);
    eprintln!("CAGR:             {:.2}%", m.cagr * 100.0);
    eprintln!("Volatility:       {:.2}%", m.annualized_volatility * 100.0);
    eprintln!("Sharpe Ratio:     {:.2}", m.sharpe_ratio);
    eprintln!("Sortino Ratio:    {:.2}", m.sortino_ratio);
    eprintln!("Hit Rate:         {:.1}%", m.hit_rate * 100.0);
    eprintln!("Max Drawdown:     {:.1}%", m.max_drawdown * 100.0);
    eprintln!("Rebalances:       {}", report.portfolio.rebalances.len());

    eprintln!(
        "\n=== Value at Risk ({:.1}%) ===",
        report.selected_var.confidence * 100.0
    );
    for est in &report.var {
        let marker = if est.method == report.selected_var.method { "*" } else { " " };
        eprintln!(
            "{} {:<18} VaR {:.4}  CVaR {:.4}",
            marker, est.method, est.var, est.cvar
        );
    }

    if let Some(last) = report.beta.as_ref().and_then(|b| b.last()) {
        eprintln!("\nLatest Beta:      {:.3} ({})", last.beta, last.date);
    }

    if let Some(exposure) = &report.factors {
        eprintln!("\n=== Factor Exposure ===");
        for c in std::iter::once(&exposure.intercept).chain(&exposure.coefficients) {
            eprintln!(
                "  {:<12} {:>9.4}  (t = {:.2})",
                c.name, c.estimate, c.t_stat
            );
        }
        match exposure.r_squared {
            Some(r2) => eprintln!("  R-squared:   {r2:.3}"),
            None => eprintln!("  R-squared:   n/a"),
        }
        if let Some(ret) = report.scenario_return {
            eprintln!("  Scenario:    {:.2}%", ret * 100.0);
        }
    }

    let vol = &report.volatility;
    eprintln!("\n=== Volatility ({}) ===", vol.state);
    if let Some(reason) = &vol.fallback_reason {
        eprintln!("  Fallback:    {reason}");
    }
    if let (Some(first), Some(last)) = (vol.annualized.first(), vol.annualized.last()) {
        eprintln!(
            "  Annualized:  {:.2}% next, {:.2}% at step {}",
            first * 100.0,
            last * 100.0,
            vol.annualized.len()
        );
    }
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_config(&adapter) {
        eprintln!("error: {e}");
        return (&e).into();
    }
    let request = match build_request(&adapter) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    eprintln!("\nPortfolio:");
    for h in &request.portfolio.holdings {
        eprintln!("  {:<10} {:.4}", h.ticker, h.weight);
    }
    eprintln!("  Rebalance:   {}", request.rebalance);
    eprintln!("  Returns:     {}", request.return_kind);
    if let Some(b) = &request.benchmark {
        eprintln!("  Benchmark:   {b} (window {})", request.beta_window);
    }
    eprintln!(
        "\nRisk: {} at {:.1}%",
        request.risk.method,
        request.risk.confidence * 100.0
    );
    if !request.factors.is_empty() {
        let names: Vec<&str> = request.factors.iter().map(|f| f.name.as_str()).collect();
        eprintln!("Factors: {}", names.join(", "));
    }

    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}
