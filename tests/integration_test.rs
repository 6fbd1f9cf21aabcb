//! Integration tests for the analytics pipeline.
//!
//! These exercise the engines together through `run_analytics` and the
//! public domain API, using synthetic price panels from `common`.

mod common;

use approx::assert_relative_eq;
use common::*;
use risklab::domain::analytics::{
    run_analytics, run_analytics_with, AnalyticsRequest, FactorProxy,
};
use risklab::domain::error::RisklabError;
use risklab::domain::factors::Scenario;
use risklab::domain::portfolio::{self, Holding, PortfolioSpec, RebalancePolicy};
use risklab::domain::returns::{panel_returns, ReturnKind};
use risklab::domain::var::{self, VarMethod};
use risklab::domain::volatility::{VolatilityEngine, VolatilityState};
use risklab::ports::price_port::PricePort;

fn single(ticker: &str, weight: f64) -> PortfolioSpec {
    PortfolioSpec::new(vec![Holding {
        ticker: ticker.to_string(),
        weight,
    }])
    .unwrap()
}

fn no_garch() -> bool {
    false
}

fn ewma_engine(req: &AnalyticsRequest) -> VolatilityEngine {
    VolatilityEngine::new(req.volatility.clone()).with_probe(no_garch)
}

mod constant_prices {
    use super::*;

    #[test]
    fn returns_are_exactly_zero() {
        let panel = constant_panel(&["A", "B"], 50);
        let returns = panel_returns(&panel, ReturnKind::Simple).unwrap();
        let series = returns.series("A").unwrap();
        assert_eq!(series.len(), 49);
        assert!(series.values.iter().all(|r| *r == 0.0));
    }

    #[test]
    fn var_and_cvar_are_zero_for_every_method_and_level() {
        let panel = constant_panel(&["A"], 150);
        let series = panel_returns(&panel, ReturnKind::Log)
            .unwrap()
            .series("A")
            .unwrap();

        for alpha in [0.9, 0.95, 0.975, 0.99] {
            let estimates = var::estimate_all(&series, alpha, None).unwrap();
            assert_eq!(estimates.len(), VarMethod::ALL.len());
            for est in estimates {
                assert_eq!(est.var, 0.0, "{} at {alpha}", est.method);
                assert_eq!(est.cvar, 0.0, "{} at {alpha}", est.method);
            }
        }
    }

    #[test]
    fn pipeline_reports_flat_ewma_volatility() {
        let mut req = AnalyticsRequest::new(single("A", 1.0));
        req.volatility.horizon = 5;
        let report = run_analytics_with(&constant_panel(&["A"], 60), &req, &ewma_engine(&req))
            .unwrap();

        assert_eq!(report.selected_var.var, 0.0);
        assert_eq!(report.metrics.max_drawdown, 0.0);
        assert_eq!(report.volatility.state, VolatilityState::EwmaFallback);
        assert_eq!(report.volatility.daily, vec![0.0; 5]);
    }
}

mod portfolio_combination {
    use super::*;

    #[test]
    fn single_full_weight_asset_is_its_own_return_series() {
        let panel = market_panel(80);
        let returns = panel_returns(&panel, ReturnKind::Simple).unwrap();
        let combined =
            portfolio::combine(&returns, &single("A", 1.0), RebalancePolicy::None).unwrap();

        let asset = returns.series("A").unwrap();
        assert_eq!(combined.series.dates, asset.dates);
        for (p, a) in combined.series.values.iter().zip(&asset.values) {
            assert_relative_eq!(p, a, epsilon = 1e-15);
        }
        assert!(combined.rebalances.is_empty());
    }

    #[test]
    fn monthly_rebalancing_departs_from_buy_and_hold_at_first_boundary() {
        let swing: Vec<f64> = (0..60).map(|i| if i % 2 == 0 { 0.1 } else { -0.1 }).collect();
        let flat = vec![0.0; 60];
        let panel = panel_from_returns(&["A", "B"], &[swing, flat], date(2023, 1, 2));
        let returns = panel_returns(&panel, ReturnKind::Simple).unwrap();
        let spec = PortfolioSpec::from_pairs(&strings(&["A", "B"]), &[0.5, 0.5]).unwrap();

        let held = portfolio::combine(&returns, &spec, RebalancePolicy::None).unwrap();
        let monthly = portfolio::combine(&returns, &spec, RebalancePolicy::Monthly).unwrap();

        let first = monthly.rebalances.first().expect("a month boundary").date;
        assert_eq!(first, date(2023, 2, 1));

        let split = monthly.series.dates.iter().position(|d| *d == first).unwrap();
        assert_eq!(
            held.series.values[..split],
            monthly.series.values[..split]
        );
        assert_ne!(held.series.values[split], monthly.series.values[split]);

        let held_wealth =
            *portfolio::wealth_curve(&held.series.values, ReturnKind::Simple).last().unwrap();
        let monthly_wealth =
            *portfolio::wealth_curve(&monthly.series.values, ReturnKind::Simple).last().unwrap();
        assert!((held_wealth - monthly_wealth).abs() > 1e-6);
    }

    #[test]
    fn opposite_phase_swings_rebalance_back_to_target() {
        let up_down: Vec<f64> = (0..60).map(|i| if i % 2 == 0 { 0.1 } else { -0.1 }).collect();
        let down_up: Vec<f64> = up_down.iter().map(|r| -r).collect();
        let panel = panel_from_returns(&["A", "B"], &[up_down, down_up], date(2023, 1, 2));
        let returns = panel_returns(&panel, ReturnKind::Simple).unwrap();
        let spec = PortfolioSpec::from_pairs(&strings(&["A", "B"]), &[0.5, 0.5]).unwrap();

        let held = portfolio::combine(&returns, &spec, RebalancePolicy::None).unwrap();
        let monthly = portfolio::combine(&returns, &spec, RebalancePolicy::Monthly).unwrap();

        // Held weights drift to 0.55/0.45 after every up-swing of A, so
        // buy-and-hold loses 1% on each odd period.
        for (i, r) in held.series.values.iter().enumerate() {
            let expected = if i % 2 == 0 { 0.0 } else { -0.01 };
            assert_relative_eq!(*r, expected, epsilon = 1e-12);
        }

        let boundaries: Vec<_> = monthly.rebalances.iter().map(|e| e.date).collect();
        assert_eq!(boundaries, vec![date(2023, 2, 1), date(2023, 3, 1)]);
        // February opens after an odd number of swings, March after an even one.
        assert_relative_eq!(monthly.rebalances[0].turnover, 0.1, epsilon = 1e-12);
        assert_relative_eq!(monthly.rebalances[1].turnover, 0.0, epsilon = 1e-12);

        let split = monthly.series.dates.iter().position(|d| *d == boundaries[0]).unwrap();
        assert_eq!(split, 21);
        assert_relative_eq!(held.series.values[split], -0.01, epsilon = 1e-12);
        assert_relative_eq!(monthly.series.values[split], 0.0, epsilon = 1e-12);

        let held_wealth =
            *portfolio::wealth_curve(&held.series.values, ReturnKind::Simple).last().unwrap();
        let monthly_wealth =
            *portfolio::wealth_curve(&monthly.series.values, ReturnKind::Simple).last().unwrap();
        assert_relative_eq!(held_wealth, 0.99_f64.powi(30), max_relative = 1e-10);
        assert_relative_eq!(monthly_wealth, 0.99_f64.powi(29), max_relative = 1e-10);
    }
}

mod return_kinds {
    use super::*;

    #[test]
    fn doubling_price_compounds_identically_in_both_modes() {
        let panel = panel_from_returns(&["A"], &[vec![1.0; 40]], date(2022, 1, 3));
        let mut req = AnalyticsRequest::new(single("A", 1.0));
        req.periods_per_year = 40.0;

        let simple = run_analytics_with(&panel, &req, &ewma_engine(&req)).unwrap();
        req.return_kind = ReturnKind::Log;
        let log = run_analytics_with(&panel, &req, &ewma_engine(&req)).unwrap();

        let final_wealth =
            |values: &[f64], kind| *portfolio::wealth_curve(values, kind).last().unwrap();
        let expected = 2.0_f64.powi(40);
        assert_relative_eq!(
            final_wealth(&simple.portfolio.series.values, ReturnKind::Simple),
            expected,
            max_relative = 1e-9
        );
        assert_relative_eq!(
            final_wealth(&log.portfolio.series.values, ReturnKind::Log),
            expected,
            max_relative = 1e-9
        );
        assert_relative_eq!(simple.metrics.cagr, expected - 1.0, max_relative = 1e-9);
        assert_relative_eq!(log.metrics.cagr, simple.metrics.cagr, max_relative = 1e-9);
    }
}

mod beta_and_factors {
    use super::*;

    fn levered_panel() -> risklab::domain::price_panel::PricePanel {
        let market: Vec<f64> = (0..120).map(|i| (i as f64 * 0.45).sin() * 0.01).collect();
        let levered: Vec<f64> = market.iter().map(|r| 2.0 * r).collect();
        panel_from_returns(&["LEV", "MKT"], &[levered, market], date(2022, 6, 1))
    }

    #[test]
    fn doubled_benchmark_has_beta_two_on_full_windows() {
        let mut req = AnalyticsRequest::new(single("LEV", 1.0));
        req.benchmark = Some("MKT".into());
        req.beta_window = 30;
        let report = run_analytics_with(&levered_panel(), &req, &ewma_engine(&req)).unwrap();

        let beta = report.beta.unwrap();
        assert_eq!(beta.len(), 120);
        assert!(beta[..29].iter().all(|p| p.beta.is_nan()));
        for point in &beta[29..] {
            assert_relative_eq!(point.beta, 2.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn factor_regression_recovers_loading_and_projects_scenario() {
        let mut req = AnalyticsRequest::new(single("LEV", 1.0));
        req.factors = vec![FactorProxy {
            ticker: "MKT".into(),
            name: "Market".into(),
        }];
        req.scenario = Scenario::new([("Market", -0.05)]);
        let report = run_analytics_with(&levered_panel(), &req, &ewma_engine(&req)).unwrap();

        let exposure = report.factors.unwrap();
        assert_relative_eq!(exposure.coefficients[0].estimate, 2.0, epsilon = 1e-9);
        assert_relative_eq!(exposure.intercept.estimate, 0.0, epsilon = 1e-9);
        assert_relative_eq!(report.scenario_return.unwrap(), -0.1, epsilon = 1e-9);
    }

    #[test]
    fn collinear_factors_are_rank_deficient() {
        let mut req = AnalyticsRequest::new(single("A", 1.0));
        req.factors = vec![
            FactorProxy { ticker: "MKT".into(), name: "Market".into() },
            FactorProxy { ticker: "MKT2".into(), name: "Market again".into() },
        ];
        let market: Vec<f64> = (0..90).map(|i| (i as f64 * 0.3).cos() * 0.01).collect();
        let asset: Vec<f64> = market.iter().map(|r| 0.8 * r + 0.0005).collect();
        let panel = panel_from_returns(
            &["A", "MKT", "MKT2"],
            &[asset, market.clone(), market],
            date(2022, 1, 3),
        );

        let err = run_analytics_with(&panel, &req, &ewma_engine(&req)).unwrap_err();
        assert!(matches!(err, RisklabError::RankDeficient { .. }));
    }
}

mod full_pipeline {
    use super::*;

    #[test]
    fn mock_port_feeds_the_pipeline() {
        let port = MockPricePort::new().with_panel(market_panel(200));
        let spec = PortfolioSpec::from_pairs(&strings(&["A", "B"]), &[0.7, 0.3]).unwrap();
        let mut req = AnalyticsRequest::new(spec);
        req.benchmark = Some("MKT".into());
        req.rebalance = RebalancePolicy::Quarterly;
        req.risk.method = VarMethod::CornishFisher;
        req.risk.lookback = Some(100);

        let panel = port
            .fetch_prices(&req.tickers(), Some(date(2022, 2, 1)), None)
            .unwrap();
        assert_eq!(port.calls.get(), 1);
        assert_eq!(panel.dates()[0], date(2022, 2, 1));

        let report = run_analytics(&panel, &req).unwrap();
        assert_eq!(report.selected_var.method, VarMethod::CornishFisher);
        assert_eq!(report.selected_var.observations, 100);
        assert!(report.selected_var.cvar >= report.selected_var.var - 1e-12);
        assert!(!report.portfolio.rebalances.is_empty());
        assert_eq!(report.volatility.daily.len(), req.volatility.horizon);
        assert!(report.metrics.max_drawdown <= 0.0);
    }

    #[test]
    fn data_source_error_propagates() {
        let port = MockPricePort::new().with_error("connection refused");
        let err = port.fetch_prices(&strings(&["A"]), None, None).unwrap_err();
        assert!(matches!(err, RisklabError::DataSource { .. }));
        assert_eq!(err.exit_status(), 3);
    }

    #[test]
    fn unknown_portfolio_ticker_is_rejected() {
        let req = AnalyticsRequest::new(single("ZZZ", 1.0));
        let err = run_analytics(&market_panel(60), &req).unwrap_err();
        assert!(matches!(err, RisklabError::InvalidConfig { .. }));
    }
}
