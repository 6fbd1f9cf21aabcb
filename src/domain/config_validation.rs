//! Configuration validation.
//!
//! Checks every configured value before the analytics pipeline runs, so a
//! bad file fails with the offending section and key named.

use crate::domain::error::RisklabError;
use crate::domain::portfolio::RebalancePolicy;
use crate::domain::returns::ReturnKind;
use crate::domain::var::VarMethod;
use crate::ports::config_port::ConfigPort;
use std::collections::HashSet;
use std::str::FromStr;

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), RisklabError> {
    validate_portfolio(config)?;
    validate_risk(config)?;
    validate_beta(config)?;
    validate_volatility(config)?;
    validate_factors(config)?;
    validate_scenario(config)?;
    Ok(())
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> RisklabError {
    RisklabError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn missing(section: &str, key: &str) -> RisklabError {
    RisklabError::ConfigMissing {
        section: section.to_string(),
        key: key.to_string(),
    }
}

/// Parse an optional value; present but unparseable is an error.
pub(crate) fn parse_value<T>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<T>, RisklabError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| invalid(section, key, format!("cannot parse '{}': {}", raw.trim(), e))),
    }
}

fn validate_bool(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), RisklabError> {
    if config.get_string(section, key).is_some()
        && config.get_bool(section, key, true) != config.get_bool(section, key, false)
    {
        return Err(invalid(section, key, "expected true or false"));
    }
    Ok(())
}

fn validate_portfolio(config: &dyn ConfigPort) -> Result<(), RisklabError> {
    let tickers = config
        .get_list("portfolio", "tickers")
        .filter(|t| !t.is_empty())
        .ok_or_else(|| missing("portfolio", "tickers"))?;
    let weights = config
        .get_list("portfolio", "weights")
        .filter(|w| !w.is_empty())
        .ok_or_else(|| missing("portfolio", "weights"))?;

    if tickers.len() != weights.len() {
        return Err(invalid(
            "portfolio",
            "weights",
            format!("{} weights for {} tickers", weights.len(), tickers.len()),
        ));
    }

    let mut seen = HashSet::new();
    for ticker in &tickers {
        if !seen.insert(ticker) {
            return Err(invalid("portfolio", "tickers", format!("duplicate ticker {ticker}")));
        }
    }

    let mut total = 0.0;
    for w in &weights {
        let value: f64 = w
            .parse()
            .map_err(|_| invalid("portfolio", "weights", format!("'{w}' is not a number")))?;
        if !value.is_finite() {
            return Err(invalid("portfolio", "weights", "weights must be finite"));
        }
        total += value;
    }

    validate_bool(config, "portfolio", "normalize")?;
    if config.get_bool("portfolio", "normalize", false) && total == 0.0 {
        return Err(invalid("portfolio", "weights", "cannot normalize weights summing to zero"));
    }

    parse_value::<RebalancePolicy>(config, "portfolio", "rebalance")?;
    parse_value::<ReturnKind>(config, "portfolio", "return_kind")?;

    if let Some(b) = config.get_string("portfolio", "benchmark") {
        if b.trim().is_empty() {
            return Err(invalid("portfolio", "benchmark", "benchmark must not be blank"));
        }
    }
    Ok(())
}

fn validate_risk(config: &dyn ConfigPort) -> Result<(), RisklabError> {
    if let Some(alpha) = parse_value::<f64>(config, "risk", "confidence")? {
        if !(alpha > 0.0 && alpha < 1.0) {
            return Err(invalid("risk", "confidence", "confidence must lie strictly between 0 and 1"));
        }
    }
    if let Some(lookback) = parse_value::<usize>(config, "risk", "lookback")? {
        if lookback == 0 {
            return Err(invalid("risk", "lookback", "lookback must be positive"));
        }
    }
    parse_value::<VarMethod>(config, "risk", "method")?;

    if let Some(rf) = parse_value::<f64>(config, "risk", "risk_free_rate")? {
        if !(0.0..1.0).contains(&rf) {
            return Err(invalid("risk", "risk_free_rate", "risk_free_rate must be between 0 and 1"));
        }
    }
    if let Some(p) = parse_value::<f64>(config, "risk", "periods_per_year")? {
        if !(p > 0.0) {
            return Err(invalid("risk", "periods_per_year", "periods_per_year must be positive"));
        }
    }
    Ok(())
}

fn validate_beta(config: &dyn ConfigPort) -> Result<(), RisklabError> {
    if let Some(window) = parse_value::<usize>(config, "beta", "window")? {
        if window < 2 {
            return Err(invalid("beta", "window", "window must be at least 2"));
        }
    }
    Ok(())
}

fn validate_volatility(config: &dyn ConfigPort) -> Result<(), RisklabError> {
    if let Some(lambda) = parse_value::<f64>(config, "volatility", "lambda")? {
        if !(lambda > 0.0 && lambda < 1.0) {
            return Err(invalid("volatility", "lambda", "lambda must lie strictly between 0 and 1"));
        }
    }
    if parse_value::<usize>(config, "volatility", "horizon")? == Some(0) {
        return Err(invalid("volatility", "horizon", "horizon must be positive"));
    }
    if let Some(a) = parse_value::<f64>(config, "volatility", "annualization")? {
        if !(a > 0.0) {
            return Err(invalid("volatility", "annualization", "annualization must be positive"));
        }
    }
    if let Some(seed) = parse_value::<usize>(config, "volatility", "seed_window")? {
        if seed < 2 {
            return Err(invalid("volatility", "seed_window", "seed_window must be at least 2"));
        }
    }
    if parse_value::<u64>(config, "volatility", "max_iterations")? == Some(0) {
        return Err(invalid("volatility", "max_iterations", "max_iterations must be positive"));
    }
    Ok(())
}

/// Names under which factors are reported: `names` if given, else tickers.
pub(crate) fn factor_names(config: &dyn ConfigPort) -> Vec<String> {
    config
        .get_list("factors", "names")
        .or_else(|| config.get_list("factors", "tickers"))
        .unwrap_or_default()
}

fn validate_factors(config: &dyn ConfigPort) -> Result<(), RisklabError> {
    let Some(tickers) = config.get_list("factors", "tickers") else {
        if config.get_string("factors", "names").is_some() {
            return Err(missing("factors", "tickers"));
        }
        return Ok(());
    };
    if tickers.is_empty() {
        return Err(invalid("factors", "tickers", "no factor tickers listed"));
    }
    if let Some(names) = config.get_list("factors", "names") {
        if names.len() != tickers.len() {
            return Err(invalid(
                "factors",
                "names",
                format!("{} names for {} tickers", names.len(), tickers.len()),
            ));
        }
    }

    let mut seen = HashSet::new();
    for name in factor_names(config) {
        if !seen.insert(name.clone()) {
            return Err(invalid("factors", "names", format!("duplicate factor {name}")));
        }
    }
    Ok(())
}

fn validate_scenario(config: &dyn ConfigPort) -> Result<(), RisklabError> {
    let keys = config.keys("scenario");
    if keys.is_empty() {
        return Ok(());
    }

    let names = factor_names(config);
    if names.is_empty() {
        return Err(invalid("scenario", &keys[0], "scenario given without [factors]"));
    }
    for key in &keys {
        if !names.contains(key) {
            return Err(invalid("scenario", key, "not a configured factor"));
        }
        let shock = parse_value::<f64>(config, "scenario", key)?
            .ok_or_else(|| invalid("scenario", key, "shock value is empty"))?;
        if !shock.is_finite() {
            return Err(invalid("scenario", key, "shock must be finite"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    const PORTFOLIO: &str = "[portfolio]\ntickers = AAPL, MSFT\nweights = 0.6, 0.4\n";

    fn with_portfolio(extra: &str) -> FileConfigAdapter {
        make_config(&format!("{PORTFOLIO}{extra}"))
    }

    #[test]
    fn valid_full_config_passes() {
        let config = make_config(
            r#"
[portfolio]
tickers = AAPL, MSFT, TLT
weights = 0.5, 0.3, 0.2
normalize = true
rebalance = M
benchmark = SPY
return_kind = log

[risk]
confidence = 0.99
lookback = 250
method = cornish_fisher
risk_free_rate = 0.02
periods_per_year = 252

[beta]
window = 63

[volatility]
lambda = 0.94
horizon = 20
annualization = 252
seed_window = 30
max_iterations = 5000

[factors]
tickers = SPY, IEF
names = Market, Rates

[scenario]
Market = -0.10
Rates = 0.02
"#,
        );
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn minimal_config_passes() {
        assert!(validate_config(&with_portfolio("")).is_ok());
    }

    #[test]
    fn missing_tickers_fails() {
        let config = make_config("[portfolio]\nweights = 1.0\n");
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, RisklabError::ConfigMissing { key, .. } if key == "tickers"));
    }

    #[test]
    fn missing_weights_fails() {
        let config = make_config("[portfolio]\ntickers = AAPL\n");
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, RisklabError::ConfigMissing { key, .. } if key == "weights"));
    }

    #[test]
    fn weight_count_mismatch_fails() {
        let config = make_config("[portfolio]\ntickers = AAPL, MSFT\nweights = 1.0\n");
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, RisklabError::ConfigInvalid { key, .. } if key == "weights"));
    }

    #[test]
    fn non_numeric_weight_fails() {
        let config = make_config("[portfolio]\ntickers = AAPL\nweights = heavy\n");
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn duplicate_ticker_fails() {
        let config = make_config("[portfolio]\ntickers = AAPL, AAPL\nweights = 0.5, 0.5\n");
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, RisklabError::ConfigInvalid { key, .. } if key == "tickers"));
    }

    #[test]
    fn normalizing_zero_weights_fails() {
        let config = make_config(
            "[portfolio]\ntickers = A, B\nweights = 0.5, -0.5\nnormalize = true\n",
        );
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn bad_normalize_flag_fails() {
        let err = validate_config(&with_portfolio("normalize = maybe\n")).unwrap_err();
        assert!(matches!(err, RisklabError::ConfigInvalid { key, .. } if key == "normalize"));
    }

    #[test]
    fn unknown_rebalance_fails() {
        let err = validate_config(&with_portfolio("rebalance = weekly\n")).unwrap_err();
        assert!(matches!(err, RisklabError::ConfigInvalid { key, .. } if key == "rebalance"));
    }

    #[test]
    fn confidence_out_of_range_fails() {
        for value in ["0", "1", "1.5", "abc"] {
            let err = validate_config(&with_portfolio(&format!("[risk]\nconfidence = {value}\n")))
                .unwrap_err();
            assert!(matches!(err, RisklabError::ConfigInvalid { key, .. } if key == "confidence"));
        }
    }

    #[test]
    fn zero_lookback_fails() {
        let err = validate_config(&with_portfolio("[risk]\nlookback = 0\n")).unwrap_err();
        assert!(matches!(err, RisklabError::ConfigInvalid { key, .. } if key == "lookback"));
    }

    #[test]
    fn unknown_var_method_fails() {
        let err = validate_config(&with_portfolio("[risk]\nmethod = monte_carlo\n")).unwrap_err();
        assert!(matches!(err, RisklabError::ConfigInvalid { key, .. } if key == "method"));
    }

    #[test]
    fn beta_window_below_two_fails() {
        let err = validate_config(&with_portfolio("[beta]\nwindow = 1\n")).unwrap_err();
        assert!(matches!(err, RisklabError::ConfigInvalid { key, .. } if key == "window"));
    }

    #[test]
    fn non_numeric_lambda_fails_instead_of_defaulting() {
        let err =
            validate_config(&with_portfolio("[volatility]\nlambda = not_a_number\n")).unwrap_err();
        assert!(matches!(err, RisklabError::ConfigInvalid { key, .. } if key == "lambda"));
    }

    #[test]
    fn lambda_out_of_range_fails() {
        let err = validate_config(&with_portfolio("[volatility]\nlambda = 1.0\n")).unwrap_err();
        assert!(matches!(err, RisklabError::ConfigInvalid { key, .. } if key == "lambda"));
    }

    #[test]
    fn zero_horizon_fails() {
        let err = validate_config(&with_portfolio("[volatility]\nhorizon = 0\n")).unwrap_err();
        assert!(matches!(err, RisklabError::ConfigInvalid { key, .. } if key == "horizon"));
    }

    #[test]
    fn factor_name_count_mismatch_fails() {
        let err = validate_config(&with_portfolio(
            "[factors]\ntickers = SPY, IEF\nnames = Market\n",
        ))
        .unwrap_err();
        assert!(matches!(err, RisklabError::ConfigInvalid { key, .. } if key == "names"));
    }

    #[test]
    fn scenario_for_unknown_factor_fails() {
        let err = validate_config(&with_portfolio(
            "[factors]\ntickers = SPY\n\n[scenario]\nGOLD = 0.1\n",
        ))
        .unwrap_err();
        assert!(matches!(err, RisklabError::ConfigInvalid { key, .. } if key == "GOLD"));
    }

    #[test]
    fn scenario_keyed_by_ticker_without_names_passes() {
        let config = with_portfolio("[factors]\ntickers = SPY\n\n[scenario]\nSPY = -0.2\n");
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn scenario_without_factors_fails() {
        let err = validate_config(&with_portfolio("[scenario]\nSPY = -0.2\n")).unwrap_err();
        assert!(matches!(err, RisklabError::ConfigInvalid { section, .. } if section == "scenario"));
    }

    #[test]
    fn non_numeric_shock_fails() {
        let config = with_portfolio("[factors]\ntickers = SPY\n\n[scenario]\nSPY = crash\n");
        assert!(validate_config(&config).is_err());
    }
}
