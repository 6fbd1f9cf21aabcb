//! Domain error types.

/// Top-level error type for risklab.
///
/// Numerical non-convergence of the GARCH model is not represented here: it
/// is recovered locally and reported as a
/// [`FallbackReason`](crate::domain::volatility::FallbackReason). Only a
/// failure of the fallback model itself surfaces as [`RisklabError::Volatility`].
#[derive(Debug, thiserror::Error)]
pub enum RisklabError {
    #[error("insufficient data for {statistic}: have {have} observations, need {need}")]
    InsufficientData {
        statistic: String,
        have: usize,
        need: usize,
    },

    #[error("confidence level {alpha} must lie strictly between 0 and 1")]
    InvalidConfidence { alpha: f64 },

    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("cannot align {series} to portfolio dates: {reason}")]
    Alignment { series: String, reason: String },

    #[error("factor design matrix is rank deficient (condition {condition:.3e})")]
    RankDeficient { condition: f64 },

    #[error("malformed price panel: {reason}")]
    MalformedPanel { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("{model} volatility failed: {reason}")]
    Volatility {
        model: String,
        reason: crate::domain::volatility::FallbackReason,
    },

    #[error("price source error: {reason}")]
    DataSource { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RisklabError {
    pub(crate) fn insufficient(statistic: &str, have: usize, need: usize) -> Self {
        RisklabError::InsufficientData {
            statistic: statistic.to_string(),
            have,
            need,
        }
    }

    pub(crate) fn invalid_config(reason: impl Into<String>) -> Self {
        RisklabError::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Process exit status reported by the CLI for this error.
    pub fn exit_status(&self) -> u8 {
        match self {
            RisklabError::Io(_) => 1,
            RisklabError::ConfigParse { .. }
            | RisklabError::ConfigMissing { .. }
            | RisklabError::ConfigInvalid { .. }
            | RisklabError::InvalidConfig { .. }
            | RisklabError::InvalidConfidence { .. } => 2,
            RisklabError::DataSource { .. } => 3,
            RisklabError::Alignment { .. } | RisklabError::RankDeficient { .. } => 4,
            RisklabError::InsufficientData { .. }
            | RisklabError::MalformedPanel { .. }
            | RisklabError::Volatility { .. } => 5,
        }
    }
}

impl From<&RisklabError> for std::process::ExitCode {
    fn from(err: &RisklabError) -> Self {
        std::process::ExitCode::from(err.exit_status())
    }
}
