//! Domain error types.

/// Top-level error type for signalsim.
#[derive(Debug, thiserror::Error)]
pub enum SignalsimError {
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

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("no data for symbol {symbol}")]
    NoData { symbol: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&SignalsimError> for std::process::ExitCode {
    fn from(err: &SignalsimError) -> Self {
        let code: u8 = match err {
            SignalsimError::Io(_) => 1,
            SignalsimError::ConfigParse { .. }
            | SignalsimError::ConfigMissing { .. }
            | SignalsimError::ConfigInvalid { .. } => 2,
            SignalsimError::Data { .. } => 3,
            SignalsimError::NoData { .. } => 4,
        };
        std::process::ExitCode::from(code)
    }
}
