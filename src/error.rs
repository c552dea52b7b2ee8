use thiserror::Error;

use crate::evolution::EvalError;
use crate::schema::ConfigError;

/// Main error type for tuning runs.
#[derive(Error, Debug)]
pub enum TunerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The reference measurement failed, so no generation can be compared.
    #[error("Baseline evaluation failed in generation {generation}: {source}")]
    Baseline {
        generation: usize,
        #[source]
        source: EvalError,
    },

    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for tuning operations.
pub type TunerResult<T> = Result<T, TunerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_error_display() {
        let error = TunerError::Baseline {
            generation: 3,
            source: EvalError::TimedOut(Duration::from_secs(2)),
        };
        let text = error.to_string();
        assert!(text.contains("generation 3"));
        assert!(text.contains("timed out"));
    }

    #[test]
    fn test_error_conversion() {
        let err: TunerError = ConfigError::NoGenes.into();
        match err {
            TunerError::Config(ConfigError::NoGenes) => (),
            _ => panic!("Expected Config error"),
        }
    }
}
