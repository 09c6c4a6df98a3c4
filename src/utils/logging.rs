//! Tracing initialisation helpers.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::utils::error::{IndexerError, Result};

const LOG_FORMAT_JSON: &str = "json";
const LOG_FORMAT_TEXT: &str = "text";

/// Initialise the global tracing subscriber.
///
/// `level` is an `EnvFilter` directive (e.g. `"info"` or
/// `"debug,sqlx=warn"`); `format` must be `"json"` or `"text"`.
/// Should be called once at application startup.
///
/// # Errors
///
/// Returns [`IndexerError::Config`] if the level directive does not parse
/// or the format is not one of the two supported values.
pub fn init_logging(level: &str, format: &str) -> Result<()> {
    let filter = EnvFilter::try_new(level)
        .map_err(|e| IndexerError::Config(format!("invalid log level {level:?}: {e}")))?;

    match format {
        LOG_FORMAT_JSON => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json())
                .init();
        }
        LOG_FORMAT_TEXT => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer())
                .init();
        }
        other => {
            return Err(IndexerError::Config(format!(
                "invalid logging format: {other}"
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_format() {
        let err = init_logging("info", "yaml").unwrap_err();
        assert!(matches!(err, IndexerError::Config(_)));
    }

    #[test]
    fn rejects_bad_level_directive() {
        let err = init_logging("not=a=level", "json").unwrap_err();
        assert!(matches!(err, IndexerError::Config(_)));
    }
}
