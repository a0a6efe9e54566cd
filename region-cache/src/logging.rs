use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Install the global tracing subscriber
///
/// `RUST_LOG` wins over the configured level. Format is `json` or `pretty`;
/// anything else falls back to the default compact output. Events go to
/// stderr. Calling this twice is harmless: the second subscriber is rejected.
pub fn init_logging(config: &LoggingConfig) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(config))
        .with_writer(std::io::stderr);
    let result = match config.format.as_str() {
        "json" => builder.json().try_init(),
        "pretty" => builder.pretty().try_init(),
        _ => builder.try_init(),
    };

    if let Err(err) = result {
        tracing::debug!("Tracing subscriber already installed: {}", err);
    }
}

/// Filter from `RUST_LOG`, or the configured level when it is unset or invalid
pub fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::level_filters::LevelFilter;

    #[test]
    fn test_configured_level_is_filter_fallback() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }

        let config = LoggingConfig {
            level: "debug".to_string(),
            format: "json".to_string(),
        };
        assert_eq!(env_filter(&config).max_level_hint(), Some(LevelFilter::DEBUG));

        let config = LoggingConfig {
            level: "warn".to_string(),
            ..LoggingConfig::default()
        };
        assert_eq!(env_filter(&config).max_level_hint(), Some(LevelFilter::WARN));
    }

    #[test]
    fn test_init_logging_twice_is_harmless() {
        init_logging(&LoggingConfig::default());
        init_logging(&LoggingConfig {
            level: "debug".to_string(),
            format: "pretty".to_string(),
        });
        tracing::info!("logging initialised");
    }
}
