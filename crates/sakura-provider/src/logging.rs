//! Logging setup
//!
//! stdout belongs to the host protocol, so logs go to stderr, or to the file
//! named by `SAKURACLOUD_LOG_PATH`. Verbosity comes from `SAKURACLOUD_LOG`
//! (default `info`); the provider `trace_mode` adds debug output for API
//! calls.

use crate::config::Config;
use crate::error::{ConfigError, Result};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::Directive;

pub const LOG_ENV: &str = "SAKURACLOUD_LOG";
pub const LOG_PATH_ENV: &str = "SAKURACLOUD_LOG_PATH";

/// Extra directives for `trace_mode`
///
/// `api` traces provider-level calls, `http` traces the API clients, any
/// other non-empty value traces both.
pub fn trace_directives(trace_mode: &str) -> Vec<&'static str> {
    match trace_mode.to_lowercase().as_str() {
        "" => Vec::new(),
        "api" => vec!["sakura_provider=debug", "sakura_framework=debug"],
        "http" => vec!["sakura_api=debug"],
        _ => vec![
            "sakura_provider=debug",
            "sakura_framework=debug",
            "sakura_api=debug",
        ],
    }
}

/// Filter built from `SAKURACLOUD_LOG` and `trace_mode`
pub fn build_filter(env_value: Option<&str>, trace_mode: &str) -> Result<EnvFilter> {
    let base = env_value.filter(|v| !v.is_empty()).unwrap_or("info");
    let mut filter =
        EnvFilter::try_new(base).map_err(|e| ConfigError::Logging(format!("{}: {}", base, e)))?;
    for directive in trace_directives(trace_mode) {
        let parsed = directive
            .parse::<Directive>()
            .map_err(|e| ConfigError::Logging(format!("{}: {}", directive, e)))?;
        filter = filter.add_directive(parsed);
    }
    Ok(filter)
}

/// Install the global subscriber
///
/// Calling this twice is harmless; the second call keeps the first subscriber.
pub fn init_logging(config: &Config) -> Result<()> {
    let env_value = std::env::var(LOG_ENV).ok();
    let filter = build_filter(env_value.as_deref(), &config.trace_mode)?;

    let installed = match std::env::var(LOG_PATH_ENV) {
        Ok(path) if !path.is_empty() => {
            let file = OpenOptions::new().create(true).append(true).open(&path)?;
            tracing_subscriber::fmt()
                .with_writer(Mutex::new(file))
                .with_env_filter(filter)
                .with_ansi(false)
                .try_init()
        }
        _ => tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .with_ansi(false)
            .try_init(),
    };

    if let Err(e) = installed {
        tracing::debug!("Logging already initialized: {}", e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_directives() {
        assert!(trace_directives("").is_empty());
        assert_eq!(trace_directives("http"), vec!["sakura_api=debug"]);
        assert!(trace_directives("API").contains(&"sakura_provider=debug"));
        assert_eq!(trace_directives("all").len(), 3);
    }

    #[test]
    fn test_build_filter() {
        let filter = build_filter(None, "").unwrap();
        assert!(filter.to_string().contains("info"));

        let filter = build_filter(Some("warn"), "api").unwrap();
        let rendered = filter.to_string();
        assert!(rendered.contains("warn"));
        assert!(rendered.contains("sakura_provider=debug"));
    }

    #[test]
    fn test_invalid_filter_is_reported() {
        let err = build_filter(Some("sakura_api=loud"), "").unwrap_err();
        assert!(matches!(err, ConfigError::Logging(_)));
    }

    #[test]
    fn test_init_twice_is_ok() {
        let config = Config::default();
        assert!(init_logging(&config).is_ok());
        assert!(init_logging(&config).is_ok());
    }
}
