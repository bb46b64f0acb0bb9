//! Process-wide `tracing` subscriber.
//!
//! Events go to stderr so stdout stays free for embedding hosts. The
//! subscriber is installed once per process; later calls to [`initialise`]
//! report the settings already in force instead of failing.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use tracing::subscriber::SetGlobalDefaultError;
use tracing::{Subscriber, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::{self, time::UtcTime};

use scenebridge_config::{Config, LogFormat};

const TELEMETRY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::telemetry");

static INSTALLED: OnceCell<TelemetrySettings> = OnceCell::new();

#[derive(Debug, Clone)]
struct TelemetrySettings {
    filter: String,
    format: LogFormat,
}

/// Describes the subscriber in force.
#[derive(Debug, Clone)]
pub struct TelemetryHandle {
    settings: TelemetrySettings,
    installed_now: bool,
}

impl TelemetryHandle {
    /// Filter expression the subscriber was built with.
    #[must_use]
    pub fn filter(&self) -> &str {
        &self.settings.filter
    }

    /// Output format in force.
    #[must_use]
    pub const fn format(&self) -> LogFormat {
        self.settings.format
    }

    /// Returns true for the call that installed the subscriber.
    #[must_use]
    pub const fn installed_now(&self) -> bool {
        self.installed_now
    }
}

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The configured filter expression does not parse.
    #[error("invalid log filter '{filter}': {message}")]
    Filter {
        /// Rejected expression.
        filter: String,
        /// Parser diagnostic.
        message: String,
    },
    /// Another global subscriber was installed outside this module.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(#[source] SetGlobalDefaultError),
}

/// Installs the global subscriber on first use.
///
/// # Errors
///
/// Returns [`TelemetryError`] when the filter does not parse or a foreign
/// subscriber already owns the global slot.
pub fn initialise(config: &Config) -> Result<TelemetryHandle, TelemetryError> {
    let mut installed_now = false;
    let settings = INSTALLED.get_or_try_init(|| {
        let settings = TelemetrySettings {
            filter: config.log_filter().to_owned(),
            format: config.log_format(),
        };
        let subscriber = build_subscriber(&settings)?;
        tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)?;
        installed_now = true;
        Ok::<_, TelemetryError>(settings)
    })?;
    if installed_now {
        info!(
            target: TELEMETRY_TARGET,
            filter = %settings.filter,
            format = %settings.format,
            "telemetry installed"
        );
    }
    Ok(TelemetryHandle {
        settings: settings.clone(),
        installed_now,
    })
}

fn parse_filter(expression: &str) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(expression).map_err(|error| TelemetryError::Filter {
        filter: expression.to_owned(),
        message: error.to_string(),
    })
}

fn build_subscriber(
    settings: &TelemetrySettings,
) -> Result<Box<dyn Subscriber + Send + Sync>, TelemetryError> {
    let builder = fmt::Subscriber::builder()
        .with_env_filter(parse_filter(&settings.filter)?)
        .with_target(true)
        .with_thread_names(true)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_timer(UtcTime::rfc_3339());

    if settings.format.is_structured() {
        Ok(Box::new(builder.json().flatten_event(true).finish()))
    } else {
        Ok(Box::new(builder.compact().finish()))
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("info")]
    #[case("scenebridged::transport=debug,warn")]
    fn valid_filters_parse(#[case] expression: &str) {
        assert!(parse_filter(expression).is_ok());
    }

    #[test]
    fn invalid_filter_names_the_expression() {
        let error = parse_filter("scenebridged=loud").expect_err("bad level");
        assert!(error.to_string().contains("'scenebridged=loud'"));
    }

    #[test]
    fn repeated_initialisation_reports_existing_settings() {
        let config = Config::default();
        let first = initialise(&config).expect("first initialise");
        let second = initialise(&config).expect("second initialise");
        assert!(!second.installed_now());
        assert_eq!(first.filter(), second.filter());
        assert_eq!(first.format(), second.format());
    }
}
