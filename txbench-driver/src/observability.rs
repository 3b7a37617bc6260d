//! Logging setup for the driver binary.

use std::env;

use tracing::Level;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, prelude::*};

/// Installs the global tracing subscriber, logging to stderr.
///
/// `RUST_LOG` is either a plain level such as `debug`, which is applied to the txbench crates, or
/// a full filter directive that is used as-is.
pub fn init_tracing() {
    let (level, env_filter) = parse_rust_log();
    let format = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);

    tracing_subscriber::registry()
        .with(format.with_filter(LevelFilter::from(level)))
        .with(env_filter)
        .init();
}

/// Parses `RUST_LOG` into the maximum level and the filter for individual targets.
pub fn parse_rust_log() -> (Level, EnvFilter) {
    let level = match env::var(EnvFilter::DEFAULT_ENV) {
        Ok(value) => match value.parse::<Level>() {
            Ok(level) => level,
            Err(_) => return (Level::TRACE, EnvFilter::new(value)),
        },
        Err(_) => Level::INFO,
    };

    // This is the maximum verbosity that will be logged, we filter this down to `level`.
    let env_filter = EnvFilter::new(
        "INFO,\
        txbench=TRACE,\
        txbench_driver=TRACE,\
        txbench_workload=TRACE,\
        ",
    );

    (level, env_filter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_level_keeps_default_filter() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("RUST_LOG", "debug");
            let (level, filter) = parse_rust_log();
            assert_eq!(level, Level::DEBUG);
            assert!(filter.to_string().contains("txbench_workload=trace"));
            Ok(())
        });
    }

    #[test]
    fn directives_are_used_as_is() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("RUST_LOG", "txbench_driver=warn");
            let (level, filter) = parse_rust_log();
            assert_eq!(level, Level::TRACE);
            assert_eq!(filter.to_string(), "txbench_driver=warn");
            Ok(())
        });
    }
}
