use ghostwire_pipeline::LoggingConfig;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Crates whose debug output `--verbose` turns on
pub const VERBOSE_TARGETS: [&str; 6] = [
    "ghostwire",
    "ghostwire_bus",
    "ghostwire_core",
    "ghostwire_telemetry",
    "ghostwire_pipeline",
    "ghostwire_cli",
];

/// Filter directive for a config and the `--verbose` flag
///
/// `RUST_LOG` wins over both when set.
#[must_use]
pub fn filter_directive(config: &LoggingConfig, verbose: bool) -> String {
    if verbose {
        VERBOSE_TARGETS
            .iter()
            .map(|target| format!("{target}=debug"))
            .collect::<Vec<_>>()
            .join(",")
    } else {
        config.level.clone()
    }
}

/// Install the global subscriber; logs go to stderr so stdout stays a report
pub fn init(config: &LoggingConfig, verbose: bool, json_override: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(config, verbose)));
    let json = json_override || config.json;

    let text_layer = (!json).then(|| {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
    });
    let json_layer = json.then(|| fmt::layer().json().with_writer(std::io::stderr));

    // Ignore a second init (tests); the first subscriber stays active
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(text_layer)
        .with(json_layer)
        .try_init();
}
