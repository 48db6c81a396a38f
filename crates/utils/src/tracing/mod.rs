//! Diagnostic channel setup
//!
//! Diagnostics always go to stderr so stdout stays parseable by automation.
//! On a terminal they are rendered compactly for humans; otherwise each
//! event is one JSON object per line.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Re-export tracing macros for convenience
pub use ::tracing::{debug, error, info, trace, warn, Level};

/// Crates whose debug events are enabled by `--verbose`
const WORKSPACE_TARGETS: &[&str] = &[
    "ncli",
    "ncli_core",
    "ncli_config",
    "ncli_utils",
    "ncli_cache",
    "ncli_resolver",
];

/// Filter used when `RUST_LOG` is not set
pub fn default_directives(verbose: bool) -> String {
    if verbose {
        let mut directives = vec!["warn".to_string()];
        directives.extend(WORKSPACE_TARGETS.iter().map(|t| format!("{t}=debug")));
        directives.join(",")
    } else {
        // Resolver notices (e.g. container -> leaf ID conversion) stay visible
        "warn,ncli_resolver=info".to_string()
    }
}

/// Initialize the tracing system
pub fn init(verbose: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_directives(verbose))?,
    };

    if is_tty() {
        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .compact()
            .with_target(false)
            .with_level(true);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()?;
    } else {
        let json_layer = fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(false)
            .flatten_event(true)
            .with_target(true);

        tracing_subscriber::registry()
            .with(filter)
            .with(json_layer)
            .try_init()?;
    }

    Ok(())
}

/// Check if we're running in a TTY environment
fn is_tty() -> bool {
    std::io::IsTerminal::is_terminal(&std::io::stderr())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_enables_workspace_debug() {
        let directives = default_directives(true);
        assert!(directives.starts_with("warn"));
        assert!(directives.contains("ncli_cache=debug"));
        assert!(EnvFilter::try_new(&directives).is_ok());
    }

    #[test]
    fn test_quiet_keeps_resolver_notices() {
        let directives = default_directives(false);
        assert_eq!(directives, "warn,ncli_resolver=info");
        assert!(EnvFilter::try_new(&directives).is_ok());
    }
}
