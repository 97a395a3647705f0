//! provides logging helpers

use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::layer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry;

/// Directives used when `RUST_LOG` is unset: the operator at `info`, while the HTTP
/// stack below the Kubernetes client stays quiet.
pub const DEFAULT_DIRECTIVES: &str = "info,hyper=warn,tower=warn,rustls=warn";

/// initiate the global tracing subscriber
///
/// `RUST_LOG` replaces [`DEFAULT_DIRECTIVES`] entirely, e.g.
/// `RUST_LOG=redpanda_operator=debug,kube=warn`. Color is disabled when `NO_COLOR` is set.
pub fn init() {
    let env_filter = env_filter(std::env::var("RUST_LOG").ok().as_deref());

    let fmt_layer = layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_ansi(std::env::var_os("NO_COLOR").is_none())
        .with_filter(env_filter);

    registry().with(fmt_layer).init();
}

fn env_filter(rust_log: Option<&str>) -> EnvFilter {
    match rust_log {
        Some(directives) if !directives.trim().is_empty() => EnvFilter::new(directives),
        _ => EnvFilter::new(DEFAULT_DIRECTIVES),
    }
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;
    use tracing_subscriber::filter::LevelFilter;

    use super::*;

    #[test]
    fn defaults_to_info() {
        assert_eq!(env_filter(None).max_level_hint(), Some(LevelFilter::INFO));
        assert_eq!(env_filter(Some("  ")).max_level_hint(), Some(LevelFilter::INFO));
    }

    #[test]
    fn rust_log_overrides_defaults() {
        assert_eq!(
            env_filter(Some("redpanda_operator=debug")).max_level_hint(),
            Some(LevelFilter::DEBUG)
        );
    }
}
