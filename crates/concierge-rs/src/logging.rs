//! Subscriber setup shared by the `concierge` and `concierge-web` binaries.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Filter directive for a `-v` count when `RUST_LOG` is unset.
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn,concierge_rs=info,concierge_web=info",
        1 => "info,concierge_rs=debug,concierge_web=debug",
        2 => "debug",
        _ => "trace",
    }
}

/// Install a stderr `fmt` subscriber filtered by `RUST_LOG`, or by
/// [`default_directive`] when it is unset or invalid.
///
/// Returns `false` when a global subscriber was already installed.
pub fn init_logging(verbosity: u8) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbosity > 0),
        )
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_raises_level() {
        assert!(default_directive(0).starts_with("warn"));
        assert!(default_directive(1).contains("concierge_rs=debug"));
        assert_eq!(default_directive(2), "debug");
        assert_eq!(default_directive(9), "trace");
    }

    #[test]
    fn second_init_is_refused() {
        init_logging(0);
        assert!(!init_logging(0));
    }
}
