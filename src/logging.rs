//! Structured logging initialization for the layout designer.
//!
//! Compact text for people, JSON lines when the CLI runs in robot mode.

use std::io::{self, IsTerminal};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Default filter directive for the given verbosity flags.
///
/// `RUST_LOG` takes precedence when set.
pub fn default_directive(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        return "cld=error";
    }
    match verbose {
        0 => "cld=info,tower_http=warn",
        1 => "cld=debug,tower_http=debug",
        _ => "cld=trace,tower_http=trace",
    }
}

/// Initialize the tracing subscriber based on CLI flags and environment.
///
/// JSON lines in robot mode, otherwise compact text, colored only when
/// stderr is a terminal. All output goes to stderr.
pub fn init_logging(json: bool, verbose: u8, quiet: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose, quiet)));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_span_events(FmtSpan::NONE)
                    .with_writer(io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .compact()
                    .with_ansi(io::stderr().is_terminal())
                    .with_target(verbose > 0)
                    .with_writer(io::stderr),
            )
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The global subscriber can only be installed once per process, so
    // these tests only check the directives themselves.

    #[test]
    fn test_default_directives_parse() {
        for verbose in 0..3 {
            assert!(EnvFilter::try_new(default_directive(verbose, false)).is_ok());
        }
        assert!(EnvFilter::try_new(default_directive(0, true)).is_ok());
    }

    #[test]
    fn test_quiet_wins_over_verbose() {
        assert_eq!(default_directive(2, true), "cld=error");
        assert!(default_directive(1, false).starts_with("cld=debug"));
    }
}
