//! Tracing initialisation shared by the caseflow binaries.
//!
//! Filter precedence: the `CASEFLOW_LOG` environment variable wins, then
//! the conventional `RUST_LOG`, then the level passed by the caller. The
//! global subscriber can only be installed once per process, so repeated
//! calls are silently ignored rather than erroring.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable consulted before `RUST_LOG`.
pub const LOG_ENV_VAR: &str = "CASEFLOW_LOG";

/// Install the global tracing subscriber.
///
/// `json` switches the format layer to newline-delimited JSON for log
/// aggregation; `level` is the default verbosity when neither
/// `CASEFLOW_LOG` nor `RUST_LOG` is set.
pub fn init_tracing(json: bool, level: Level) {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().with_target(false).json())
            .try_init()
            .ok();
    } else {
        registry
            .with(fmt::layer().with_target(false))
            .try_init()
            .ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_is_safe() {
        init_tracing(false, Level::INFO);
        init_tracing(true, Level::DEBUG);
    }
}
