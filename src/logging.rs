//! Tracing subscriber bootstrap.
//!
//! `RUST_LOG` wins over the configured level. Initializing twice is a no-op,
//! as is initializing after some other subscriber was installed.

use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;

static INSTALLED_LEVEL: OnceCell<String> = OnceCell::new();

/// Install the global `fmt` subscriber filtered at `level`.
///
/// Returns the filter that is in effect: the one from the first call.
pub fn init(level: &str) -> &'static str {
    INSTALLED_LEVEL.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info")));
        let effective = filter.to_string();
        // Another subscriber may already be installed (e.g. by a test harness).
        let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(false).try_init();
        effective
    })
    .as_str()
}
