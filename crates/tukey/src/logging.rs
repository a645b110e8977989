//! Tracing subscriber setup.

use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static INIT: Once = Once::new();

/// Environment variable holding the log filter, e.g. `TUKEY_LOG=tukey::outlier=debug`.
pub const LOG_ENV: &str = "TUKEY_LOG";

/// Initialize logging with the `tukey=info` default.
///
/// Only the first call has an effect.
pub fn init_tracing() {
    init_tracing_with("tukey=info", false);
}

/// Initialize logging with a fallback filter used when `TUKEY_LOG` is unset
/// or invalid. `json` switches to one JSON object per event.
///
/// Events go to stderr so that tables written to stdout stay clean.
pub fn init_tracing_with(default_filter: &str, json: bool) {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_filter));

        let text = (!json).then(|| {
            fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
        });
        let structured = json.then(|| {
            fmt::layer()
                .json()
                .with_target(true)
                .with_writer(std::io::stderr)
        });

        // a subscriber installed elsewhere (tests, host application) wins
        let _ = tracing_subscriber::registry()
            .with(text)
            .with(structured)
            .with(filter)
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init_tracing();
        init_tracing_with("tukey=debug", true);
        tracing::info!("logging initialized");
    }
}
