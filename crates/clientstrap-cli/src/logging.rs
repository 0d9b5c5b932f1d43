//! Log setup. `CLIENTSTRAP_LOG` takes `EnvFilter` directives and wins over the
//! `is-debug` input.

use tracing_subscriber::{fmt, EnvFilter};

pub const LOG_ENV: &str = "CLIENTSTRAP_LOG";

pub fn init(debug: bool) {
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_directive(debug)));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

pub fn default_directive(debug: bool) -> &'static str {
    if debug {
        "debug"
    } else {
        "info"
    }
}
