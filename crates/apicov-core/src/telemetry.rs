use crate::LoggingConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level. Calling this more than once
/// (e.g. from several test binaries sharing a helper) leaves the first
/// subscriber in place and returns `false`.
pub fn init_tracing(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("apicov={lvl},{lvl}", lvl = config.level)));

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match config.format.as_str() {
        "compact" => registry
            .with(tracing_subscriber::fmt::layer().compact())
            .try_init(),
        _ => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init(),
    };
    installed.is_ok()
}
