use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the process wide subscriber; `RUST_LOG` wins over `default_directive`.
///
/// Calling it twice is harmless, the second install is ignored.
pub fn init_logging(default_directive: &str) {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_directive.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init();
}
