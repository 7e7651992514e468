use std::sync::Once;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Installs the global `tracing` subscriber. `RUST_LOG` wins over `default_filter`.
pub fn init_instrumentation(default_filter: &str) {
    INIT.call_once(|| {
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new(default_filter)),
            )
            .with_target(false)
            .with_thread_ids(true)
            .with_level(true)
            .with_writer(std::io::stderr)
            .finish();

        // Failing to install logging at start-up should stop the binary immediately
        #[allow(clippy::expect_used)]
        tracing::subscriber::set_global_default(subscriber)
            .expect("Failed to set tracing subscriber");
    });
}
