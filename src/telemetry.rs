use tracing_subscriber::EnvFilter;

/// Installs the global `tracing` subscriber, writing to stderr so stdout stays
/// free for reports. `RUST_LOG` wins over `default_filter`.
///
/// Calling this more than once is harmless; later calls are ignored.
pub fn init(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
