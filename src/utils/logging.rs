use tracing::Level;

/// Initialize the global tracing subscriber.
///
/// Unknown level strings fall back to `info`. Uses `try_init` so the
/// binary and tests can both call this without panicking on a second
/// initialization.
pub fn init(default_level: &str) {
    let level = match default_level.to_lowercase().as_str() {
        "error" => Level::ERROR,
        "warn" | "warning" => Level::WARN,
        "debug" => Level::DEBUG,
        "trace" => Level::TRACE,
        _ => Level::INFO,
    };

    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init();
}
