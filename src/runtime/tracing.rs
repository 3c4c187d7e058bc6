use tracing_subscriber::EnvFilter;

/// Initializes the tracing/logging infrastructure for the binary.
///
/// Logs go to stderr so that command results on stdout stay machine-readable.
///
/// # Environment Variables
///
/// `RUST_LOG` takes precedence when set:
/// - `RUST_LOG=debug` - Show debug and above, including HTTP internals
/// - `RUST_LOG=reconcile_framework=trace` - Trace only the engine
///
/// Without it, this crate and the engine log at `info` (`debug` when `verbose`) and
/// everything else at `warn`.
pub fn setup_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("warn,ldsync={level},reconcile_framework={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
