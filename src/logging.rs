use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "PATCHSTACK_LOG";

/// Installs a compact stderr subscriber filtered by `$PATCHSTACK_LOG` (default `warn`), so
/// stdout stays clean for `--json`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}
