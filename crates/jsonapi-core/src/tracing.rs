/// Initializes structured logging.
///
/// Verbosity follows `RUST_LOG`, e.g. `RUST_LOG=jsonapi_core=debug` shows hook
/// firing and storage calls. Calling it twice is a no-op.
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .compact()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .ok();
}
