use std::sync::OnceLock;

static TRACING_INIT: OnceLock<()> = OnceLock::new();

#[allow(dead_code)]
pub fn init_test_tracing() {
    TRACING_INIT.get_or_init(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}
