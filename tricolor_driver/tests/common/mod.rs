use std::sync::OnceLock;

#[allow(dead_code)]
pub fn init_test_logger() {
    static INIT: OnceLock<()> = OnceLock::new();
    let _ = INIT.get_or_init(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Assert that a condition holds, with detailed error message
#[macro_export]
macro_rules! assert_with_context {
    ($cond:expr, $context:expr) => {
        if !$cond {
            panic!(
                "Assertion failed: {}\nContext: {}",
                stringify!($cond),
                $context
            );
        }
    };
}
