use tracing_subscriber::{fmt, EnvFilter};

/// `RUST_LOG` wins when set; otherwise filter at `log_level`.
pub fn get_log_env(log_level: String) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level))
}

/// Install a global fmt subscriber. Returns false if one was already set,
/// which happens when several tests in one binary ask for logging.
pub fn init_logging(log_level: String) -> bool {
    fmt()
        .with_env_filter(get_log_env(log_level))
        .with_target(true)
        .try_init()
        .is_ok()
}

pub fn global_info_logger() {
    init_logging("INFO".to_string());
}

pub fn global_debug_logger() {
    init_logging("DEBUG".to_string());
}

#[cfg(test)]
mod logging_tests {
    use super::*;

    #[test]
    fn second_init_is_a_no_op() {
        global_info_logger();
        assert!(!init_logging("DEBUG".to_string()));
    }
}
