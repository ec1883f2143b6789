//! Logging utilities

pub use log::{debug, error, info, trace, warn, LevelFilter};

/// Initialize the logging system from `RUST_LOG`
pub fn init() {
    env_logger::init();
}

/// Initialize logging with a default level.
///
/// `RUST_LOG` still takes precedence when it is set. Calling this twice is
/// harmless; the second logger is rejected and reported at debug level.
pub fn init_with_level(level: LevelFilter) {
    let result = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .try_init();

    if let Err(e) = result {
        log::debug!("Logger already initialized: {}", e);
    }
}
