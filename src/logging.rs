use std::thread;

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Install the global subscriber. Diagnostics go to stderr; stdout carries the trace stream.
pub fn init(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_thread_names(true)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::warn!("tracing subscriber already installed");
    }
}

pub fn dev_log(message: &str) {
    if !cfg!(debug_assertions) {
        return;
    }

    let current = thread::current();
    let thread_name = current.name().unwrap_or("unnamed");
    tracing::debug!(thread = thread_name, "{message}");
}

#[macro_export]
macro_rules! log_dev {
    ($($arg:tt)*) => {
        if cfg!(debug_assertions) {
            $crate::logging::dev_log(&format!($($arg)*));
        }
    };
}
