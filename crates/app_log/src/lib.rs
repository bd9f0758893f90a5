//! Lumen logging and crash reporting
//!
//! Console and rolling JSON file logging, a crash-dump panic hook and, in
//! debug builds, a parking_lot deadlock watchdog.

mod logging;
mod panic_hook;

pub use logging::{cleanup_old_logs, init_logging, LogGuard};
pub use panic_hook::{crash_dir, init_panic_hook};

use directories::ProjectDirs;
use std::path::PathBuf;

/// Per-user data directory shared by logs, crash dumps and statistics
pub fn data_dir() -> PathBuf {
    ProjectDirs::from("com", "Lumen", "Lumen")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Directory holding the daily log files
pub fn log_dir() -> PathBuf {
    data_dir().join("logs")
}

/// Install logging, the panic hook and (debug builds) the deadlock watchdog.
///
/// The returned guard flushes the file writer on drop; keep it alive for
/// the life of the process.
pub fn init() -> anyhow::Result<LogGuard> {
    let guard = init_logging()?;
    init_panic_hook();

    #[cfg(debug_assertions)]
    init_deadlock_detector();

    Ok(guard)
}

#[cfg(debug_assertions)]
fn init_deadlock_detector() {
    use std::thread;
    use std::time::Duration;

    let spawned = thread::Builder::new()
        .name("deadlock-watchdog".into())
        .spawn(|| loop {
            thread::sleep(Duration::from_secs(10));

            let deadlocks = parking_lot::deadlock::check_deadlock();
            if deadlocks.is_empty() {
                continue;
            }

            tracing::error!("{} deadlock(s) detected", deadlocks.len());
            for (i, threads) in deadlocks.iter().enumerate() {
                for t in threads {
                    tracing::error!("Deadlock #{} thread {:?}\n{:?}", i, t.thread_id(), t.backtrace());
                }
            }
        });

    if let Err(e) = spawned {
        tracing::warn!("Deadlock watchdog not started: {}", e);
    }
}
