//! Panic hook for crash reporting

use backtrace::Backtrace;
use chrono::Local;
use std::panic::PanicHookInfo;
use std::path::PathBuf;

/// Where crash dumps are written
pub fn crash_dir() -> PathBuf {
    super::data_dir().join("crashes")
}

/// Replace the default panic output with a logged report and a dump file.
///
/// Panics caught further up (preload jobs, decoders) are reported too.
pub fn init_panic_hook() {
    std::panic::set_hook(Box::new(panic_handler));
    tracing::debug!("Panic hook initialized");
}

fn panic_handler(info: &PanicHookInfo) {
    let backtrace = Backtrace::new();
    let thread = std::thread::current();
    let thread_name = thread.name().unwrap_or("<unnamed>");

    let report = format!(
        "=== PANIC ===\n\
         Timestamp: {}\n\
         Thread: {}\n\
         Location: {}\n\
         Message: {}\n\n\
         Stack Trace:\n{:?}",
        Local::now().to_rfc3339(),
        thread_name,
        info.location().map(|l| l.to_string()).unwrap_or_else(|| "<unknown>".into()),
        payload_message(info),
        backtrace
    );

    eprintln!("{}", report);
    tracing::error!("{}", report);

    let dir = crash_dir();
    let dump_path = dir.join(format!("lumen_crash_{}.txt", Local::now().format("%Y%m%d_%H%M%S")));

    if let Err(e) = std::fs::create_dir_all(&dir).and_then(|_| std::fs::write(&dump_path, &report)) {
        eprintln!("Failed to write crash dump: {}", e);
    }
}

fn payload_message(info: &PanicHookInfo) -> String {
    let payload = info.payload();
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "<non-string payload>".into())
}
