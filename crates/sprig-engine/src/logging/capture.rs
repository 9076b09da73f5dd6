//! Test logger that records per thread, so parallel tests see only their own
//! records.

use std::cell::RefCell;
use std::sync::Once;

struct Capture;

thread_local! {
    static RECORDS: RefCell<Vec<(log::Level, String)>> = const { RefCell::new(Vec::new()) };
}

impl log::Log for Capture {
    fn enabled(&self, _: &log::Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &log::Record<'_>) {
        RECORDS.with(|r| {
            r.borrow_mut()
                .push((record.level(), record.args().to_string()))
        });
    }

    fn flush(&self) {}
}

static CAPTURE: Capture = Capture;

/// Installs the capturing logger for the whole test binary.
pub(crate) fn install() {
    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        if log::set_logger(&CAPTURE).is_ok() {
            log::set_max_level(log::LevelFilter::Trace);
        }
    });
}

/// Drains the records logged on this thread.
pub(crate) fn take() -> Vec<(log::Level, String)> {
    RECORDS.with(|r| std::mem::take(&mut *r.borrow_mut()))
}

/// Drains this thread's records at `warn` or above.
pub(crate) fn take_warnings() -> Vec<(log::Level, String)> {
    take()
        .into_iter()
        .filter(|(level, _)| *level <= log::Level::Warn)
        .collect()
}
