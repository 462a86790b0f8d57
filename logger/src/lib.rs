#![cfg_attr(not(test), no_std)]

use log::*;
pub use log;

struct Logger;

/// Output sink for log records, provided by whoever embeds the kernel crates
#[crate_interface::def_interface]
pub trait LogIf: Send + Sync {
    fn print_log(record: &Record);
}

impl log::Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            crate_interface::call_interface!(LogIf::print_log(record));
        }
    }

    fn flush(&self) {}
}

/// Install the logger with the given max level.
///
/// Fails if a logger was already installed; the level is still updated.
pub fn init_logger(level: LevelFilter) -> Result<(), SetLoggerError> {
    let res = log::set_logger(&Logger);
    log::set_max_level(level);
    res
}

/// Emit at `$level` if it is no more verbose than the calling module's `MODULE_LEVEL`
#[doc(hidden)]
#[macro_export]
macro_rules! __module_log {
    ($level:expr, target: $target:expr, $($arg:tt)+) => {
        if $level <= MODULE_LEVEL {
            $crate::log::log!(target: $target, $level, $($arg)+)
        }
    };
    ($level:expr, $($arg:tt)+) => {
        if $level <= MODULE_LEVEL {
            $crate::log::log!($level, $($arg)+)
        }
    };
}

///
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)+) => { $crate::__module_log!($crate::log::Level::Error, $($arg)+) };
}
///
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)+) => { $crate::__module_log!($crate::log::Level::Warn, $($arg)+) };
}
///
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)+) => { $crate::__module_log!($crate::log::Level::Info, $($arg)+) };
}
///
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)+) => { $crate::__module_log!($crate::log::Level::Debug, $($arg)+) };
}
///
#[macro_export]
macro_rules! log_trace {
    ($($arg:tt)+) => { $crate::__module_log!($crate::log::Level::Trace, $($arg)+) };
}
