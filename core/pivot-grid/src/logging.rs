//! FILENAME: core/pivot-grid/src/logging.rs
// PURPOSE: Category logging macros on top of the `log` facade.
//
// Lines read `<category>|<message>`; the category becomes the log target so
// hosts can filter pivot output. The crate never installs a logger.

/// Log category for everything the pivot engine emits.
pub const PIVOT: &str = "PIVOT";

macro_rules! log_debug {
    ($cat:expr, $($arg:tt)*) => {
        ::log::debug!(target: $cat, $($arg)*)
    };
}

macro_rules! log_info {
    ($cat:expr, $($arg:tt)*) => {
        ::log::info!(target: $cat, $($arg)*)
    };
}

macro_rules! log_warn {
    ($cat:expr, $($arg:tt)*) => {
        ::log::warn!(target: $cat, $($arg)*)
    };
}

// ENTER/EXIT macros for function tracing

macro_rules! log_enter {
    ($cat:expr, $func:expr) => {
        ::log::debug!(target: $cat, "ENTER {}", $func)
    };
    ($cat:expr, $func:expr, $($arg:tt)*) => {
        ::log::debug!(target: $cat, "ENTER {} {}", $func, format_args!($($arg)*))
    };
}

macro_rules! log_exit {
    ($cat:expr, $func:expr) => {
        ::log::debug!(target: $cat, "EXIT {}", $func)
    };
    ($cat:expr, $func:expr, $($arg:tt)*) => {
        ::log::debug!(target: $cat, "EXIT {} {}", $func, format_args!($($arg)*))
    };
}

pub(crate) use log_debug;
pub(crate) use log_enter;
pub(crate) use log_exit;
pub(crate) use log_info;
pub(crate) use log_warn;
