pub use log::debug;

/// Log a debug message, or write it straight to stderr when a local debug target is selected
///
/// The first argument selects the local target (for instance, one phase group id given on the
/// command line), so that a single problem region can be traced without turning on debug output
/// for the whole run.
///
/// # Examples
///
/// ```ignore
/// debug_msg!(false, "Phase group {} split link {}", id, link); // logged at debug level only
/// debug_msg!(true, "Phase group {} split link {}", id, link); // always written to stderr
/// ```
macro_rules! debug_msg {
    ($flag:expr, $($arg:tt)+) => {
        if $flag {
            eprintln!($($arg)+);
        } else {
            $crate::log_utils::debug!($($arg)+);
        }
    }
}

pub(crate) use debug_msg;
