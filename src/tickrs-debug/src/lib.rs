//! Debug console and logging for tickrs.
//!
//! `print!`/`println!` go to the debug console when the `debug-console`
//! feature is enabled and compile to nothing otherwise. The macros in [`log`]
//! forward to `defmt` or to the `log` facade, depending on the enabled
//! feature, and are no-ops when neither is.
//!
//! Nothing here may be called from interrupt context except the `log` macros
//! at trace level.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

#[cfg(all(feature = "defmt", feature = "log"))]
compile_error!("feature \"defmt\" and feature \"log\" cannot be enabled at the same time");

#[cfg(all(feature = "debug-console", feature = "rtt-target", target_arch = "arm", target_os = "none"))]
mod backend {
    pub use rtt_target::{rprint as print, rprintln as println};

    pub fn init() {
        use rtt_target::ChannelMode::NoBlockTrim;

        rtt_target::rtt_init_print!(NoBlockTrim);
    }
}

#[cfg(all(
    feature = "debug-console",
    any(test, feature = "std"),
    not(all(feature = "rtt-target", target_arch = "arm", target_os = "none"))
))]
mod backend {
    pub use std::{print, println};

    pub fn init() {}
}

#[cfg(not(all(
    feature = "debug-console",
    any(all(feature = "rtt-target", target_arch = "arm", target_os = "none"), test, feature = "std")
)))]
mod backend {
    pub fn init() {}

    #[macro_export]
    macro_rules! nop_println {
        ($($arg:tt)*) => {{
            let _ = ($($arg)*);
        }};
    }

    #[macro_export]
    macro_rules! nop_print {
        ($($arg:tt)*) => {{
            let _ = ($($arg)*);
        }};
    }

    pub use nop_print as print;
    pub use nop_println as println;
}

pub use backend::*;

#[cfg(feature = "defmt")]
pub mod log {
    pub use defmt;

    #[macro_export]
    macro_rules! __trace {
        ($($arg:tt)*) => {{
            use $crate::log::defmt;
            defmt::trace!($($arg)*);
        }};
    }

    #[macro_export]
    macro_rules! __debug {
        ($($arg:tt)*) => {{
            use $crate::log::defmt;
            defmt::debug!($($arg)*);
        }};
    }

    #[macro_export]
    macro_rules! __info {
        ($($arg:tt)*) => {{
            use $crate::log::defmt;
            defmt::info!($($arg)*);
        }};
    }

    #[macro_export]
    macro_rules! __warn {
        ($($arg:tt)*) => {{
            use $crate::log::defmt;
            defmt::warn!($($arg)*);
        }};
    }

    #[macro_export]
    macro_rules! __error {
        ($($arg:tt)*) => {{
            use $crate::log::defmt;
            defmt::error!($($arg)*);
        }};
    }

    pub use __debug as debug;
    pub use __error as error;
    pub use __info as info;
    pub use __trace as trace;
    pub use __warn as warn;
}

#[cfg(feature = "log")]
pub mod log {
    #[doc(hidden)]
    pub use log as facade;

    #[macro_export]
    macro_rules! __trace {
        ($($arg:tt)*) => { $crate::log::facade::trace!($($arg)*) };
    }

    #[macro_export]
    macro_rules! __debug {
        ($($arg:tt)*) => { $crate::log::facade::debug!($($arg)*) };
    }

    #[macro_export]
    macro_rules! __info {
        ($($arg:tt)*) => { $crate::log::facade::info!($($arg)*) };
    }

    #[macro_export]
    macro_rules! __warn {
        ($($arg:tt)*) => { $crate::log::facade::warn!($($arg)*) };
    }

    #[macro_export]
    macro_rules! __error {
        ($($arg:tt)*) => { $crate::log::facade::error!($($arg)*) };
    }

    pub use __debug as debug;
    pub use __error as error;
    pub use __info as info;
    pub use __trace as trace;
    pub use __warn as warn;
}

#[cfg(not(any(feature = "defmt", feature = "log")))]
pub mod log {
    #[macro_export]
    macro_rules! __stub {
        ($($arg:tt)*) => {{
            let _ = ($($arg)*); // Do nothing
        }};
    }

    pub use __stub as debug;
    pub use __stub as error;
    pub use __stub as info;
    pub use __stub as trace;
    pub use __stub as warn;
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_log_macros_accept_format_args() {
        let slot = 3u8;
        crate::log::info!("task {} created", slot);
        crate::log::warn!("no slot left");
        crate::println!("console {}", slot);
    }
}
