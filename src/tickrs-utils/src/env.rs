//! Compile-time configuration from environment variables.
//!
//! The macros defined here evaluate to a constant parsed from an environment
//! variable present at build time, or to a default. A value that cannot be
//! parsed, or that is not below an optional exclusive bound, fails the build
//! instead of silently falling back.
//!
//! ```
//! const TASKS_NUMOF: usize = tickrs_utils::usize_from_env_or!("TICKRS_TASKS_NUMOF", 8);
//! const POOL_SIZE: usize = tickrs_utils::usize_from_env_or!("TICKRS_POOL", 8, below 255);
//! assert!(TASKS_NUMOF > 0 && POOL_SIZE < 255);
//! ```

pub use {const_panic, konst};

#[doc(hidden)]
#[macro_export]
macro_rules! __parse_env_or {
    ($parse_fn_name:ident, $output_type_name:literal, $env_var:literal, $default:expr) => {
        match option_env!($env_var) {
            Some(str_value) => match $crate::env::konst::primitive::$parse_fn_name(str_value) {
                Ok(value) => value,
                Err(_) => $crate::env::const_panic::concat_panic!(
                    "Could not parse environment variable `",
                    $env_var,
                    "=",
                    str_value,
                    "` as ",
                    $output_type_name,
                ),
            },
            None => $default,
        }
    };
}

macro_rules! define_env_with_default_macro {
    ($macro_name:ident, $parse_fn_name:ident, $output_type:ty, $output_type_name:literal) => {
        #[macro_export]
        macro_rules! $macro_name {
            ($env_var:literal, $default:expr) => {
                $crate::__parse_env_or!($parse_fn_name, $output_type_name, $env_var, $default)
            };
            ($env_var:literal, $default:expr, below $bound:expr) => {{
                let value: $output_type =
                    $crate::__parse_env_or!($parse_fn_name, $output_type_name, $env_var, $default);
                let bound: $output_type = $bound;
                if value >= bound {
                    $crate::env::const_panic::concat_panic!(
                        "Environment variable `",
                        $env_var,
                        "` (or its default) must be below ",
                        bound,
                        ", got ",
                        value,
                    );
                }
                value
            }};
        }
    };
}

define_env_with_default_macro!(usize_from_env_or, parse_usize, usize, "a usize");
define_env_with_default_macro!(u32_from_env_or, parse_u32, u32, "a u32");
