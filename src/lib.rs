//! MemProbe - Windows Cross-Process Memory Engine
//!
//! Utilities for inspecting and manipulating another process's address
//! space: region walking, pattern scanning, read/write/protect primitives,
//! module enumeration, code injection and debugger probing.

#![allow(non_snake_case, non_camel_case_types, non_upper_case_globals)]

mod config;
pub mod nt;
pub mod error;
pub mod encoding;
pub mod pattern;
pub mod regions;
pub mod availability;
pub mod engine;

#[cfg(windows)]
pub mod bindings;
#[cfg(windows)]
pub mod process;
#[cfg(windows)]
pub mod memory;
#[cfg(windows)]
pub mod scan;
#[cfg(windows)]
pub mod modules;
#[cfg(windows)]
pub mod inject;
#[cfg(windows)]
pub mod probe;

#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)*) => {{
        if $crate::config::should_log() {
            println!($($arg)*);
        }
    }};
}

pub use error::{EngineError, Result};
pub use nt::nt_success;
