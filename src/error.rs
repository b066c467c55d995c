//! Centralized error handling for the memory engine.
//!
//! A single [`EngineError`] enum built on `thiserror` covers availability-gate
//! failures, OS-level access failures, and boundary argument problems.
//! Enumeration-style operations prefer partial results over surfacing one of
//! these for a single bad region or module.

use std::fmt;

/// A convenience alias for `Result<T, EngineError>`.
pub type Result<T> = std::result::Result<T, EngineError>;

/// The step of an injection that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectionStage {
    ResolveEntryPoint,
    Allocate,
    Write,
    Protect,
    CreateThread,
}

impl InjectionStage {
    pub fn as_str(self) -> &'static str {
        match self {
            InjectionStage::ResolveEntryPoint => "resolve-entry-point",
            InjectionStage::Allocate => "allocate",
            InjectionStage::Write => "write",
            InjectionStage::Protect => "protect",
            InjectionStage::CreateThread => "create-thread",
        }
    }
}

impl fmt::Display for InjectionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The exhaustive list of failure modes for engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The host platform is not Windows; no OS call was attempted.
    #[error("platform '{os}' is not supported; this engine requires Windows")]
    PlatformUnsupported { os: &'static str },

    /// The syscall binding layer could not load its primary library.
    #[error("syscall binding unavailable: '{library}' could not be loaded")]
    BindingUnavailable { library: &'static str },

    /// The current process token is not elevated.
    #[error("administrator privileges are required for this operation")]
    PrivilegeRequired,

    /// The target process could not be opened with the requested rights.
    #[error("failed to open process {pid} (os error {code})")]
    ProcessOpen { pid: u32, code: u32 },

    /// A read or write transferred fewer bytes than requested, or failed outright.
    #[error("memory access failed at {address:#X} for {size} bytes (os error {code})")]
    MemoryAccess { address: u64, size: usize, code: u32 },

    /// A page protection change was rejected.
    #[error("protection change failed at {address:#X} (os error {code})")]
    ProtectionChange { address: u64, code: u32 },

    /// The pattern text decoded to zero bytes, or could not be decoded at all.
    #[error("invalid pattern: {0}")]
    InvalidPattern(String),

    /// A specific injection step failed; earlier steps are not rolled back.
    #[error("injection failed at stage '{stage}' (os error {code})")]
    Injection { stage: InjectionStage, code: u32 },

    /// The debug-port information query returned a non-success status.
    #[error("debug port query failed with status {status:#X}")]
    Probe { status: i32 },

    /// A raw Win32 call failure not covered by a more specific variant.
    #[error("Win32 API '{0}' failed with error code {1}")]
    Win32(&'static str, u32),

    /// A boundary argument failed to parse or validate.
    #[error("validation error: {0}")]
    Validation(String),
}
