//! Availability gate: platform, then bindings, then privilege level.
//!
//! The check itself never fails; it reports what the engine found so a
//! caller can decide what to attempt. Operations use [`require`] to turn a
//! missing prerequisite into the matching error.

use serde::Serialize;

use crate::error::Result;

#[cfg(not(windows))]
use crate::error::EngineError;
#[cfg(windows)]
use crate::{bindings, error::EngineError};

/// Snapshot of what the engine can do here, checked in order: the platform
/// has to be right before bindings matter, and bindings have to resolve
/// before elevation is worth reporting. `reason` carries the first failed
/// check's message.
#[derive(Debug, Clone, Serialize)]
pub struct Availability {
    pub platform_supported: bool,
    pub bindings_resolved: bool,
    pub elevated: bool,
    pub available: bool,
    pub reason: Option<String>,
}

pub fn check_availability() -> Availability {
    #[cfg(windows)]
    {
        let bindings_resolved = bindings::libraries_resolved();
        let elevated = is_elevated();
        let reason = if let Some(library) = bindings::missing_library() {
            Some(EngineError::BindingUnavailable { library }.to_string())
        } else if !elevated {
            Some(EngineError::PrivilegeRequired.to_string())
        } else {
            None
        };
        Availability {
            platform_supported: true,
            bindings_resolved,
            elevated,
            available: reason.is_none(),
            reason,
        }
    }
    #[cfg(not(windows))]
    {
        Availability {
            platform_supported: false,
            bindings_resolved: false,
            elevated: false,
            available: false,
            reason: Some(
                EngineError::PlatformUnsupported {
                    os: std::env::consts::OS,
                }
                .to_string(),
            ),
        }
    }
}

/// Gate run at the top of every operation. Platform and bindings are hard
/// prerequisites; elevation is not, since an unelevated caller can still
/// work on processes it owns. Privilege problems surface as
/// `PrivilegeRequired` when an open is actually denied.
pub fn require() -> Result<()> {
    #[cfg(windows)]
    {
        if let Some(library) = bindings::missing_library() {
            return Err(EngineError::BindingUnavailable { library });
        }
        Ok(())
    }
    #[cfg(not(windows))]
    {
        Err(EngineError::PlatformUnsupported {
            os: std::env::consts::OS,
        })
    }
}

/// Whether this process runs with an elevated token.
#[cfg(windows)]
pub fn is_elevated() -> bool {
    use std::mem;
    use std::ptr;

    use winapi::um::handleapi::CloseHandle;
    use winapi::um::processthreadsapi::{GetCurrentProcess, OpenProcessToken};
    use winapi::um::securitybaseapi::GetTokenInformation;
    use winapi::um::winnt::{TokenElevation, HANDLE, TOKEN_ELEVATION, TOKEN_QUERY};

    unsafe {
        let mut token: HANDLE = ptr::null_mut();
        if OpenProcessToken(GetCurrentProcess(), TOKEN_QUERY, &mut token) == 0 {
            return false;
        }

        let mut elevation: TOKEN_ELEVATION = mem::zeroed();
        let mut size = mem::size_of::<TOKEN_ELEVATION>() as u32;
        let ok = GetTokenInformation(
            token,
            TokenElevation,
            &mut elevation as *mut TOKEN_ELEVATION as *mut _,
            size,
            &mut size,
        );
        CloseHandle(token);

        ok != 0 && elevation.TokenIsElevated != 0
    }
}

#[cfg(not(windows))]
pub fn is_elevated() -> bool {
    false
}
