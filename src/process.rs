//! Process handle acquisition with scoped release.

use crate::availability;
use crate::bindings;
use crate::error::{EngineError, Result};
use crate::nt::{
    HANDLE, PROCESS_CREATE_THREAD, PROCESS_QUERY_INFORMATION, PROCESS_VM_OPERATION,
    PROCESS_VM_READ, PROCESS_VM_WRITE,
};

const ERROR_ACCESS_DENIED: u32 = 5;

/// Access mask for operations that only inspect the target.
pub const READ_ACCESS: u32 = PROCESS_QUERY_INFORMATION | PROCESS_VM_READ;

/// Access mask for operations that mutate the target. Thread creation rides
/// along so injection can use the same handle.
pub const WRITE_ACCESS: u32 = PROCESS_QUERY_INFORMATION
    | PROCESS_VM_READ
    | PROCESS_VM_WRITE
    | PROCESS_VM_OPERATION
    | PROCESS_CREATE_THREAD;

/// Owned process handle, closed when the guard drops.
pub struct ProcessGuard {
    handle: HANDLE,
    pid: u32,
}

impl ProcessGuard {
    pub fn open(pid: u32, desired_access: u32) -> Result<Self> {
        let handle = unsafe { bindings::open_process(desired_access, 0, pid) };
        if handle.is_null() {
            let code = bindings::last_os_error();
            if code == ERROR_ACCESS_DENIED && !availability::is_elevated() {
                return Err(EngineError::PrivilegeRequired);
            }
            return Err(EngineError::ProcessOpen { pid, code });
        }
        Ok(Self { handle, pid })
    }

    pub fn raw(&self) -> HANDLE {
        self.handle
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        if !self.handle.is_null() {
            let ok = unsafe { bindings::close_handle(self.handle) };
            if ok == 0 {
                // The process may already be gone; nothing to escalate.
                crate::trace_log!("[PROCESS] close failed for pid {}", self.pid);
            }
        }
    }
}

/// Opens `pid`, hands the raw handle to `body`, and closes it on every path
/// out, early returns and panics included.
pub fn with_process<T, F>(pid: u32, desired_access: u32, body: F) -> Result<T>
where
    F: FnOnce(HANDLE) -> Result<T>,
{
    let guard = ProcessGuard::open(pid, desired_access)?;
    body(guard.raw())
}
