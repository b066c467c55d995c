//! Debug-state probe through the process debug port.

use std::mem;

use crate::bindings;
use crate::error::{EngineError, Result};
use crate::nt::{nt_success, ProcessDebugPort, HANDLE, PVOID};

/// Asks the kernel for the target's debug port. A nonzero port means a
/// debugger is attached.
pub fn is_debugger_present(handle: HANDLE) -> Result<bool> {
    let mut debug_port: u64 = 0;
    let mut return_length: u32 = 0;

    let status = unsafe {
        bindings::nt_query_information_process(
            handle,
            ProcessDebugPort,
            &mut debug_port as *mut u64 as PVOID,
            mem::size_of::<u64>() as u32,
            &mut return_length,
        )
    };

    if !nt_success(status) {
        return Err(EngineError::Probe { status });
    }

    Ok(debug_port != 0)
}
