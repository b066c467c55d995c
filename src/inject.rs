//! Code injection: DLL loads through a remote `LoadLibraryA` call, shellcode
//! through allocate, write, reprotect, execute.
//!
//! Failures carry the stage they died at. Nothing is rolled back on failure;
//! an allocation that never runs stays in the target until it exits.

use std::ptr;

use crate::bindings;
use crate::error::{EngineError, InjectionStage, Result};
use crate::nt::{HANDLE, MEM_COMMIT, MEM_RESERVE, PAGE_EXECUTE_READWRITE, PAGE_READWRITE, PVOID};

/// Where the injected code ended up and the thread that runs it.
#[derive(Debug, Clone, Copy)]
pub struct InjectionOutcome {
    pub remote_address: u64,
    pub entry_point: u64,
    pub thread_id: u32,
}

/// Loads `dll_path` into the target by writing the path into its address
/// space and running `LoadLibraryA` over it on a new thread.
///
/// The loader entry point is resolved in this process; kernel32 sits at the
/// same base in every process sharing the image.
pub fn inject_dll(handle: HANDLE, dll_path: &str) -> Result<InjectionOutcome> {
    let kernel32 =
        unsafe { bindings::get_module_handle(b"kernel32.dll\0".as_ptr() as *const i8) };
    if kernel32.is_null() {
        return Err(stage_error(InjectionStage::ResolveEntryPoint));
    }
    let load_library =
        unsafe { bindings::get_proc_address(kernel32, b"LoadLibraryA\0".as_ptr() as *const i8) };
    if load_library.is_null() {
        return Err(stage_error(InjectionStage::ResolveEntryPoint));
    }

    let mut path_buf = dll_path.as_bytes().to_vec();
    path_buf.push(0);

    let remote = allocate(handle, path_buf.len(), PAGE_READWRITE)?;
    write_payload(handle, remote, &path_buf)?;
    let thread_id = spawn_thread(handle, load_library, remote)?;

    crate::trace_log!(
        "[INJECT] dll path at {:#X}, thread {}",
        remote as u64,
        thread_id
    );

    Ok(InjectionOutcome {
        remote_address: remote as u64,
        entry_point: load_library as u64,
        thread_id,
    })
}

/// Copies `payload` into fresh memory in the target, flips it executable,
/// and runs it on a new thread.
pub fn inject_shellcode(handle: HANDLE, payload: &[u8]) -> Result<InjectionOutcome> {
    let remote = allocate(handle, payload.len(), PAGE_READWRITE)?;
    write_payload(handle, remote, payload)?;

    let mut old: u32 = 0;
    let ok = unsafe {
        bindings::virtual_protect_ex(
            handle,
            remote,
            payload.len(),
            PAGE_EXECUTE_READWRITE,
            &mut old,
        )
    };
    if ok == 0 {
        return Err(stage_error(InjectionStage::Protect));
    }

    let thread_id = spawn_thread(handle, remote, ptr::null_mut())?;

    crate::trace_log!(
        "[INJECT] {} shellcode bytes at {:#X}, thread {}",
        payload.len(),
        remote as u64,
        thread_id
    );

    Ok(InjectionOutcome {
        remote_address: remote as u64,
        entry_point: remote as u64,
        thread_id,
    })
}

fn allocate(handle: HANDLE, size: usize, protect: u32) -> Result<PVOID> {
    let remote = unsafe {
        bindings::virtual_alloc_ex(
            handle,
            ptr::null_mut(),
            size,
            MEM_COMMIT | MEM_RESERVE,
            protect,
        )
    };
    if remote.is_null() {
        return Err(stage_error(InjectionStage::Allocate));
    }
    Ok(remote)
}

fn write_payload(handle: HANDLE, remote: PVOID, data: &[u8]) -> Result<()> {
    let mut written: usize = 0;
    let ok = unsafe {
        bindings::write_process_memory(
            handle,
            remote,
            data.as_ptr() as PVOID,
            data.len(),
            &mut written,
        )
    };
    if ok == 0 || written != data.len() {
        return Err(stage_error(InjectionStage::Write));
    }
    Ok(())
}

fn spawn_thread(handle: HANDLE, start: PVOID, parameter: PVOID) -> Result<u32> {
    let mut thread_id: u32 = 0;
    let thread = unsafe {
        bindings::create_remote_thread(
            handle,
            ptr::null_mut(),
            0,
            start,
            parameter,
            0,
            &mut thread_id,
        )
    };
    if thread.is_null() {
        return Err(stage_error(InjectionStage::CreateThread));
    }
    // The thread runs detached; only its id is reported.
    unsafe {
        bindings::close_handle(thread);
    }
    Ok(thread_id)
}

fn stage_error(stage: InjectionStage) -> EngineError {
    EngineError::Injection {
        stage,
        code: bindings::last_os_error(),
    }
}
