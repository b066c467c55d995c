//! Lazily resolved entry points into kernel32, psapi and ntdll.
//!
//! Each entry is looked up once through `GetProcAddress`, cached as a typed
//! function pointer, and reused for the life of the process. A wrapper whose
//! entry cannot be resolved returns the API's failure value instead of
//! calling anything.

use std::mem;
use std::ptr;
use std::sync::OnceLock;

use winapi::shared::minwindef::FARPROC;
use winapi::um::errhandlingapi::GetLastError;
use winapi::um::libloaderapi::{GetModuleHandleA, GetProcAddress, LoadLibraryA};

use crate::nt::{HANDLE, HMODULE, MEMORY_BASIC_INFORMATION, MODULEINFO, NTSTATUS, PVOID};

const STATUS_UNSUCCESSFUL: NTSTATUS = 0xC0000001u32 as i32;

type OpenProcessFn = unsafe extern "system" fn(u32, i32, u32) -> HANDLE;
type CloseHandleFn = unsafe extern "system" fn(HANDLE) -> i32;
type ReadProcessMemoryFn =
    unsafe extern "system" fn(HANDLE, PVOID, PVOID, usize, *mut usize) -> i32;
type WriteProcessMemoryFn =
    unsafe extern "system" fn(HANDLE, PVOID, PVOID, usize, *mut usize) -> i32;
type VirtualQueryExFn =
    unsafe extern "system" fn(HANDLE, PVOID, *mut MEMORY_BASIC_INFORMATION, usize) -> usize;
type VirtualAllocExFn = unsafe extern "system" fn(HANDLE, PVOID, usize, u32, u32) -> PVOID;
type VirtualProtectExFn = unsafe extern "system" fn(HANDLE, PVOID, usize, u32, *mut u32) -> i32;
type CreateRemoteThreadFn =
    unsafe extern "system" fn(HANDLE, PVOID, usize, PVOID, PVOID, u32, *mut u32) -> HANDLE;
type EnumProcessModulesFn = unsafe extern "system" fn(HANDLE, *mut HMODULE, u32, *mut u32) -> i32;
type GetModuleBaseNameAFn = unsafe extern "system" fn(HANDLE, HMODULE, *mut i8, u32) -> u32;
type GetModuleInformationFn =
    unsafe extern "system" fn(HANDLE, HMODULE, *mut MODULEINFO, u32) -> i32;
type NtQueryInformationProcessFn =
    unsafe extern "system" fn(HANDLE, u32, PVOID, u32, *mut u32) -> NTSTATUS;

static KERNEL32: OnceLock<usize> = OnceLock::new();
static PSAPI: OnceLock<usize> = OnceLock::new();
static NTDLL: OnceLock<usize> = OnceLock::new();

static OPEN_PROCESS: OnceLock<Option<OpenProcessFn>> = OnceLock::new();
static CLOSE_HANDLE: OnceLock<Option<CloseHandleFn>> = OnceLock::new();
static READ_MEMORY: OnceLock<Option<ReadProcessMemoryFn>> = OnceLock::new();
static WRITE_MEMORY: OnceLock<Option<WriteProcessMemoryFn>> = OnceLock::new();
static QUERY_REGION: OnceLock<Option<VirtualQueryExFn>> = OnceLock::new();
static ALLOC: OnceLock<Option<VirtualAllocExFn>> = OnceLock::new();
static PROTECT: OnceLock<Option<VirtualProtectExFn>> = OnceLock::new();
static REMOTE_THREAD: OnceLock<Option<CreateRemoteThreadFn>> = OnceLock::new();
static ENUM_MODULES: OnceLock<Option<EnumProcessModulesFn>> = OnceLock::new();
static MODULE_NAME: OnceLock<Option<GetModuleBaseNameAFn>> = OnceLock::new();
static MODULE_INFO: OnceLock<Option<GetModuleInformationFn>> = OnceLock::new();
static NT_QIP: OnceLock<Option<NtQueryInformationProcessFn>> = OnceLock::new();

fn kernel32() -> usize {
    load_library(&KERNEL32, b"kernel32.dll\0")
}

fn psapi() -> usize {
    load_library(&PSAPI, b"psapi.dll\0")
}

fn ntdll() -> usize {
    load_library(&NTDLL, b"ntdll.dll\0")
}

fn load_library(cache: &OnceLock<usize>, name: &[u8]) -> usize {
    *cache.get_or_init(|| unsafe {
        let name_ptr = name.as_ptr() as *const i8;
        let existing = GetModuleHandleA(name_ptr);
        if !existing.is_null() {
            return existing as usize;
        }
        LoadLibraryA(name_ptr) as usize
    })
}

unsafe fn resolve_export(library: usize, symbol: &[u8]) -> Option<FARPROC> {
    if library == 0 {
        return None;
    }
    let proc = GetProcAddress(
        library as winapi::shared::minwindef::HMODULE,
        symbol.as_ptr() as *const i8,
    );
    if proc.is_null() {
        return None;
    }
    Some(proc)
}

/// Name of the first library that failed to produce a module handle.
pub fn missing_library() -> Option<&'static str> {
    if kernel32() == 0 {
        return Some("kernel32.dll");
    }
    if psapi() == 0 {
        return Some("psapi.dll");
    }
    if ntdll() == 0 {
        return Some("ntdll.dll");
    }
    None
}

/// True once all three libraries have produced a module handle.
pub fn libraries_resolved() -> bool {
    missing_library().is_none()
}

pub fn last_os_error() -> u32 {
    unsafe { GetLastError() }
}

/// Loader-provided root of the resolution chain.
pub unsafe fn get_module_handle(name: *const i8) -> HMODULE {
    GetModuleHandleA(name) as HMODULE
}

/// Loader-provided root of the resolution chain.
pub unsafe fn get_proc_address(module: HMODULE, name: *const i8) -> PVOID {
    GetProcAddress(module as winapi::shared::minwindef::HMODULE, name) as PVOID
}

#[inline(never)]
pub unsafe fn open_process(desired_access: u32, inherit_handle: i32, pid: u32) -> HANDLE {
    if let Some(func) = *OPEN_PROCESS.get_or_init(|| unsafe {
        let addr = resolve_export(kernel32(), b"OpenProcess\0")?;
        Some(mem::transmute::<FARPROC, OpenProcessFn>(addr))
    }) {
        return func(desired_access, inherit_handle, pid);
    }
    ptr::null_mut()
}

#[inline(never)]
pub unsafe fn close_handle(handle: HANDLE) -> i32 {
    if let Some(func) = *CLOSE_HANDLE.get_or_init(|| unsafe {
        let addr = resolve_export(kernel32(), b"CloseHandle\0")?;
        Some(mem::transmute::<FARPROC, CloseHandleFn>(addr))
    }) {
        return func(handle);
    }
    0
}

#[inline(never)]
pub unsafe fn read_process_memory(
    process: HANDLE,
    base_address: PVOID,
    buffer: PVOID,
    size: usize,
    bytes_read: *mut usize,
) -> i32 {
    if let Some(func) = *READ_MEMORY.get_or_init(|| unsafe {
        let addr = resolve_export(kernel32(), b"ReadProcessMemory\0")?;
        Some(mem::transmute::<FARPROC, ReadProcessMemoryFn>(addr))
    }) {
        return func(process, base_address, buffer, size, bytes_read);
    }
    0
}

#[inline(never)]
pub unsafe fn write_process_memory(
    process: HANDLE,
    base_address: PVOID,
    buffer: PVOID,
    size: usize,
    bytes_written: *mut usize,
) -> i32 {
    if let Some(func) = *WRITE_MEMORY.get_or_init(|| unsafe {
        let addr = resolve_export(kernel32(), b"WriteProcessMemory\0")?;
        Some(mem::transmute::<FARPROC, WriteProcessMemoryFn>(addr))
    }) {
        return func(process, base_address, buffer, size, bytes_written);
    }
    0
}

#[inline(never)]
pub unsafe fn virtual_query_ex(
    process: HANDLE,
    address: PVOID,
    buffer: *mut MEMORY_BASIC_INFORMATION,
    length: usize,
) -> usize {
    if let Some(func) = *QUERY_REGION.get_or_init(|| unsafe {
        let addr = resolve_export(kernel32(), b"VirtualQueryEx\0")?;
        Some(mem::transmute::<FARPROC, VirtualQueryExFn>(addr))
    }) {
        return func(process, address, buffer, length);
    }
    0
}

#[inline(never)]
pub unsafe fn virtual_alloc_ex(
    process: HANDLE,
    address: PVOID,
    size: usize,
    allocation_type: u32,
    protect: u32,
) -> PVOID {
    if let Some(func) = *ALLOC.get_or_init(|| unsafe {
        let addr = resolve_export(kernel32(), b"VirtualAllocEx\0")?;
        Some(mem::transmute::<FARPROC, VirtualAllocExFn>(addr))
    }) {
        return func(process, address, size, allocation_type, protect);
    }
    ptr::null_mut()
}

#[inline(never)]
pub unsafe fn virtual_protect_ex(
    process: HANDLE,
    address: PVOID,
    size: usize,
    new_protect: u32,
    old_protect: *mut u32,
) -> i32 {
    if let Some(func) = *PROTECT.get_or_init(|| unsafe {
        let addr = resolve_export(kernel32(), b"VirtualProtectEx\0")?;
        Some(mem::transmute::<FARPROC, VirtualProtectExFn>(addr))
    }) {
        return func(process, address, size, new_protect, old_protect);
    }
    0
}

#[inline(never)]
pub unsafe fn create_remote_thread(
    process: HANDLE,
    attributes: PVOID,
    stack_size: usize,
    start_routine: PVOID,
    parameter: PVOID,
    flags: u32,
    thread_id: *mut u32,
) -> HANDLE {
    if let Some(func) = *REMOTE_THREAD.get_or_init(|| unsafe {
        let addr = resolve_export(kernel32(), b"CreateRemoteThread\0")?;
        Some(mem::transmute::<FARPROC, CreateRemoteThreadFn>(addr))
    }) {
        return func(
            process,
            attributes,
            stack_size,
            start_routine,
            parameter,
            flags,
            thread_id,
        );
    }
    ptr::null_mut()
}

#[inline(never)]
pub unsafe fn enum_process_modules(
    process: HANDLE,
    modules: *mut HMODULE,
    size: u32,
    needed: *mut u32,
) -> i32 {
    if let Some(func) = *ENUM_MODULES.get_or_init(|| unsafe {
        let addr = resolve_export(psapi(), b"EnumProcessModules\0")?;
        Some(mem::transmute::<FARPROC, EnumProcessModulesFn>(addr))
    }) {
        return func(process, modules, size, needed);
    }
    0
}

#[inline(never)]
pub unsafe fn get_module_base_name(
    process: HANDLE,
    module: HMODULE,
    name: *mut i8,
    size: u32,
) -> u32 {
    if let Some(func) = *MODULE_NAME.get_or_init(|| unsafe {
        let addr = resolve_export(psapi(), b"GetModuleBaseNameA\0")?;
        Some(mem::transmute::<FARPROC, GetModuleBaseNameAFn>(addr))
    }) {
        return func(process, module, name, size);
    }
    0
}

#[inline(never)]
pub unsafe fn get_module_information(
    process: HANDLE,
    module: HMODULE,
    info: *mut MODULEINFO,
    size: u32,
) -> i32 {
    if let Some(func) = *MODULE_INFO.get_or_init(|| unsafe {
        let addr = resolve_export(psapi(), b"GetModuleInformation\0")?;
        Some(mem::transmute::<FARPROC, GetModuleInformationFn>(addr))
    }) {
        return func(process, module, info, size);
    }
    0
}

#[inline(never)]
pub unsafe fn nt_query_information_process(
    process: HANDLE,
    info_class: u32,
    info_buffer: PVOID,
    info_length: u32,
    return_length: *mut u32,
) -> NTSTATUS {
    if let Some(func) = *NT_QIP.get_or_init(|| unsafe {
        let addr = resolve_export(ntdll(), b"NtQueryInformationProcess\0")?;
        Some(mem::transmute::<FARPROC, NtQueryInformationProcessFn>(addr))
    }) {
        return func(process, info_class, info_buffer, info_length, return_length);
    }
    STATUS_UNSUCCESSFUL
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_three_libraries_resolve() {
        assert!(libraries_resolved());
    }

    #[test]
    fn known_exports_resolve_and_bogus_ones_do_not() {
        unsafe {
            assert!(resolve_export(kernel32(), b"OpenProcess\0").is_some());
            assert!(resolve_export(ntdll(), b"NtQueryInformationProcess\0").is_some());
            assert!(resolve_export(kernel32(), b"DefinitelyNotAnExport\0").is_none());
            assert!(resolve_export(0, b"OpenProcess\0").is_none());
        }
    }
}
