#![allow(non_snake_case, non_camel_case_types, non_upper_case_globals, dead_code)]

//! Hand-defined NT types and constants used by the engine.
//!
//! The two query structs below are filled by the OS as opaque fixed-size
//! buffers; their field offsets are part of the platform ABI and are pinned
//! by the layout tests at the bottom of this file.

use core::ffi::c_void;

pub type HANDLE = *mut c_void;
pub type PVOID = *mut c_void;
pub type HMODULE = *mut c_void;
pub type NTSTATUS = i32;

/// Result buffer of a virtual-memory query, 48 bytes on x64.
///
/// Field offsets: `BaseAddress` 0x00, `AllocationBase` 0x08,
/// `AllocationProtect` 0x10 (4 bytes of padding follow), `RegionSize` 0x18,
/// `State` 0x20, `Protect` 0x24, `Type` 0x28 (4 bytes of tail padding).
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct MEMORY_BASIC_INFORMATION {
    pub BaseAddress: PVOID,
    pub AllocationBase: PVOID,
    pub AllocationProtect: u32,
    pub RegionSize: usize,
    pub State: u32,
    pub Protect: u32,
    pub Type: u32,
}

/// Result buffer of a module-information query, 24 bytes on x64.
///
/// Field offsets: `lpBaseOfDll` 0x00, `SizeOfImage` 0x08 (4 bytes of padding
/// follow), `EntryPoint` 0x10.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct MODULEINFO {
    pub lpBaseOfDll: PVOID,
    pub SizeOfImage: u32,
    pub EntryPoint: PVOID,
}

#[inline]
pub const fn nt_success(status: NTSTATUS) -> bool {
    status >= 0
}

pub const PAGE_NOACCESS: u32 = 0x01;
pub const PAGE_READONLY: u32 = 0x02;
pub const PAGE_READWRITE: u32 = 0x04;
pub const PAGE_WRITECOPY: u32 = 0x08;
pub const PAGE_EXECUTE: u32 = 0x10;
pub const PAGE_EXECUTE_READ: u32 = 0x20;
pub const PAGE_EXECUTE_READWRITE: u32 = 0x40;
pub const PAGE_EXECUTE_WRITECOPY: u32 = 0x80;
pub const PAGE_GUARD: u32 = 0x100;
pub const PAGE_NOCACHE: u32 = 0x200;
pub const PAGE_WRITECOMBINE: u32 = 0x400;

pub const MEM_COMMIT: u32 = 0x00001000;
pub const MEM_RESERVE: u32 = 0x00002000;
pub const MEM_FREE: u32 = 0x00010000;

pub const MEM_PRIVATE: u32 = 0x00020000;
pub const MEM_MAPPED: u32 = 0x00040000;
pub const MEM_IMAGE: u32 = 0x01000000;

pub const PROCESS_CREATE_THREAD: u32 = 0x0002;
pub const PROCESS_VM_OPERATION: u32 = 0x0008;
pub const PROCESS_VM_READ: u32 = 0x0010;
pub const PROCESS_VM_WRITE: u32 = 0x0020;
pub const PROCESS_QUERY_INFORMATION: u32 = 0x0400;

/// Information class passed to `NtQueryInformationProcess` to read the
/// debug port slot.
pub const ProcessDebugPort: u32 = 7;
