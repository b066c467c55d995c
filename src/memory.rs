//! Cross-process reads, writes and protection changes.

use crate::bindings;
use crate::error::{EngineError, Result};
use crate::nt::{HANDLE, PVOID};

/// Reads exactly `size` bytes at `address`. A short read fails the whole
/// operation so callers never see a partial buffer.
pub fn read_exact(handle: HANDLE, address: u64, size: usize) -> Result<Vec<u8>> {
    let mut buffer = vec![0u8; size];
    let mut read_len: usize = 0;
    let ok = unsafe {
        bindings::read_process_memory(
            handle,
            address as usize as PVOID,
            buffer.as_mut_ptr() as PVOID,
            size,
            &mut read_len,
        )
    };
    if ok == 0 || read_len != size {
        return Err(EngineError::MemoryAccess {
            address,
            size,
            code: bindings::last_os_error(),
        });
    }
    Ok(buffer)
}

/// Writes the whole of `data` at `address`, failing on any shortfall.
pub fn write_all(handle: HANDLE, address: u64, data: &[u8]) -> Result<usize> {
    let mut written: usize = 0;
    let ok = unsafe {
        bindings::write_process_memory(
            handle,
            address as usize as PVOID,
            data.as_ptr() as PVOID,
            data.len(),
            &mut written,
        )
    };
    if ok == 0 || written != data.len() {
        return Err(EngineError::MemoryAccess {
            address,
            size: data.len(),
            code: bindings::last_os_error(),
        });
    }
    Ok(written)
}

/// Applies `new_protect` across `size` bytes at `address` and returns the
/// protection that was in place before.
pub fn change_protection(
    handle: HANDLE,
    address: u64,
    size: usize,
    new_protect: u32,
) -> Result<u32> {
    let mut old: u32 = 0;
    let ok = unsafe {
        bindings::virtual_protect_ex(
            handle,
            address as usize as PVOID,
            size,
            new_protect,
            &mut old,
        )
    };
    if ok == 0 {
        return Err(EngineError::ProtectionChange {
            address,
            code: bindings::last_os_error(),
        });
    }
    Ok(old)
}

/// Best-effort read for the scanner: keeps whatever arrived before the
/// first unreadable page, or None when nothing could be read at all.
pub fn read_region(handle: HANDLE, address: u64, size: usize) -> Option<Vec<u8>> {
    let mut buffer = vec![0u8; size];
    let mut read_len: usize = 0;
    let ok = unsafe {
        bindings::read_process_memory(
            handle,
            address as usize as PVOID,
            buffer.as_mut_ptr() as PVOID,
            size,
            &mut read_len,
        )
    };
    if ok == 0 && read_len == 0 {
        return None;
    }
    buffer.truncate(read_len);
    Some(buffer)
}
