//! Module enumeration through psapi.

use std::mem;
use std::ptr;

use crate::bindings;
use crate::error::{EngineError, Result};
use crate::nt::{HANDLE, HMODULE, MODULEINFO};

/// Fixed handle table handed to `EnumProcessModules`. Processes with more
/// modules than this are reported truncated rather than re-queried.
pub const MAX_MODULES: usize = 1024;

#[derive(Debug, Clone)]
pub struct ModuleEntry {
    pub name: String,
    pub base_address: u64,
    pub size: u64,
    pub entry_point: u64,
}

#[derive(Debug, Clone)]
pub struct ModuleList {
    pub modules: Vec<ModuleEntry>,
    pub truncated: bool,
}

/// Lists the target's modules. Individual modules that fail to describe
/// themselves are dropped; the rest of the list still comes back.
pub fn enumerate_modules(handle: HANDLE) -> Result<ModuleList> {
    let mut handles = vec![ptr::null_mut() as HMODULE; MAX_MODULES];
    let capacity = (MAX_MODULES * mem::size_of::<HMODULE>()) as u32;
    let mut needed: u32 = 0;

    let ok = unsafe {
        bindings::enum_process_modules(handle, handles.as_mut_ptr(), capacity, &mut needed)
    };
    if ok == 0 {
        return Err(EngineError::Win32(
            "EnumProcessModules",
            bindings::last_os_error(),
        ));
    }

    let total = needed as usize / mem::size_of::<HMODULE>();
    let truncated = total > MAX_MODULES;
    let count = total.min(MAX_MODULES);

    let mut modules = Vec::with_capacity(count);
    for &module in &handles[..count] {
        let name = match module_base_name(handle, module) {
            Some(n) => n,
            None => continue,
        };
        let info = match module_information(handle, module) {
            Some(i) => i,
            None => continue,
        };
        modules.push(ModuleEntry {
            name,
            base_address: info.lpBaseOfDll as u64,
            size: info.SizeOfImage as u64,
            entry_point: info.EntryPoint as u64,
        });
    }

    Ok(ModuleList { modules, truncated })
}

fn module_base_name(handle: HANDLE, module: HMODULE) -> Option<String> {
    let mut buf = [0i8; 256];
    let len = unsafe {
        bindings::get_module_base_name(handle, module, buf.as_mut_ptr(), buf.len() as u32)
    };
    if len == 0 {
        return None;
    }
    let bytes: Vec<u8> = buf[..len as usize].iter().map(|&c| c as u8).collect();
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

fn module_information(handle: HANDLE, module: HMODULE) -> Option<MODULEINFO> {
    let mut info: MODULEINFO = unsafe { mem::zeroed() };
    let ok = unsafe {
        bindings::get_module_information(
            handle,
            module,
            &mut info,
            mem::size_of::<MODULEINFO>() as u32,
        )
    };
    if ok == 0 {
        return None;
    }
    Some(info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{ProcessGuard, READ_ACCESS};

    #[test]
    fn own_module_list_contains_ntdll() {
        let guard = ProcessGuard::open(std::process::id(), READ_ACCESS).expect("open self");
        let list = enumerate_modules(guard.raw()).expect("modules");
        assert!(!list.truncated);
        assert!(list
            .modules
            .iter()
            .any(|m| m.name.to_ascii_lowercase() == "ntdll.dll"));
    }

    #[test]
    fn module_entries_carry_base_and_size() {
        let guard = ProcessGuard::open(std::process::id(), READ_ACCESS).expect("open self");
        let list = enumerate_modules(guard.raw()).expect("modules");
        for module in &list.modules {
            assert_ne!(module.base_address, 0, "{} has no base", module.name);
            assert_ne!(module.size, 0, "{} has no size", module.name);
        }
    }
}
