//! Engine surface: one function per operation.
//!
//! Every operation runs the availability gate first, then validates its
//! boundary inputs, then opens the target process for the shortest possible
//! scope. Reports carry addresses as `0x`-prefixed uppercase hex strings.

use std::path::Path;

use serde::Serialize;

use crate::availability::{self, Availability};
use crate::encoding::{self, PayloadEncoding};
use crate::error::{EngineError, Result};
use crate::pattern::{self, ValueEncoding};
use crate::regions::{ProtectionChoice, RegionBacking, RegionState};

#[cfg(windows)]
use crate::{bindings, inject, memory, modules, probe, process, regions, scan};

#[derive(Debug, Clone, Serialize)]
pub struct RegionRow {
    pub base_address: String,
    pub allocation_base: String,
    pub allocation_protect: String,
    pub region_size: u64,
    pub state: RegionState,
    pub protect: String,
    pub backing: RegionBacking,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegionsReport {
    pub pid: u32,
    pub count: usize,
    pub truncated: bool,
    pub regions: Vec<RegionRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub pid: u32,
    pub encoding: ValueEncoding,
    pub pattern_length: usize,
    pub match_count: usize,
    pub limited: bool,
    pub regions_scanned: usize,
    pub regions_skipped: usize,
    pub matches: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReadReport {
    pub pid: u32,
    pub address: String,
    pub length: usize,
    pub encoding: PayloadEncoding,
    pub data: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct WriteReport {
    pub pid: u32,
    pub address: String,
    pub bytes_written: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProtectReport {
    pub pid: u32,
    pub address: String,
    pub size: usize,
    pub new_protection: String,
    pub old_protection: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProtectionQueryReport {
    pub pid: u32,
    pub address: String,
    pub region_start: String,
    pub region_size: u64,
    pub state: RegionState,
    pub protection: String,
    pub is_readable: bool,
    pub is_writable: bool,
    pub is_executable: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModuleRow {
    pub name: String,
    pub base_address: String,
    pub size: u64,
    pub entry_point: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModulesReport {
    pub pid: u32,
    pub count: usize,
    pub truncated: bool,
    pub modules: Vec<ModuleRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InjectReport {
    pub pid: u32,
    pub mode: &'static str,
    pub dll_path: Option<String>,
    pub remote_address: String,
    pub entry_point: String,
    pub thread_id: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    pub pid: u32,
    pub debugger_present: bool,
}

/// Reports what the engine can do here. Never fails.
pub fn check_availability() -> Availability {
    availability::check_availability()
}

/// Walks the target's address space and reports every region the walker
/// visited before terminating.
pub fn list_regions(pid: u32) -> Result<RegionsReport> {
    availability::require()?;

    #[cfg(windows)]
    {
        process::with_process(pid, process::READ_ACCESS, |handle| {
            let walked = regions::enumerate_regions(handle, regions::MAX_REGIONS);
            let rows: Vec<RegionRow> = walked.iter().map(region_row).collect();
            crate::trace_log!("[REGIONS] pid {}: {} regions", pid, rows.len());
            Ok(RegionsReport {
                pid,
                count: rows.len(),
                truncated: rows.len() >= regions::MAX_REGIONS,
                regions: rows,
            })
        })
    }
    #[cfg(not(windows))]
    {
        let _ = pid;
        Err(platform_error())
    }
}

/// Scans committed readable memory for a pattern.
pub fn scan_memory(
    pid: u32,
    pattern_text: &str,
    encoding: ValueEncoding,
    max_results: Option<usize>,
) -> Result<ScanReport> {
    availability::require()?;
    let spec = pattern::build_pattern(pattern_text, encoding)?;

    #[cfg(windows)]
    {
        let cap = max_results
            .unwrap_or_else(crate::config::scan_max_results_default)
            .max(1);
        process::with_process(pid, process::READ_ACCESS, |handle| {
            let outcome = scan::scan_pattern(handle, &spec, cap);
            Ok(ScanReport {
                pid,
                encoding,
                pattern_length: spec.len(),
                match_count: outcome.matches.len(),
                limited: outcome.limited,
                regions_scanned: outcome.regions_scanned,
                regions_skipped: outcome.regions_skipped,
                matches: outcome
                    .matches
                    .iter()
                    .map(|&addr| encoding::format_address(addr))
                    .collect(),
            })
        })
    }
    #[cfg(not(windows))]
    {
        let _ = (pid, spec, max_results);
        Err(platform_error())
    }
}

/// Reads exactly `length` bytes and returns them in the requested payload
/// encoding.
pub fn read_memory(
    pid: u32,
    address: &str,
    length: usize,
    encoding: PayloadEncoding,
) -> Result<ReadReport> {
    availability::require()?;
    if length == 0 {
        return Err(EngineError::Validation("length must be at least 1".into()));
    }
    let parsed = encoding::parse_address(address)?;

    #[cfg(windows)]
    {
        process::with_process(pid, process::READ_ACCESS, |handle| {
            let data = memory::read_exact(handle, parsed, length)?;
            Ok(ReadReport {
                pid,
                address: encoding::format_address(parsed),
                length,
                encoding,
                data: encoding::encode_payload(&data, encoding),
            })
        })
    }
    #[cfg(not(windows))]
    {
        let _ = (pid, parsed, encoding);
        Err(platform_error())
    }
}

/// Writes a decoded payload in full.
pub fn write_memory(
    pid: u32,
    address: &str,
    payload: &str,
    encoding: PayloadEncoding,
) -> Result<WriteReport> {
    availability::require()?;
    let parsed = encoding::parse_address(address)?;
    let data = encoding::decode_payload(payload, encoding)?;

    #[cfg(windows)]
    {
        process::with_process(pid, process::WRITE_ACCESS, |handle| {
            let bytes_written = memory::write_all(handle, parsed, &data)?;
            Ok(WriteReport {
                pid,
                address: encoding::format_address(parsed),
                bytes_written,
            })
        })
    }
    #[cfg(not(windows))]
    {
        let _ = (pid, parsed, data);
        Err(platform_error())
    }
}

/// Applies a new protection and reports the one it replaced.
pub fn change_protection(
    pid: u32,
    address: &str,
    size: usize,
    protection: ProtectionChoice,
) -> Result<ProtectReport> {
    availability::require()?;
    if size == 0 {
        return Err(EngineError::Validation("size must be at least 1".into()));
    }
    let parsed = encoding::parse_address(address)?;

    #[cfg(windows)]
    {
        process::with_process(pid, process::WRITE_ACCESS, |handle| {
            let old = memory::change_protection(handle, parsed, size, protection.as_raw())?;
            Ok(ProtectReport {
                pid,
                address: encoding::format_address(parsed),
                size,
                new_protection: regions::protection_label(protection.as_raw()),
                old_protection: regions::protection_label(old),
            })
        })
    }
    #[cfg(not(windows))]
    {
        let _ = (pid, parsed, protection);
        Err(platform_error())
    }
}

/// Reports the protection of whichever region contains an address, with
/// decoded access flags.
pub fn check_memory_protection(pid: u32, address: &str) -> Result<ProtectionQueryReport> {
    availability::require()?;
    let parsed = encoding::parse_address(address)?;

    #[cfg(windows)]
    {
        process::with_process(pid, process::READ_ACCESS, |handle| {
            let mbi = regions::query_region(handle, parsed as usize)
                .ok_or_else(|| EngineError::Win32("VirtualQueryEx", bindings::last_os_error()))?;
            let region = regions::MemoryRegion::from_basic_information(&mbi);
            Ok(ProtectionQueryReport {
                pid,
                address: encoding::format_address(parsed),
                region_start: encoding::format_address(region.base_address as u64),
                region_size: region.region_size as u64,
                state: regions::state_from_raw(region.state),
                protection: regions::protection_label(region.protect),
                is_readable: region.is_committed() && regions::is_readable(region.protect),
                is_writable: region.is_committed() && regions::is_writable(region.protect),
                is_executable: region.is_committed() && regions::is_executable(region.protect),
            })
        })
    }
    #[cfg(not(windows))]
    {
        let _ = (pid, parsed);
        Err(platform_error())
    }
}

/// Lists the target's modules, flagging a list cut off at the handle-table
/// cap.
pub fn list_modules(pid: u32) -> Result<ModulesReport> {
    availability::require()?;

    #[cfg(windows)]
    {
        process::with_process(pid, process::READ_ACCESS, |handle| {
            let list = modules::enumerate_modules(handle)?;
            let rows: Vec<ModuleRow> = list
                .modules
                .iter()
                .map(|module| ModuleRow {
                    name: module.name.clone(),
                    base_address: encoding::format_address(module.base_address),
                    size: module.size,
                    entry_point: encoding::format_address(module.entry_point),
                })
                .collect();
            Ok(ModulesReport {
                pid,
                count: rows.len(),
                truncated: list.truncated,
                modules: rows,
            })
        })
    }
    #[cfg(not(windows))]
    {
        let _ = pid;
        Err(platform_error())
    }
}

/// Loads a DLL into the target. The path has to name an existing file
/// before any process is opened.
pub fn inject_dll(pid: u32, dll_path: &Path) -> Result<InjectReport> {
    availability::require()?;
    if !dll_path.is_file() {
        return Err(EngineError::Validation(format!(
            "dll path '{}' does not exist",
            dll_path.display()
        )));
    }
    let path_text = dll_path
        .to_str()
        .ok_or_else(|| EngineError::Validation("dll path is not valid UTF-8".into()))?
        .to_owned();

    #[cfg(windows)]
    {
        process::with_process(pid, process::WRITE_ACCESS, |handle| {
            let outcome = inject::inject_dll(handle, &path_text)?;
            Ok(InjectReport {
                pid,
                mode: "dll",
                dll_path: Some(path_text.clone()),
                remote_address: encoding::format_address(outcome.remote_address),
                entry_point: encoding::format_address(outcome.entry_point),
                thread_id: outcome.thread_id,
            })
        })
    }
    #[cfg(not(windows))]
    {
        let _ = (pid, path_text);
        Err(platform_error())
    }
}

/// Runs a shellcode payload in the target.
pub fn inject_shellcode(
    pid: u32,
    payload: &str,
    encoding: PayloadEncoding,
) -> Result<InjectReport> {
    availability::require()?;
    let data = encoding::decode_payload(payload, encoding)?;

    #[cfg(windows)]
    {
        process::with_process(pid, process::WRITE_ACCESS, |handle| {
            let outcome = inject::inject_shellcode(handle, &data)?;
            Ok(InjectReport {
                pid,
                mode: "shellcode",
                dll_path: None,
                remote_address: encoding::format_address(outcome.remote_address),
                entry_point: encoding::format_address(outcome.entry_point),
                thread_id: outcome.thread_id,
            })
        })
    }
    #[cfg(not(windows))]
    {
        let _ = (pid, data);
        Err(platform_error())
    }
}

/// Checks whether a debugger is attached to the target.
pub fn probe_debugger(pid: u32) -> Result<ProbeReport> {
    availability::require()?;

    #[cfg(windows)]
    {
        process::with_process(pid, process::READ_ACCESS, |handle| {
            Ok(ProbeReport {
                pid,
                debugger_present: probe::is_debugger_present(handle)?,
            })
        })
    }
    #[cfg(not(windows))]
    {
        let _ = pid;
        Err(platform_error())
    }
}

#[cfg(windows)]
fn region_row(region: &regions::MemoryRegion) -> RegionRow {
    RegionRow {
        base_address: encoding::format_address(region.base_address as u64),
        allocation_base: encoding::format_address(region.allocation_base as u64),
        allocation_protect: regions::protection_label(region.allocation_protect),
        region_size: region.region_size as u64,
        state: regions::state_from_raw(region.state),
        protect: regions::protection_label(region.protect),
        backing: regions::backing_from_type(region.region_type),
    }
}

#[cfg(not(windows))]
fn platform_error() -> EngineError {
    EngineError::PlatformUnsupported {
        os: std::env::consts::OS,
    }
}


#[cfg(all(test, windows))]
mod windows_tests {
    use super::*;

    static ENGINE_MARKER: [u8; 8] = [0x6B, 0x1F, 0xD4, 0x92, 0x3C, 0xE7, 0x50, 0xA8];

    fn self_pid() -> u32 {
        std::process::id()
    }

    #[test]
    fn availability_reports_windows_support() {
        let availability = check_availability();
        assert!(availability.platform_supported);
        assert!(availability.bindings_resolved);
        assert_eq!(availability.available, availability.elevated);
    }

    #[test]
    fn regions_report_covers_the_current_process() {
        let report = list_regions(self_pid()).expect("regions");
        assert!(report.count > 0);
        assert!(!report.truncated);
        assert_eq!(report.count, report.regions.len());
        assert!(report
            .regions
            .iter()
            .all(|row| row.base_address.starts_with("0x")));
    }

    #[test]
    fn protection_query_flags_a_heap_buffer() {
        let data = vec![0u8; 64];
        let address = encoding::format_address(data.as_ptr() as u64);
        let report = check_memory_protection(self_pid(), &address).expect("query");
        assert_eq!(report.state, RegionState::Commit);
        assert!(report.is_readable);
        assert!(report.is_writable);
        assert!(!report.is_executable);
        assert!(report.region_size > 0);
    }

    #[test]
    fn read_returns_the_marker_bytes() {
        let address = encoding::format_address(ENGINE_MARKER.as_ptr() as u64);
        let report = read_memory(self_pid(), &address, ENGINE_MARKER.len(), PayloadEncoding::Hex)
            .expect("read");
        assert_eq!(report.data, hex::encode(ENGINE_MARKER));
        assert_eq!(report.address, address);
    }

    #[test]
    fn write_then_read_roundtrips() {
        let mut target = vec![0u8; 4];
        let address = encoding::format_address(target.as_mut_ptr() as u64);

        let written =
            write_memory(self_pid(), &address, "01020304", PayloadEncoding::Hex).expect("write");
        assert_eq!(written.bytes_written, 4);

        let read = read_memory(self_pid(), &address, 4, PayloadEncoding::Hex).expect("read");
        assert_eq!(read.data, "01020304");
        assert_eq!(target, vec![1, 2, 3, 4]);
    }

    #[test]
    fn scan_finds_the_marker() {
        let text = ENGINE_MARKER
            .iter()
            .map(|b| format!("{:02X}", b))
            .collect::<Vec<_>>()
            .join(" ");
        let report =
            scan_memory(self_pid(), &text, ValueEncoding::Hex, Some(10_000)).expect("scan");
        let marker_address = encoding::format_address(ENGINE_MARKER.as_ptr() as u64);
        assert!(report.matches.contains(&marker_address));
        assert_eq!(report.match_count, report.matches.len());
    }

    #[test]
    fn module_report_includes_ntdll() {
        let report = list_modules(self_pid()).expect("modules");
        assert!(!report.truncated);
        assert!(report
            .modules
            .iter()
            .any(|m| m.name.to_ascii_lowercase() == "ntdll.dll"));
    }

    #[test]
    fn probe_reports_no_debugger_for_the_test_runner() {
        let report = probe_debugger(self_pid()).expect("probe");
        assert!(!report.debugger_present);
    }

    #[test]
    fn zero_length_reads_are_rejected() {
        let err = read_memory(self_pid(), "0x1000", 0, PayloadEncoding::Hex).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn bad_address_text_is_rejected() {
        let err = read_memory(self_pid(), "zz", 4, PayloadEncoding::Hex).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn missing_dll_paths_are_rejected_before_opening_anything() {
        let err = inject_dll(self_pid(), Path::new("C:\\definitely\\missing.dll")).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }
}
