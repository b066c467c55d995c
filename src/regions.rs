//! Region walker and the memory-region model shared by scans and reports.

use clap::ValueEnum;
use serde::Serialize;

use crate::nt::{
    MEMORY_BASIC_INFORMATION, MEM_COMMIT, MEM_FREE, MEM_IMAGE, MEM_MAPPED, MEM_PRIVATE,
    MEM_RESERVE, PAGE_EXECUTE, PAGE_EXECUTE_READ, PAGE_EXECUTE_READWRITE, PAGE_EXECUTE_WRITECOPY,
    PAGE_GUARD, PAGE_NOACCESS, PAGE_NOCACHE, PAGE_READONLY, PAGE_READWRITE, PAGE_WRITECOMBINE,
    PAGE_WRITECOPY,
};

#[cfg(windows)]
use crate::bindings;
#[cfg(windows)]
use crate::nt::{HANDLE, PVOID};

/// Highest address the walker will visit. Kernel space sits above this on
/// x64 and queries there never describe scannable memory.
pub const MAX_USER_ADDRESS: usize = 0x0000_7FFF_FFFF_FFFF;

/// Upper bound on regions collected in one walk.
pub const MAX_REGIONS: usize = 65536;

const READABLE_MASK: u32 = PAGE_READONLY
    | PAGE_READWRITE
    | PAGE_WRITECOPY
    | PAGE_EXECUTE_READ
    | PAGE_EXECUTE_READWRITE
    | PAGE_EXECUTE_WRITECOPY;

const WRITABLE_MASK: u32 =
    PAGE_READWRITE | PAGE_WRITECOPY | PAGE_EXECUTE_READWRITE | PAGE_EXECUTE_WRITECOPY;

const EXECUTABLE_MASK: u32 =
    PAGE_EXECUTE | PAGE_EXECUTE_READ | PAGE_EXECUTE_READWRITE | PAGE_EXECUTE_WRITECOPY;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RegionState {
    Commit,
    Reserve,
    Free,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RegionBacking {
    Image,
    Mapped,
    Private,
    Unknown,
}

/// One region as reported by `VirtualQueryEx`, with raw numeric fields.
/// Reports format these through the boundary codecs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRegion {
    pub base_address: usize,
    pub allocation_base: usize,
    pub allocation_protect: u32,
    pub region_size: usize,
    pub state: u32,
    pub protect: u32,
    pub region_type: u32,
}

impl MemoryRegion {
    pub fn from_basic_information(mbi: &MEMORY_BASIC_INFORMATION) -> Self {
        Self {
            base_address: mbi.BaseAddress as usize,
            allocation_base: mbi.AllocationBase as usize,
            allocation_protect: mbi.AllocationProtect,
            region_size: mbi.RegionSize,
            state: mbi.State,
            protect: mbi.Protect,
            region_type: mbi.Type,
        }
    }

    pub fn end(&self) -> usize {
        self.base_address.saturating_add(self.region_size)
    }

    pub fn contains(&self, addr: usize) -> bool {
        addr >= self.base_address && addr < self.end()
    }

    pub fn is_committed(&self) -> bool {
        self.state == MEM_COMMIT
    }
}

pub fn state_from_raw(state: u32) -> RegionState {
    match state {
        MEM_COMMIT => RegionState::Commit,
        MEM_RESERVE => RegionState::Reserve,
        MEM_FREE => RegionState::Free,
        _ => RegionState::Unknown,
    }
}

pub fn backing_from_type(ty: u32) -> RegionBacking {
    if (ty & MEM_IMAGE) != 0 {
        return RegionBacking::Image;
    }
    if (ty & MEM_MAPPED) != 0 {
        return RegionBacking::Mapped;
    }
    if (ty & MEM_PRIVATE) != 0 {
        return RegionBacking::Private;
    }
    RegionBacking::Unknown
}

/// True when the protection grants any read access and no guard bit is set.
/// Callers still have to check the commit state separately.
pub fn is_readable(protect: u32) -> bool {
    if (protect & PAGE_GUARD) != 0 {
        return false;
    }
    (protect & READABLE_MASK) != 0
}

pub fn is_writable(protect: u32) -> bool {
    if (protect & PAGE_GUARD) != 0 {
        return false;
    }
    (protect & WRITABLE_MASK) != 0
}

pub fn is_executable(protect: u32) -> bool {
    if (protect & PAGE_GUARD) != 0 {
        return false;
    }
    (protect & EXECUTABLE_MASK) != 0
}

/// Protections a caller can apply through the protection operation.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectionChoice {
    NoAccess,
    ReadOnly,
    ReadWrite,
    Execute,
    ExecuteRead,
    ExecuteReadWrite,
}

impl ProtectionChoice {
    pub fn as_raw(self) -> u32 {
        match self {
            ProtectionChoice::NoAccess => PAGE_NOACCESS,
            ProtectionChoice::ReadOnly => PAGE_READONLY,
            ProtectionChoice::ReadWrite => PAGE_READWRITE,
            ProtectionChoice::Execute => PAGE_EXECUTE,
            ProtectionChoice::ExecuteRead => PAGE_EXECUTE_READ,
            ProtectionChoice::ExecuteReadWrite => PAGE_EXECUTE_READWRITE,
        }
    }
}

pub fn protection_label(protect: u32) -> String {
    let base = match protect & 0xFF {
        PAGE_NOACCESS => "NOACCESS",
        PAGE_READONLY => "READONLY",
        PAGE_READWRITE => "READWRITE",
        PAGE_WRITECOPY => "WRITECOPY",
        PAGE_EXECUTE => "EXECUTE",
        PAGE_EXECUTE_READ => "EXECUTE_READ",
        PAGE_EXECUTE_READWRITE => "EXECUTE_READWRITE",
        PAGE_EXECUTE_WRITECOPY => "EXECUTE_WRITECOPY",
        _ => "UNKNOWN",
    };

    let mut label = String::from(base);
    if (protect & PAGE_GUARD) != 0 {
        label.push_str("+GUARD");
    }
    if (protect & PAGE_NOCACHE) != 0 {
        label.push_str("+NOCACHE");
    }
    if (protect & PAGE_WRITECOMBINE) != 0 {
        label.push_str("+WRITECOMBINE");
    }
    label
}

/// Walks the address space from zero, stepping by `base + size` each query.
/// Stops on the first failed query, a zero-size region, a cursor that fails
/// to advance, or the user-space ceiling.
#[cfg(windows)]
pub fn enumerate_regions(handle: HANDLE, max_regions: usize) -> Vec<MemoryRegion> {
    let mut regions = Vec::new();
    let mut addr: usize = 0;

    loop {
        if regions.len() >= max_regions || addr > MAX_USER_ADDRESS {
            break;
        }

        let mbi = match query_region(handle, addr) {
            Some(m) => m,
            None => break,
        };

        let region = MemoryRegion::from_basic_information(&mbi);
        if region.region_size == 0 {
            break;
        }

        let next = region.base_address.saturating_add(region.region_size);
        if next <= addr {
            break;
        }
        addr = next;

        regions.push(region);
    }

    regions
}

#[cfg(windows)]
pub fn query_region(handle: HANDLE, address: usize) -> Option<MEMORY_BASIC_INFORMATION> {
    let mut mbi: MEMORY_BASIC_INFORMATION = unsafe { core::mem::zeroed() };
    let written = unsafe {
        bindings::virtual_query_ex(
            handle,
            address as PVOID,
            &mut mbi,
            core::mem::size_of::<MEMORY_BASIC_INFORMATION>(),
        )
    };
    if written == 0 {
        return None;
    }
    Some(mbi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nt::PVOID;

    fn region(state: u32, protect: u32) -> MemoryRegion {
        MemoryRegion {
            base_address: 0x1000,
            allocation_base: 0x1000,
            allocation_protect: protect,
            region_size: 0x2000,
            state,
            protect,
            region_type: MEM_PRIVATE,
        }
    }

    #[test]
    fn from_basic_information_maps_every_field() {
        let mbi = MEMORY_BASIC_INFORMATION {
            BaseAddress: 0x7FF6_4D2A_0000usize as PVOID,
            AllocationBase: 0x7FF6_4D28_0000usize as PVOID,
            AllocationProtect: PAGE_EXECUTE_WRITECOPY,
            RegionSize: 0x3000,
            State: MEM_COMMIT,
            Protect: PAGE_READONLY,
            Type: MEM_IMAGE,
        };

        let region = MemoryRegion::from_basic_information(&mbi);
        assert_eq!(region.base_address, 0x7FF6_4D2A_0000);
        assert_eq!(region.allocation_base, 0x7FF6_4D28_0000);
        assert_eq!(region.allocation_protect, PAGE_EXECUTE_WRITECOPY);
        assert_eq!(region.region_size, 0x3000);
        assert_eq!(region.state, MEM_COMMIT);
        assert_eq!(region.protect, PAGE_READONLY);
        assert_eq!(region.region_type, MEM_IMAGE);
    }

    #[test]
    fn state_maps_to_labels() {
        assert_eq!(state_from_raw(MEM_COMMIT), RegionState::Commit);
        assert_eq!(state_from_raw(MEM_RESERVE), RegionState::Reserve);
        assert_eq!(state_from_raw(MEM_FREE), RegionState::Free);
        assert_eq!(state_from_raw(0), RegionState::Unknown);
    }

    #[test]
    fn backing_maps_to_labels() {
        assert_eq!(backing_from_type(MEM_IMAGE), RegionBacking::Image);
        assert_eq!(backing_from_type(MEM_MAPPED), RegionBacking::Mapped);
        assert_eq!(backing_from_type(MEM_PRIVATE), RegionBacking::Private);
        assert_eq!(backing_from_type(0), RegionBacking::Unknown);
    }

    #[test]
    fn readable_protections_are_recognized() {
        for protect in [
            PAGE_READONLY,
            PAGE_READWRITE,
            PAGE_WRITECOPY,
            PAGE_EXECUTE_READ,
            PAGE_EXECUTE_READWRITE,
            PAGE_EXECUTE_WRITECOPY,
        ] {
            assert!(is_readable(protect), "{:#X} should be readable", protect);
        }
    }

    #[test]
    fn unreadable_protections_are_rejected() {
        assert!(!is_readable(PAGE_NOACCESS));
        assert!(!is_readable(PAGE_EXECUTE));
        assert!(!is_readable(PAGE_READWRITE | PAGE_GUARD));
        assert!(!is_readable(0));
    }

    #[test]
    fn writable_and_executable_predicates() {
        assert!(is_writable(PAGE_READWRITE));
        assert!(is_writable(PAGE_EXECUTE_WRITECOPY));
        assert!(!is_writable(PAGE_READONLY));
        assert!(!is_writable(PAGE_EXECUTE_READ));
        assert!(!is_writable(PAGE_READWRITE | PAGE_GUARD));

        assert!(is_executable(PAGE_EXECUTE));
        assert!(is_executable(PAGE_EXECUTE_READWRITE));
        assert!(!is_executable(PAGE_READWRITE));
        assert!(!is_executable(PAGE_NOACCESS));
    }

    #[test]
    fn protection_labels_include_modifiers() {
        assert_eq!(protection_label(PAGE_READWRITE), "READWRITE");
        assert_eq!(protection_label(PAGE_EXECUTE_READ), "EXECUTE_READ");
        assert_eq!(
            protection_label(PAGE_READONLY | PAGE_GUARD),
            "READONLY+GUARD"
        );
        assert_eq!(protection_label(0), "UNKNOWN");
    }

    #[test]
    fn committed_state_gates_scanning() {
        assert!(region(MEM_COMMIT, PAGE_READWRITE).is_committed());
        assert!(!region(MEM_RESERVE, PAGE_READWRITE).is_committed());
        assert!(!region(MEM_FREE, 0).is_committed());
    }

    #[test]
    fn region_bounds_are_half_open() {
        let r = region(MEM_COMMIT, PAGE_READWRITE);
        assert_eq!(r.end(), 0x3000);
        assert!(r.contains(0x1000));
        assert!(r.contains(0x2FFF));
        assert!(!r.contains(0x3000));
        assert!(!r.contains(0x0FFF));
    }

    #[test]
    fn protection_choices_map_to_page_constants() {
        assert_eq!(ProtectionChoice::NoAccess.as_raw(), PAGE_NOACCESS);
        assert_eq!(ProtectionChoice::ReadWrite.as_raw(), PAGE_READWRITE);
        assert_eq!(
            ProtectionChoice::ExecuteReadWrite.as_raw(),
            PAGE_EXECUTE_READWRITE
        );
        assert_eq!(
            protection_label(ProtectionChoice::ExecuteRead.as_raw()),
            "EXECUTE_READ"
        );
    }

    #[test]
    fn region_end_saturates_at_address_space_limit() {
        let mut r = region(MEM_COMMIT, PAGE_READWRITE);
        r.base_address = usize::MAX - 0x10;
        r.region_size = 0x100;
        assert_eq!(r.end(), usize::MAX);
    }

    #[cfg(windows)]
    #[test]
    fn walk_of_the_current_process_advances_monotonically() {
        use crate::process::{with_process, READ_ACCESS};

        let walked = with_process(std::process::id(), READ_ACCESS, |handle| {
            Ok(enumerate_regions(handle, MAX_REGIONS))
        })
        .expect("walk");

        assert!(!walked.is_empty());
        for pair in walked.windows(2) {
            assert!(pair[1].base_address >= pair[0].end());
        }
    }
}
