//! Pattern scanner over the committed, readable slice of a process.

use crate::config;
use crate::memory;
use crate::nt::HANDLE;
use crate::pattern::{self, PatternSpec};
use crate::regions;

/// What a scan saw: matches in ascending address order, whether the result
/// cap cut the scan short, and how the region walk went.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub matches: Vec<u64>,
    pub limited: bool,
    pub regions_scanned: usize,
    pub regions_skipped: usize,
}

/// Walks the target's regions and searches every committed readable one.
///
/// Regions larger than the configured cap are skipped, and a region whose
/// contents cannot be read is skipped rather than failing the scan.
pub fn scan_pattern(handle: HANDLE, spec: &PatternSpec, max_results: usize) -> ScanOutcome {
    let region_cap = config::scan_region_cap_bytes();
    let mut outcome = ScanOutcome {
        matches: Vec::new(),
        limited: false,
        regions_scanned: 0,
        regions_skipped: 0,
    };

    for region in regions::enumerate_regions(handle, regions::MAX_REGIONS) {
        if !region.is_committed() || !regions::is_readable(region.protect) {
            continue;
        }
        if region.region_size as u64 > region_cap {
            outcome.regions_skipped += 1;
            continue;
        }

        let data = match memory::read_region(handle, region.base_address as u64, region.region_size)
        {
            Some(d) if d.len() >= spec.len() => d,
            _ => {
                outcome.regions_skipped += 1;
                continue;
            }
        };

        outcome.regions_scanned += 1;
        let capped = pattern::find_in_slice(
            spec,
            &data,
            region.base_address as u64,
            max_results,
            &mut outcome.matches,
        );
        if capped {
            outcome.limited = true;
            break;
        }
    }

    crate::trace_log!(
        "[SCAN] {} matches across {} regions ({} skipped)",
        outcome.matches.len(),
        outcome.regions_scanned,
        outcome.regions_skipped
    );

    outcome
}
