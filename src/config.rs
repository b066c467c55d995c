//! Environment-driven tunables for the engine.

const DEFAULT_REGION_CAP_BYTES: u64 = 1 << 30;
const DEFAULT_MAX_SCAN_RESULTS: u32 = 1000;

pub fn should_log() -> bool {
    if cfg!(debug_assertions) {
        return true;
    }

    static CACHED: std::sync::OnceLock<bool> = std::sync::OnceLock::new();
    *CACHED.get_or_init(|| std::env::var("TRACE_VERBOSE").is_ok())
}

/// Per-region byte ceiling for the pattern scanner. Regions larger than this
/// are skipped rather than read.
pub fn scan_region_cap_bytes() -> u64 {
    match parse_u32_key("SCAN_REGION_CAP_MB") {
        Some(mb) if mb > 0 => (mb as u64) << 20,
        _ => DEFAULT_REGION_CAP_BYTES,
    }
}

/// Default result cap for the pattern scanner when the caller does not pass one.
pub fn scan_max_results_default() -> usize {
    match parse_u32_key("SCAN_MAX_RESULTS") {
        Some(n) if n > 0 => n as usize,
        _ => DEFAULT_MAX_SCAN_RESULTS as usize,
    }
}

fn get_env_var(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn parse_u32_key(key: &str) -> Option<u32> {
    get_env_var(key).and_then(|v| v.parse::<u32>().ok())
}
