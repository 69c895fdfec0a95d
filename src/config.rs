use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Default step used for instant queries and range queries that don't
/// specify one explicitly.
pub const DEFAULT_STEP_MS: i64 = 5 * 60 * 1000;

/// Default page size for label index postings, per `spec.md` §4.4.
pub const DEFAULT_PAGE_SIZE_BYTES: usize = 4096;

/// Documented fan-out of the label index's B-tree map (`spec.md` §3). Rust's
/// `std::collections::BTreeMap` manages its own node capacity and doesn't
/// expose this as a tunable; the constant exists so the contract stays
/// visible even though nothing reads it at runtime.
pub const BTREE_FANOUT: usize = 200;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Step applied to a range query when the caller doesn't supply one.
    pub default_step_ms: i64,

    /// Maximum accepted query text length in bytes. Zero means unlimited.
    pub max_query_length: usize,

    /// How far back a vector selector with no explicit range may look for
    /// its most recent sample (mirrors Prometheus's lookback delta).
    pub lookback_delta_ms: i64,

    /// Fixed size of each posting bitmap page.
    pub page_size_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_step_ms: DEFAULT_STEP_MS,
            max_query_length: 0,
            lookback_delta_ms: 5 * 60 * 1000,
            page_size_bytes: DEFAULT_PAGE_SIZE_BYTES,
        }
    }
}

static GLOBAL_SETTINGS: OnceLock<Settings> = OnceLock::new();

/// Returns the process-wide settings, initializing them from defaults
/// overridden by environment variables on first access.
pub fn settings() -> &'static Settings {
    GLOBAL_SETTINGS.get_or_init(Settings::from_env)
}

impl Settings {
    fn from_env() -> Self {
        let mut settings = Settings::default();
        if let Some(v) = get_setting_from_env::<i64>("PROMQL_DEFAULT_STEP_MS") {
            settings.default_step_ms = v;
        }
        if let Some(v) = get_setting_from_env::<usize>("PROMQL_MAX_QUERY_LENGTH") {
            settings.max_query_length = v;
        }
        if let Some(v) = get_setting_from_env::<i64>("PROMQL_LOOKBACK_DELTA_MS") {
            settings.lookback_delta_ms = v;
        }
        settings
    }
}

fn get_setting_from_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse::<T>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let s = Settings::default();
        assert_eq!(s.page_size_bytes, 4096);
        assert_eq!(s.default_step_ms, DEFAULT_STEP_MS);
    }
}
