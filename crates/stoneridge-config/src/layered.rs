//! Layered TOML configuration: a process-wide static file, optionally
//! overlaid by a per-run file, read through a typed `(section, option)`
//! accessor (spec §4.1). A section/option map rather than a single typed
//! struct, since stoneridge's config surface is read by many independent
//! components that each only care about a handful of keys.

use std::path::Path;

use anyhow::{Context, Result};
use toml::Value;

/// The truthy set a boolean accessor recognizes, case-insensitively (spec §4.1).
const TRUTHY: &[&str] = &["y", "yes", "t", "true", "ok", "1"];

/// An immutable composition of two layered maps: the base config always
/// wins for keys it does not define, but an overlay value takes priority
/// wherever present. Never mutated in place after construction (REDESIGN
/// FLAGS §9).
#[derive(Debug, Clone)]
pub struct StoneRidgeConfig {
    base: Value,
    overlay: Option<Value>,
}

impl Default for StoneRidgeConfig {
    fn default() -> Self {
        StoneRidgeConfig {
            base: Value::Table(Default::default()),
            overlay: None,
        }
    }
}

impl StoneRidgeConfig {
    /// Load the process-wide static config file.
    pub fn load(path: &Path) -> Result<Self> {
        let base = load_toml(path)?;
        Ok(StoneRidgeConfig { base, overlay: None })
    }

    /// Load the static config file and layer a per-run overlay file on top.
    pub fn load_with_overlay(path: &Path, overlay_path: &Path) -> Result<Self> {
        let base = load_toml(path)?;
        let overlay = load_toml(overlay_path)?;
        Ok(StoneRidgeConfig {
            base,
            overlay: Some(overlay),
        })
    }

    /// Construct directly from an already-parsed base value, with no
    /// overlay. Useful for tests and for in-process composition.
    pub fn from_value(base: Value) -> Self {
        StoneRidgeConfig { base, overlay: None }
    }

    fn lookup(&self, section: &str, option: &str) -> Option<&Value> {
        if let Some(overlay) = &self.overlay
            && let Some(v) = lookup_in(overlay, section, option)
        {
            return Some(v);
        }
        lookup_in(&self.base, section, option)
    }

    pub fn get_string(&self, section: &str, option: &str, default: &str) -> String {
        self.lookup(section, option)
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| default.to_string())
    }

    pub fn get_int(&self, section: &str, option: &str, default: i64) -> i64 {
        self.lookup(section, option)
            .and_then(Value::as_integer)
            .unwrap_or(default)
    }

    pub fn get_bool(&self, section: &str, option: &str, default: bool) -> bool {
        match self.lookup(section, option) {
            None => default,
            Some(Value::Boolean(b)) => *b,
            Some(Value::String(s)) => TRUTHY.contains(&s.to_lowercase().as_str()),
            Some(_) => default,
        }
    }
}

fn lookup_in<'a>(value: &'a Value, section: &str, option: &str) -> Option<&'a Value> {
    value.get(section)?.get(option)
}

fn load_toml(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("failed to parse config file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> StoneRidgeConfig {
        let toml = r#"
            [stoneridge]
            work = "/srv/stoneridge/work"
            unittest = "yes"

            [machine]
            firefox_path = "firefox"
        "#;
        StoneRidgeConfig::from_value(toml.parse().unwrap())
    }

    #[test]
    fn missing_value_returns_default() {
        let cfg = base();
        assert_eq!(cfg.get_string("stoneridge", "missing", "fallback"), "fallback");
    }

    #[test]
    fn present_value_overrides_default() {
        let cfg = base();
        assert_eq!(cfg.get_string("machine", "firefox_path", "x"), "firefox");
    }

    #[test]
    fn truthy_set_is_case_insensitive() {
        let cfg = base();
        assert!(cfg.get_bool("stoneridge", "unittest", false));
    }

    #[test]
    fn overlay_wins_over_base() {
        let base: Value = r#"
            [run]
            netconfig = "broadband"
        "#
        .parse()
        .unwrap();
        let overlay: Value = r#"
            [run]
            netconfig = "gsm"
        "#
        .parse()
        .unwrap();
        let cfg = StoneRidgeConfig {
            base,
            overlay: Some(overlay),
        };
        assert_eq!(cfg.get_string("run", "netconfig", ""), "gsm");
    }

    #[test]
    fn overlay_falls_back_to_base_for_unset_keys() {
        let base: Value = r#"
            [run]
            srid = "abc-123"
            netconfig = "broadband"
        "#
        .parse()
        .unwrap();
        let overlay: Value = r#"
            [run]
            netconfig = "gsm"
        "#
        .parse()
        .unwrap();
        let cfg = StoneRidgeConfig {
            base,
            overlay: Some(overlay),
        };
        assert_eq!(cfg.get_string("run", "srid", ""), "abc-123");
    }
}
