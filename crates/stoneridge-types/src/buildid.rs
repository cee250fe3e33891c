//! Buildid suffixing (spec §4.1, §8 "Buildid uniqueness").
//!
//! A build installed under more than one (OS, netconfig) pair needs a
//! globally-unique buildid downstream, within a 16-character limit. We
//! truncate the original to 14 characters and append a 2-character suffix
//! drawn from a 3x3 closed set, and keep the original alongside for audit.

use crate::request::{NetConfig, OperatingSystem};

/// A buildid derived from an original, made unique for one (os, netconfig) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildId {
    pub original: String,
    pub id: String,
}

impl BuildId {
    /// Derive a unique buildid for `(os, netconfig)`. Returns `None` if the
    /// original is malformed in a way that would defeat uniqueness — callers
    /// must treat an empty suffix as "do not fabricate a unique id" (spec
    /// §4.1), which in this typed API we model by making the function total
    /// over valid `OperatingSystem`/`NetConfig` values and simply never
    /// producing an empty suffix for them.
    pub fn derive(original: &str, os: OperatingSystem, netconfig: NetConfig) -> BuildId {
        let truncated = truncate_chars(original, 14);
        let id = format!("{truncated}{}{}", os.letter(), netconfig.digit());
        BuildId {
            original: original.to_string(),
            id,
        }
    }
}

fn truncate_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_spec_example() {
        let b = BuildId::derive("20200101120000", OperatingSystem::Mac, NetConfig::Umts);
        assert_eq!(b.id, "20200101120000m1");
        assert_eq!(b.id.len(), 16);
        assert_eq!(b.original, "20200101120000");
    }

    #[test]
    fn truncates_long_originals_to_fit_16_chars() {
        let b = BuildId::derive(
            "2020010112000099999",
            OperatingSystem::Linux,
            NetConfig::Gsm,
        );
        assert_eq!(b.id.len(), 16);
        assert!(b.id.starts_with("20200101120000"));
        assert!(b.id.ends_with("l2"));
    }

    #[test]
    fn suffix_injective_over_nine_pairs() {
        use std::collections::HashSet;
        let mut suffixes = HashSet::new();
        for os in OperatingSystem::all() {
            for nc in NetConfig::all() {
                let suffix = format!("{}{}", os.letter(), nc.digit());
                assert!(suffixes.insert(suffix), "suffix collision for {os:?}/{nc:?}");
            }
        }
        assert_eq!(suffixes.len(), 9);
    }

    proptest::proptest! {
        #[test]
        fn always_at_most_16_chars(original in ".{0,64}") {
            for os in OperatingSystem::all() {
                for nc in NetConfig::all() {
                    let b = BuildId::derive(&original, os, nc);
                    assert!(b.id.chars().count() <= 16);
                }
            }
        }
    }
}
