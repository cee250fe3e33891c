//! Hierarchical configuration and run-identity for stoneridge (spec §4.1).
//!
//! Configuration is the union of a static, process-wide file and an
//! optional per-run overlay. Reads go through a typed `(section, option)`
//! accessor with a caller-supplied default; nothing is read at import time.
//! Process-wide mutable state is limited to three once-set caches, carried
//! explicitly on a [`RunContext`] rather than as true globals, so every
//! function that needs them takes one as an argument instead of reaching
//! for a global.

pub mod daemon;
pub mod layered;
pub mod runtime;

pub use daemon::{init_logging, DaemonArgs, PidfileGuard};
pub use layered::StoneRidgeConfig;
pub use runtime::RunContext;
