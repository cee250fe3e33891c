//! Shared CLI surface for every daemonised component (spec §6 "Daemon
//! CLI"): `--log <path>` plus a mutually exclusive `--nodaemon`/`--pidfile
//! <path>` pair. Flatten this into a binary's own `clap::Parser` struct
//! with `#[command(flatten)]`.
//!
//! Real fork/umask/close-all-fds daemonisation is out of scope here (the
//! harness expects to run under a service manager); `--pidfile` still
//! writes the pid so external tooling that polls it keeps working, and
//! `--nodaemon` is accepted purely for CLI compatibility with callers that
//! always pass one or the other.

use std::fs;
use std::path::{Path, PathBuf};

use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

#[derive(clap::Args, Debug, Default)]
#[group(multiple = false)]
pub struct DaemonArgs {
    /// Run attached to the terminal rather than writing a pidfile.
    #[arg(long)]
    pub nodaemon: bool,

    /// Write this process's pid here at startup, remove it on clean exit.
    #[arg(long)]
    pub pidfile: Option<PathBuf>,
}

/// RAII guard for `--pidfile`: present for the lifetime of `main`, deletes
/// the file on drop so a crash leaves behind a stale (and thus harmless)
/// pidfile rather than silently removing it before exit actually happens.
pub struct PidfileGuard(Option<PathBuf>);

impl DaemonArgs {
    /// Writes the current pid to `--pidfile` if given. The returned guard
    /// must be kept alive for the rest of `main`.
    pub fn install_pidfile(&self) -> anyhow::Result<PidfileGuard> {
        match &self.pidfile {
            Some(path) => {
                fs::write(path, std::process::id().to_string())?;
                Ok(PidfileGuard(Some(path.clone())))
            }
            None => Ok(PidfileGuard(None)),
        }
    }
}

impl Drop for PidfileGuard {
    fn drop(&mut self) {
        if let Some(path) = &self.0 {
            let _ = fs::remove_file(path);
        }
    }
}

/// Initializes the process-wide `tracing` subscriber: compact formatter to
/// stderr, plus a non-blocking file layer when `--log` is given. Filter
/// level comes from `RUST_LOG`, defaulting to `info`.
pub fn init_logging(log_path: Option<&Path>) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match log_path {
        Some(path) => {
            let file = fs::OpenOptions::new().create(true).append(true).open(path)?;
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(non_blocking.and(std::io::stderr))
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(env_filter).init();
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pidfile_guard_writes_then_removes_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("srtest.pid");
        let args = DaemonArgs { nodaemon: false, pidfile: Some(path.clone()) };

        let guard = args.install_pidfile().unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, std::process::id().to_string());

        drop(guard);
        assert!(!path.exists());
    }

    #[test]
    fn nodaemon_installs_no_pidfile() {
        let args = DaemonArgs { nodaemon: true, pidfile: None };
        let guard = args.install_pidfile().unwrap();
        drop(guard);
    }
}
