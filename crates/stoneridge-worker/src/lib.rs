//! Client worker (spec §4.8): turns one `(srid, netconfig)` assignment into
//! a staged subprocess pipeline, mirroring the upstream `srworker` agent.
//! Every stage is its own process (`stoneridge-process`), so a
//! wedged stage can be killed without taking the worker daemon down.
//!
//! Two-phase salvage (`archive_on_failure` / `cleaner_called`) is carried as
//! explicit fields on [`PipelineRun`] rather than ambient mutable state, so
//! the salvage policy below is visible at a glance from the struct alone.

pub mod archiver;
pub mod cleaner;
pub mod collator;
pub mod dnsupdater;
pub mod downloader;
pub mod infogatherer;
pub mod runner;
pub mod unpacker;
pub mod uploader;

use std::path::{Path, PathBuf};
use std::time::Duration;

use stoneridge_config::StoneRidgeConfig;
use stoneridge_types::request::{NetConfig, OperatingSystem};
use stoneridge_types::{Result, StoneRidgeError};

/// The per-run overlay (spec §4.1's `--runconfig`), written once by the
/// worker daemon before any stage subprocess runs and read back by every
/// stage through the same `[run]` table the upstream `run.ini` agent used.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub srid: String,
    pub netconfig: NetConfig,
    pub os: OperatingSystem,
    pub ldap: String,
    pub tstamp: i64,
    pub attempt: u32,
    pub work: PathBuf,
}

impl RunConfig {
    pub fn write_to(&self, path: &Path) -> std::io::Result<()> {
        let mut run = toml::value::Table::new();
        run.insert("srid".into(), self.srid.clone().into());
        run.insert("netconfig".into(), self.netconfig.as_str().into());
        run.insert("os".into(), self.os.as_str().into());
        run.insert("ldap".into(), self.ldap.clone().into());
        run.insert("tstamp".into(), self.tstamp.into());
        run.insert("attempt".into(), i64::from(self.attempt).into());
        run.insert("work".into(), self.work.display().to_string().into());

        let mut root = toml::value::Table::new();
        root.insert("run".into(), toml::Value::Table(run));
        let content = toml::to_string(&toml::Value::Table(root))
            .expect("RunConfig table is always serializable");
        std::fs::write(path, content)
    }
}

/// Read back the `work` directory a stage binary was handed via `--runconfig`.
pub fn work_dir_from(config: &StoneRidgeConfig) -> stoneridge_types::WorkDirectory {
    stoneridge_types::WorkDirectory {
        root: PathBuf::from(config.get_string("run", "work", ".")),
    }
}

pub fn netconfig_from(config: &StoneRidgeConfig) -> Result<NetConfig> {
    config.get_string("run", "netconfig", "broadband").parse()
}

pub fn os_from(config: &StoneRidgeConfig) -> Result<OperatingSystem> {
    config.get_string("run", "os", "linux").parse()
}

pub fn srid_from(config: &StoneRidgeConfig) -> String {
    config.get_string("run", "srid", "")
}

/// Paths (or bare names, resolved via `$PATH`) of the nine stage binaries
/// the worker shells out to.
#[derive(Debug, Clone)]
pub struct StageBinaries {
    pub downloader: String,
    pub unpacker: String,
    pub infogatherer: String,
    pub dnsupdater: String,
    pub runner: String,
    pub collator: String,
    pub uploader: String,
    pub archiver: String,
    pub cleaner: String,
}

impl Default for StageBinaries {
    fn default() -> Self {
        StageBinaries {
            downloader: "srdownloader".into(),
            unpacker: "srunpacker".into(),
            infogatherer: "srinfogatherer".into(),
            dnsupdater: "srdnsupdater".into(),
            runner: "srrunner".into(),
            collator: "srcollator".into(),
            uploader: "sruploader".into(),
            archiver: "srarchiver".into(),
            cleaner: "srcleaner".into(),
        }
    }
}

/// Arguments shared by every stage invocation: the static config file and
/// the per-run overlay written by the worker before the pipeline starts.
pub struct StageArgs<'a> {
    pub config_path: &'a Path,
    pub runconfig_path: &'a Path,
    pub logdir: &'a Path,
    pub workdir: &'a Path,
    pub timeout: Duration,
}

/// Drives the ten stage invocations for one `(srid, netconfig)` run, with
/// the upstream agent's two-phase salvage policy: the first stage failure
/// while `archive_on_failure` is still set triggers one best-effort
/// `archiver` run, followed by one best-effort `cleaner` run, before the
/// original error is propagated.
pub struct PipelineRun {
    pub srid: String,
    pub netconfig: NetConfig,
    pub archive_on_failure: bool,
    pub cleaner_called: bool,
    procno: u32,
    pub childlog: Option<PathBuf>,
}

impl PipelineRun {
    pub fn new(srid: String, netconfig: NetConfig) -> Self {
        PipelineRun {
            srid,
            netconfig,
            archive_on_failure: true,
            cleaner_called: false,
            procno: 1,
            childlog: None,
        }
    }

    fn run_process(
        &mut self,
        binaries: &StageBinaries,
        args: &StageArgs,
        binary: &str,
        stage: &str,
        extra_args: &[&str],
    ) -> Result<()> {
        let log_path = args
            .logdir
            .join(format!("{:02}_{stage}_{}.log", self.procno, self.netconfig.as_str()));
        self.procno += 1;

        let config_str = args.config_path.to_string_lossy().into_owned();
        let runconfig_str = args.runconfig_path.to_string_lossy().into_owned();
        let mut invocation: Vec<&str> = vec!["--config", &config_str, "--runconfig", &runconfig_str];
        invocation.extend_from_slice(extra_args);

        match stoneridge_process::run_stage(stage, binary, &invocation, args.workdir, &log_path, args.timeout) {
            Ok(_) => Ok(()),
            Err(e) => {
                self.childlog = Some(log_path);
                if self.archive_on_failure {
                    self.archive_on_failure = false;
                    let _ = self.run_process(binaries, args, &binaries.archiver, "archiver", &[]);
                }
                if !self.cleaner_called {
                    self.cleaner_called = true;
                    let _ = self.run_process(binaries, args, &binaries.cleaner, "cleaner", &[]);
                }
                Err(e)
            }
        }
    }

    /// Run the full ten-stage pipeline (`dnsupdater` runs twice: once to
    /// point DNS at the netconfig's server, once with `--restore`).
    pub fn run_test(&mut self, binaries: &StageBinaries, args: &StageArgs) -> Result<()> {
        self.run_process(binaries, args, &binaries.downloader, "downloader", &[])?;
        self.run_process(binaries, args, &binaries.unpacker, "unpacker", &[])?;
        self.run_process(binaries, args, &binaries.infogatherer, "infogatherer", &[])?;
        self.run_process(binaries, args, &binaries.dnsupdater, "dnsupdater", &[])?;
        self.run_process(binaries, args, &binaries.runner, "runner", &[])?;
        self.run_process(binaries, args, &binaries.dnsupdater, "dnsupdater", &["--restore"])?;
        self.run_process(binaries, args, &binaries.collator, "collator", &[])?;
        self.run_process(binaries, args, &binaries.uploader, "uploader", &[])?;

        self.archive_on_failure = false;
        self.run_process(binaries, args, &binaries.archiver, "archiver", &[])?;

        self.cleaner_called = true;
        self.run_process(binaries, args, &binaries.cleaner, "cleaner", &[])?;

        Ok(())
    }
}
