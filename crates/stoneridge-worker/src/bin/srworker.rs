//! Client worker daemon (spec §4.8): consumes `ClientMessage`s off this
//! machine's OS queue and drives the ten-stage pipeline for each one.
//! Adapted from the upstream `srworker` agent main loop; a pipeline
//! failure is logged, never propagated back to the bus, since the two-phase
//! salvage inside [`PipelineRun`] has already done everything recoverable.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use serde::Deserialize;
use stoneridge_bus::{AmqpBus, QueueListener};
use stoneridge_config::StoneRidgeConfig;
use stoneridge_types::request::{NetConfig, OperatingSystem};
use stoneridge_types::WorkDirectory;
use stoneridge_worker::{PipelineRun, RunConfig, StageArgs, StageBinaries};

#[derive(Parser, Debug)]
#[command(name = "srworker", version)]
struct Cli {
    #[arg(long, default_value = "stoneridge.toml")]
    config: PathBuf,
    #[arg(long)]
    os: OperatingSystem,

    /// Append tracing output to this file in addition to stderr.
    #[arg(long)]
    log: Option<PathBuf>,

    #[command(flatten)]
    daemon: stoneridge_config::DaemonArgs,
}

/// Wire shape published by the scheduler onto a per-OS client queue (spec
/// §4.7), mirrored here rather than depending on `stoneridge-scheduler`.
#[derive(Debug, Clone, Deserialize)]
struct ClientMessage {
    srid: String,
    netconfig: NetConfig,
    tstamp: i64,
    ldap: String,
}

fn main() {
    let cli = Cli::parse();
    let _log_guard = stoneridge_config::init_logging(cli.log.as_deref()).expect("failed to init logging");
    let _pidfile_guard = cli.daemon.install_pidfile().expect("failed to install pidfile");

    let config = match StoneRidgeConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "failed to load config");
            std::process::exit(1);
        }
    };

    let bus_url = config.get_string("bus", "url", "amqp://127.0.0.1:5672");
    let work_root = PathBuf::from(config.get_string("stoneridge", "work", "/var/stoneridge/work"));
    let logdir_name = config.get_string("stoneridge", "logdir", "logs");
    let timeout_secs = config.get_int("stoneridge", "stage_timeout_secs", 300).max(1) as u64;
    let firefox_path = config.get_string("machine", "firefox_path", "firefox");

    let bus = match AmqpBus::connect(&bus_url) {
        Ok(b) => b,
        Err(e) => {
            tracing::error!(error = %e, "failed to connect to bus");
            std::process::exit(1);
        }
    };

    let queue = cli.os.queue_name();
    let mut should_stop = || false;
    let config_path = cli.config.clone();

    let result = bus.run(queue, &mut should_stop, &mut |body| {
        let message: ClientMessage = match serde_json::from_slice(body) {
            Ok(m) => m,
            Err(e) => {
                tracing::error!(error = %e, "dropping malformed client message");
                return Ok(());
            }
        };
        tracing::info!(srid = %message.srid, netconfig = %message.netconfig.as_str(), "starting run");

        let work_dir = WorkDirectory::resolve(&work_root, &message.srid, message.netconfig, message.tstamp);
        if let Err(e) = work_dir.create(&firefox_path) {
            tracing::error!(srid = %message.srid, error = %e, "failed to create work directory");
            return Ok(());
        }

        let run_config = RunConfig {
            srid: message.srid.clone(),
            netconfig: message.netconfig,
            os: cli.os,
            ldap: message.ldap.clone(),
            tstamp: message.tstamp,
            attempt: 0,
            work: work_dir.root.clone(),
        };
        let runconfig_path = work_dir.root.join("run.toml");
        if let Err(e) = run_config.write_to(&runconfig_path) {
            tracing::error!(srid = %message.srid, error = %e, "failed to write run overlay");
            return Ok(());
        }

        let logdir = work_dir.out_dir().join(&logdir_name);
        if let Err(e) = std::fs::create_dir_all(&logdir) {
            tracing::error!(srid = %message.srid, error = %e, "failed to create log directory");
            return Ok(());
        }

        let args = StageArgs {
            config_path: &config_path,
            runconfig_path: &runconfig_path,
            logdir: &logdir,
            workdir: &work_dir.root,
            timeout: Duration::from_secs(timeout_secs),
        };
        let binaries = StageBinaries::default();
        let mut run = PipelineRun::new(message.srid.clone(), message.netconfig);
        if let Err(e) = run.run_test(&binaries, &args) {
            tracing::error!(srid = %message.srid, error = %e, "pipeline failed, salvage already attempted");
        } else {
            tracing::info!(srid = %message.srid, "run complete");
        }

        // Always ack: the pipeline's own salvage logic already did
        // everything recoverable, and the run isn't worth retrying as-is.
        Ok(())
    });

    if let Err(e) = result {
        tracing::error!(error = %e, "worker listener exited");
        std::process::exit(1);
    }
}
