//! Intake pull CLI (spec §6): drains `stoneridge-intake`'s unhandled-push
//! ledger, marking each entry handled before enqueuing it on the `intake`
//! queue. A marking-handled failure aborts the cycle so a later retry
//! cannot double-enqueue the same push.

use std::path::PathBuf;
use std::str::FromStr;

use clap::Parser;
use serde::Deserialize;

use stoneridge_bus::{AmqpBus, QueueWriter};
use stoneridge_cli::credentials;
use stoneridge_config::StoneRidgeConfig;
use stoneridge_types::request::{NetConfig, OperatingSystem, RunRequest};

const INTAKE_QUEUE: &str = "intake";

#[derive(Parser, Debug)]
#[command(name = "srenqueuer", version)]
#[command(about = "Drain stoneridge-intake's pending-push ledger onto the intake queue")]
struct Cli {
    /// Intake host (falls back to config / env / prompt).
    #[arg(long)]
    host: Option<String>,

    /// LDAP username (falls back to config / env / prompt).
    #[arg(long)]
    ldap: Option<String>,

    /// Path to the layered config file.
    #[arg(long, default_value = "stoneridge.toml")]
    config: PathBuf,
}

#[derive(Debug, Deserialize)]
struct PendingPush {
    pushid: i64,
    ldap: String,
    sha: String,
    netconfigs: Vec<String>,
    operating_systems: Vec<String>,
    srid: String,
}

fn main() {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let config = StoneRidgeConfig::load(&cli.config).ok();
    let creds = match credentials::resolve(config.as_ref(), cli.host.clone(), cli.ldap.clone()) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "failed to resolve credentials");
            std::process::exit(1);
        }
    };

    let bus_url = config
        .as_ref()
        .map(|c| c.get_string("bus", "url", "amqp://127.0.0.1:5672"))
        .unwrap_or_else(|| "amqp://127.0.0.1:5672".to_string());
    let bus = match AmqpBus::connect(&bus_url) {
        Ok(b) => b,
        Err(e) => {
            tracing::error!(error = %e, "failed to connect to bus");
            std::process::exit(1);
        }
    };

    let client = reqwest::blocking::Client::new();
    let pushes: Vec<PendingPush> = match client
        .get(format!("https://{}/list_unhandled", creds.host))
        .basic_auth(&creds.ldap, Some(&creds.password))
        .send()
        .and_then(|r| r.error_for_status())
        .and_then(|r| r.json())
    {
        Ok(pushes) => pushes,
        Err(e) => {
            tracing::error!(error = %e, "failed to list unhandled pushes");
            std::process::exit(1);
        }
    };

    let mut enqueued = 0;
    for push in pushes {
        let mark_result = client
            .post(format!("https://{}/mark_handled", creds.host))
            .basic_auth(&creds.ldap, Some(&creds.password))
            .form(&[("id", push.pushid.to_string())])
            .send()
            .and_then(|r| r.error_for_status());

        if let Err(e) = mark_result {
            tracing::error!(error = %e, pushid = push.pushid, "failed to mark push handled, aborting cycle");
            std::process::exit(1);
        }

        match to_run_request(&push) {
            Ok(request) => match serde_json::to_vec(&request).map(|body| bus.publish(INTAKE_QUEUE, &body)) {
                Ok(Ok(())) => enqueued += 1,
                Ok(Err(e)) | Err(e) => {
                    tracing::error!(error = ?e, pushid = push.pushid, "failed to enqueue marked push");
                }
            },
            Err(e) => {
                tracing::error!(error = %e, pushid = push.pushid, "skipping malformed pending push");
            }
        }
    }

    tracing::info!(enqueued, "srenqueuer cycle complete");
}

fn to_run_request(push: &PendingPush) -> anyhow::Result<RunRequest> {
    let netconfigs = push
        .netconfigs
        .iter()
        .map(|s| NetConfig::from_str(s))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| anyhow::anyhow!(e))?;
    let operating_systems = push
        .operating_systems
        .iter()
        .map(|s| OperatingSystem::from_str(s))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| anyhow::anyhow!(e))?;

    Ok(RunRequest {
        srid: push.srid.clone(),
        nightly: false,
        ldap: push.ldap.clone(),
        sha: push.sha.clone(),
        operating_systems,
        netconfigs,
        attempt: 1,
        tstamp: None,
    })
}
