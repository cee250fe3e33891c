//! Submission CLI (spec §6): `srpush --netconfig ... --os ... <sha>` POSTs a
//! run request to the intake endpoint and prints the assigned SRID.

use std::path::PathBuf;

use clap::Parser;
use stoneridge_cli::credentials;
use stoneridge_config::StoneRidgeConfig;

#[derive(Parser, Debug)]
#[command(name = "srpush", version)]
#[command(about = "Submit a stoneridge try run")]
struct Cli {
    /// Revision to build and test. Must be at least 12 characters.
    sha: String,

    /// Network link(s) to run under: broadband, umts, gsm, or all. Repeatable.
    #[arg(long = "netconfig", required = true)]
    netconfigs: Vec<String>,

    /// Operating system(s) to run on: linux, mac, windows, or all. Repeatable.
    #[arg(long = "os", required = true)]
    operating_systems: Vec<String>,

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

fn expand(values: &[String], all: &[&str]) -> Vec<String> {
    if values.iter().any(|v| v == "all") {
        all.iter().map(|s| s.to_string()).collect()
    } else {
        values.to_vec()
    }
}

fn main() {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    if cli.sha.len() < 12 {
        tracing::error!("sha must be at least 12 characters");
        std::process::exit(1);
    }

    let config = StoneRidgeConfig::load(&cli.config).ok();
    let creds = match credentials::resolve(config.as_ref(), cli.host.clone(), cli.ldap.clone()) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "failed to resolve credentials");
            std::process::exit(1);
        }
    };

    let netconfigs = expand(&cli.netconfigs, &["broadband", "umts", "gsm"]);
    let operating_systems = expand(&cli.operating_systems, &["linux", "mac", "windows"]);

    let mut form: Vec<(&str, String)> = vec![("sha", cli.sha.clone())];
    for n in &netconfigs {
        form.push(("netconfig", n.clone()));
    }
    for o in &operating_systems {
        form.push(("operating_system", o.clone()));
    }

    let client = reqwest::blocking::Client::new();
    let url = format!("https://{}/srpush", creds.host);
    let response = client
        .post(&url)
        .basic_auth(&creds.ldap, Some(&creds.password))
        .form(&form)
        .send();

    match response {
        Ok(resp) if resp.status().is_success() => match resp.text() {
            Ok(srid) => println!("{srid}"),
            Err(e) => {
                tracing::error!(error = %e, "failed to read response body");
                std::process::exit(1);
            }
        },
        Ok(resp) => {
            tracing::error!(status = %resp.status(), "submission rejected");
            std::process::exit(1);
        }
        Err(e) => {
            tracing::error!(error = %e, "submission request failed");
            std::process::exit(1);
        }
    }
}
