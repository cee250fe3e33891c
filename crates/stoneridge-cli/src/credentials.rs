//! Credential resolution for the submission CLIs (spec §6: "reads
//! credentials from a config file / env vars / interactive prompt").
//! Precedence, highest first: explicit CLI flag, environment variable,
//! config file, interactive prompt.

use std::io::Write as _;

use stoneridge_config::StoneRidgeConfig;
use stoneridge_types::{Result, StoneRidgeError};

pub struct Credentials {
    pub host: String,
    pub ldap: String,
    pub password: String,
}

pub fn resolve(
    config: Option<&StoneRidgeConfig>,
    cli_host: Option<String>,
    cli_ldap: Option<String>,
) -> Result<Credentials> {
    let host = cli_host
        .or_else(|| std::env::var("STONERIDGE_HOST").ok())
        .or_else(|| config.map(|c| c.get_string("push", "host", "")))
        .filter(|s| !s.is_empty())
        .map_or_else(|| prompt_line("host: "), Ok)?;

    let ldap = cli_ldap
        .or_else(|| std::env::var("STONERIDGE_LDAP").ok())
        .or_else(|| config.map(|c| c.get_string("push", "ldap", "")))
        .filter(|s| !s.is_empty())
        .map_or_else(|| prompt_line("ldap: "), Ok)?;

    let password = std::env::var("STONERIDGE_PASSWORD")
        .ok()
        .filter(|s| !s.is_empty())
        .map_or_else(|| rpassword::prompt_password("password: ").map_err(prompt_error), Ok)?;

    Ok(Credentials { host, ldap, password })
}

fn prompt_line(prompt: &str) -> Result<String> {
    print!("{prompt}");
    std::io::stdout().flush().map_err(prompt_error)?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line).map_err(prompt_error)?;
    Ok(line.trim().to_string())
}

fn prompt_error(e: std::io::Error) -> StoneRidgeError {
    StoneRidgeError::Other(anyhow::anyhow!("reading credentials: {e}"))
}
