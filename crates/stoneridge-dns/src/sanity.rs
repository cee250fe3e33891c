//! DNS sanity check and ARP priming (spec §9/§10 supplements, grounded on
//! the upstream `srdnscheck` agent/`srarpfixer`). Invoked by the
//! client worker's `dnsupdater` stage immediately after a successful
//! `set_dns` exchange, never by the agent itself.

use std::net::ToSocketAddrs;
use std::process::Command;

use stoneridge_types::{Result, StoneRidgeError};

/// Identifies the run a sanity-check failure email is reported against.
pub struct RunContext<'a> {
    pub os: &'a str,
    pub netconfig: &'a str,
    pub srid: &'a str,
}

/// Resolves `canary_host` and checks the result falls in (or out of, per
/// `expect_private`) the 172.16/12 StoneRidge private range. On mismatch or
/// resolution failure, emails `mail_url` and returns an error, matching the
/// original's "send mail, exit 1" behavior (which aborts the pipeline stage).
pub fn sanity_check(
    canary_host: &str,
    expect_private: bool,
    mail_url: &str,
    ctx: &RunContext,
) -> Result<()> {
    let ip = match resolve_ipv4(canary_host) {
        Ok(ip) => ip,
        Err(e) => {
            notify_failure(mail_url, "gethostbyname", ctx);
            return Err(e);
        }
    };

    let private = in_stoneridge_private_range(ip);
    let check = if expect_private { "private" } else { "public" };
    if private != expect_private {
        notify_failure(mail_url, check, ctx);
        return Err(StoneRidgeError::DnsAgentUnreachable(format!(
            "dns sanity check '{check}' failed: {canary_host} resolved to {ip:?}"
        )));
    }

    Ok(())
}

fn resolve_ipv4(host: &str) -> Result<[u8; 4]> {
    (host, 0u16)
        .to_socket_addrs()
        .map_err(|e| StoneRidgeError::DnsAgentUnreachable(format!("resolving {host}: {e}")))?
        .find_map(|addr| match addr.ip() {
            std::net::IpAddr::V4(v4) => Some(v4.octets()),
            std::net::IpAddr::V6(_) => None,
        })
        .ok_or_else(|| StoneRidgeError::DnsAgentUnreachable(format!("{host} has no IPv4 address")))
}

fn in_stoneridge_private_range(ip: [u8; 4]) -> bool {
    ip[0] == 172 && (16..=31).contains(&ip[1])
}

fn notify_failure(mail_url: &str, check: &str, ctx: &RunContext) {
    let message = format!(
        "The DNS Update failed for the following run:\n\
         OS: {}\n\
         Netconfig: {}\n\
         SRID: {}\n\
         Check failed: {check}\n",
        ctx.os, ctx.netconfig, ctx.srid
    );
    if let Err(e) = send_mail(mail_url, "DNS Update Failed", &message) {
        tracing::error!(error = %e, "failed to send dns sanity check failure email");
    }
}

fn send_mail(mail_url: &str, subject: &str, message: &str) -> Result<()> {
    let client = reqwest::blocking::Client::new();
    let response = client
        .post(mail_url)
        .form(&[("to", "hurley@mozilla.com"), ("subject", subject), ("message", message)])
        .send()
        .map_err(|e| anyhow::anyhow!("posting to mail agent at {mail_url}: {e}"))?;
    if !response.status().is_success() {
        return Err(anyhow::anyhow!("mail agent returned {}", response.status()).into());
    }
    Ok(())
}

/// Pings `target_ip` once to force an ARP entry before traffic flows
/// (`srarpfixer`): best-effort, failures are logged but never fatal.
pub fn prime_arp(target_ip: &str) {
    let count_flag = if cfg!(target_os = "windows") { "-n" } else { "-c" };
    match Command::new("ping").args([count_flag, "1", target_ip]).output() {
        Ok(output) if !output.status.success() => {
            tracing::warn!(target_ip, status = ?output.status.code(), "arp priming ping failed");
        }
        Err(e) => {
            tracing::warn!(target_ip, error = %e, "could not spawn arp priming ping");
        }
        Ok(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_stoneridge_private_range_accepts_172_16_through_31() {
        assert!(in_stoneridge_private_range([172, 16, 0, 1]));
        assert!(in_stoneridge_private_range([172, 31, 255, 255]));
        assert!(!in_stoneridge_private_range([172, 32, 0, 1]));
        assert!(!in_stoneridge_private_range([10, 0, 0, 1]));
        assert!(!in_stoneridge_private_range([172, 15, 0, 1]));
    }

    #[test]
    fn resolve_ipv4_rejects_unresolvable_host() {
        let err = resolve_ipv4("this-host-should-not-exist.invalid").unwrap_err();
        assert!(matches!(err, StoneRidgeError::DnsAgentUnreachable(_)));
    }
}
