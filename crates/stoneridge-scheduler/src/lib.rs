//! Per-netconfig scheduler (spec §4.7), mirroring the upstream `srscheduler`
//! agent. One instance per netconfig; holds no state beyond the
//! netconfig it was started for. Design note: fan-out is
//! fire-and-forget (`QueueWriter::publish`), not the source's
//! `RpcCaller`-style synchronous call — see the Open Question decision in
//! DESIGN.md.

use serde::{Deserialize, Serialize};
use stoneridge_bus::QueueWriter;
use stoneridge_types::request::{NetConfig, OperatingSystem};
use stoneridge_types::{Result, StoneRidgeError};

/// Message consumed from a netconfig's incoming queue (matches
/// [`stoneridge_master::FanoutMessage`] without depending on that crate
/// directly — the scheduler only cares about the wire shape).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub srid: String,
    pub operating_systems: Vec<OperatingSystem>,
    pub tstamp: i64,
    pub ldap: String,
}

/// Message published to a per-OS client queue (spec §4.7: `{srid,
/// netconfig, tstamp, ldap}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientMessage {
    pub srid: String,
    pub netconfig: NetConfig,
    pub tstamp: i64,
    pub ldap: String,
}

/// Fan one incoming message out to every requested OS's client queue.
pub fn dispatch(message: &IncomingMessage, netconfig: NetConfig, bus: &dyn QueueWriter) -> Result<()> {
    for os in &message.operating_systems {
        let client_message = ClientMessage {
            srid: message.srid.clone(),
            netconfig,
            tstamp: message.tstamp,
            ldap: message.ldap.clone(),
        };
        let body = serde_json::to_vec(&client_message)
            .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("failed to serialize client message: {e}")))?;
        bus.publish(os.queue_name(), &body)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use stoneridge_bus::LoopbackBus;

    #[test]
    fn fans_out_to_every_requested_os_queue() {
        let bus = LoopbackBus::new();
        let message = IncomingMessage {
            srid: "nightly-1".into(),
            operating_systems: vec![OperatingSystem::Linux, OperatingSystem::Mac],
            tstamp: 1_700_000_000,
            ldap: String::new(),
        };
        dispatch(&message, NetConfig::Umts, &bus).unwrap();

        assert_eq!(bus.len(OperatingSystem::Linux.queue_name()), 1);
        assert_eq!(bus.len(OperatingSystem::Mac.queue_name()), 1);
        assert!(bus.is_empty(OperatingSystem::Windows.queue_name()));
    }

    #[test]
    fn holds_no_state_beyond_the_netconfig_argument() {
        let bus = LoopbackBus::new();
        let message = IncomingMessage {
            srid: "a".into(),
            operating_systems: vec![OperatingSystem::Windows],
            tstamp: 1,
            ldap: "alice".into(),
        };
        dispatch(&message, NetConfig::Gsm, &bus).unwrap();
        dispatch(&message, NetConfig::Broadband, &bus).unwrap();
        assert_eq!(bus.len(OperatingSystem::Windows.queue_name()), 2);
    }
}
