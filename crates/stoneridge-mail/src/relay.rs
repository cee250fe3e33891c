//! SMTP relay (spec §4.12: "forwards via the local SMTP relay from a fixed
//! `From` address"). Grounded on the upstream `sremailer` agent, which
//! hands the three form fields straight to a `stoneridge.sendmail` helper
//! not itself present in the available reference material; the send
//! semantics here (local unauthenticated relay, fixed sender) follow spec
//! §4.12's text directly.

use lettre::message::Mailbox;
use lettre::{Message, SmtpTransport, Transport};
use stoneridge_types::{Result, StoneRidgeError};

use crate::form::EmailFields;

/// A configured relay: the local SMTP host/port and the fixed sender
/// address every outgoing message is stamped with.
pub struct Relay {
    transport: SmtpTransport,
    from: Mailbox,
}

impl Relay {
    pub fn new(relay_host: &str, relay_port: u16, from_address: &str) -> Result<Self> {
        let from: Mailbox = from_address
            .parse()
            .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("invalid from address {from_address}: {e}")))?;
        let transport = SmtpTransport::builder_dangerous(relay_host).port(relay_port).build();
        Ok(Relay { transport, from })
    }

    /// Sends one message, building it from the decoded form fields.
    pub fn send(&self, fields: &EmailFields) -> Result<()> {
        let to: Mailbox = fields
            .to
            .parse()
            .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("invalid to address {}: {e}", fields.to)))?;
        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(fields.subject.clone())
            .body(fields.message.clone())
            .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("failed to build message: {e}")))?;
        self.transport
            .send(&message)
            .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("smtp send failed: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_from_address_is_rejected_at_construction() {
        let err = Relay::new("localhost", 25, "not-an-address");
        assert!(err.is_err());
    }

    #[test]
    fn invalid_to_address_is_rejected_before_send() {
        let relay = Relay::new("localhost", 25, "stoneridge@example.com").expect("valid from");
        let fields = EmailFields { to: "not-an-address".into(), subject: "s".into(), message: "m".into() };
        assert!(relay.send(&fields).is_err());
    }
}
