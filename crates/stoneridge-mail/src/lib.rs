//! Outbound-mail agent (spec §4.12): an HTTP `POST /email` service that
//! relays to the local SMTP server from a fixed `From` address.

pub mod form;
pub mod http;
pub mod relay;

pub use form::{parse_email_fields, EmailFields};
pub use relay::Relay;
