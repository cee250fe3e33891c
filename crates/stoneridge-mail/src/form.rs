//! `application/x-www-form-urlencoded` body decoding for the `/email`
//! endpoint, mirroring the upstream `sremailer` agent's three plain-string
//! handler fields.

/// The three fields the mail agent's handler reads off the submitted form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailFields {
    pub to: String,
    pub subject: String,
    pub message: String,
}

/// Decodes a form-urlencoded body into the three fields the mail agent
/// needs, defaulting any missing field to an empty string rather than
/// erroring.
pub fn parse_email_fields(body: &[u8]) -> EmailFields {
    let mut to = String::new();
    let mut subject = String::new();
    let mut message = String::new();
    for (key, value) in url::form_urlencoded::parse(body) {
        match key.as_ref() {
            "to" => to = value.into_owned(),
            "subject" => subject = value.into_owned(),
            "message" => message = value.into_owned(),
            _ => {}
        }
    }
    EmailFields { to, subject, message }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_three_fields() {
        let body = b"to=hurley%40mozilla.com&subject=DNS+sanity+check+failed&message=canary+did+not+resolve";
        let fields = parse_email_fields(body);
        assert_eq!(fields.to, "hurley@mozilla.com");
        assert_eq!(fields.subject, "DNS sanity check failed");
        assert_eq!(fields.message, "canary did not resolve");
    }

    #[test]
    fn missing_field_defaults_to_empty() {
        let fields = parse_email_fields(b"to=a%40b.com&subject=hi");
        assert_eq!(fields.to, "a@b.com");
        assert_eq!(fields.subject, "hi");
        assert_eq!(fields.message, "");
    }

    #[test]
    fn empty_body_yields_all_empty() {
        let fields = parse_email_fields(b"");
        assert_eq!(fields, EmailFields { to: String::new(), subject: String::new(), message: String::new() });
    }
}
