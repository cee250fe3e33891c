//! HTTP Basic auth against a flat `ldap = "token"` credentials file (spec
//! §4.3's `(ldap, token)` credential pair).

use std::collections::HashMap;
use std::path::Path;

use subtle::ConstantTimeEq;

use stoneridge_types::{Result, StoneRidgeError};

pub struct CredentialStore {
    tokens: HashMap<String, String>,
}

impl CredentialStore {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("reading {path:?}: {e}")))?;
        let tokens: HashMap<String, String> = toml::from_str(&text)
            .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("parsing {path:?}: {e}")))?;
        Ok(CredentialStore { tokens })
    }

    /// Constant-time in the token contents; the ldap lookup and length
    /// check are not, which matches ordinary Basic-auth practice (the
    /// ldap name is not a secret).
    pub fn verify(&self, ldap: &str, token: &str) -> bool {
        match self.tokens.get(ldap) {
            Some(expected) => bool::from(expected.as_bytes().ct_eq(token.as_bytes())),
            None => false,
        }
    }
}

/// Decode an `Authorization: Basic <base64>` header into `(ldap, token)`.
pub fn parse_basic_auth(header: &str) -> Option<(String, String)> {
    let encoded = header.strip_prefix("Basic ")?;
    let decoded = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, encoded).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (ldap, token) = decoded.split_once(':')?;
    Some((ldap.to_string(), token.to_string()))
}


#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;

    fn store() -> CredentialStore {
        let mut tokens = HashMap::new();
        tokens.insert("alice".to_string(), "s3cr3t".to_string());
        CredentialStore { tokens }
    }

    #[test]
    fn verifies_matching_credentials() {
        assert!(store().verify("alice", "s3cr3t"));
    }

    #[test]
    fn rejects_wrong_token() {
        assert!(!store().verify("alice", "wrong"));
    }

    #[test]
    fn rejects_unknown_ldap() {
        assert!(!store().verify("bob", "s3cr3t"));
    }

    #[test]
    fn parses_well_formed_header() {
        let encoded = base64::engine::general_purpose::STANDARD.encode("alice:s3cr3t");
        let header = format!("Basic {encoded}");
        assert_eq!(
            parse_basic_auth(&header),
            Some(("alice".to_string(), "s3cr3t".to_string()))
        );
    }

    #[test]
    fn rejects_non_basic_scheme() {
        assert_eq!(parse_basic_auth("Bearer abc"), None);
    }

    #[test]
    fn rejects_malformed_base64() {
        assert_eq!(parse_basic_auth("Basic not-base64!!"), None);
    }
}
