use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(pub String);

#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RefreshToken(pub String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        AccessToken(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl RefreshToken {
    pub fn new(token: impl Into<String>) -> Self {
        RefreshToken(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Tokens end up in spans and error messages through Debug; never print them.
impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccessToken({})", redact(&self.0))
    }
}

impl fmt::Debug for RefreshToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RefreshToken({})", redact(&self.0))
    }
}

fn redact(token: &str) -> String {
    format!("<{} chars>", token.chars().count())
}

/// The access/refresh pair held for one session.
///
/// The wire form matches the backend's token payload:
/// `{ "accessToken": "...", "refreshToken": "..." }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub access_token: AccessToken,
    pub refresh_token: RefreshToken,
}

impl Credential {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Credential {
            access_token: AccessToken::new(access_token),
            refresh_token: RefreshToken::new(refresh_token),
        }
    }

    /// A pair is only usable when both halves are non-empty.
    pub fn is_complete(&self) -> bool {
        !self.access_token.0.trim().is_empty() && !self.refresh_token.0.trim().is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequestBody {
    pub refresh_token: RefreshToken,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequestBody {
    pub username: String,
    pub password: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_uses_camel_case_wire_names() {
        let credential: Credential =
            serde_json::from_str(r#"{"accessToken":"T2","refreshToken":"R2"}"#).unwrap();
        assert_eq!(credential, Credential::new("T2", "R2"));

        let body = serde_json::to_value(RefreshRequestBody {
            refresh_token: RefreshToken::new("R1"),
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({ "refreshToken": "R1" }));
    }

    #[test]
    fn debug_output_hides_token_material() {
        let credential = Credential::new("secret-access", "secret-refresh");
        let printed = format!("{:?}", credential);
        assert!(!printed.contains("secret-access"));
        assert!(!printed.contains("secret-refresh"));
    }

    #[test]
    fn blank_halves_make_an_incomplete_pair() {
        assert!(Credential::new("a", "r").is_complete());
        assert!(!Credential::new("", "r").is_complete());
        assert!(!Credential::new("a", "  ").is_complete());
    }
}
