use crate::domain_model::Credential;
use crate::sandbox::SandboxErrorCode;
use crate::settings::Sandbox;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
struct AccessClaims {
    sub: String, // username
    exp: i64,
    iat: i64,
    jti: String,
}

#[derive(Debug, Clone)]
struct RefreshRecord {
    username: String,
    expires_at: DateTime<Utc>,
}

/// Everything the sandbox backend keeps in memory.
pub struct SandboxState {
    config: Sandbox,
    refresh_tokens: DashMap<String, RefreshRecord>,
    collections: DashMap<String, Vec<Value>>,
}

impl SandboxState {
    pub fn new(config: Sandbox) -> Self {
        let collections = DashMap::new();
        collections.insert(
            "orders".to_string(),
            vec![
                json!({ "id": 1001, "customer": "Northwind", "total": 412.50, "status": "shipped" }),
                json!({ "id": 1002, "customer": "Contoso", "total": 89.99, "status": "pending" }),
                json!({ "id": 1003, "customer": "Fabrikam", "total": 1250.00, "status": "paid" }),
            ],
        );
        collections.insert(
            "inventory".to_string(),
            vec![
                json!({ "sku": "CH-001", "name": "Office chair", "stock": 14 }),
                json!({ "sku": "DK-210", "name": "Standing desk", "stock": 3 }),
            ],
        );
        collections.insert(
            "employees".to_string(),
            vec![json!({ "id": 7, "name": "R. Okafor", "role": "warehouse lead" })],
        );
        collections.insert("meetings".to_string(), Vec::new());

        Self {
            config,
            refresh_tokens: DashMap::new(),
            collections,
        }
    }

    pub fn check_password(&self, username: &str, password: &str) -> bool {
        self.config
            .users
            .iter()
            .any(|user| user.username == username && user.password == password)
    }

    /// Issue a new access/refresh pair for `username`.
    pub fn issue(&self, username: &str) -> Result<Credential, SandboxErrorCode> {
        let now = Utc::now();
        let claims = AccessClaims {
            sub: username.to_string(),
            exp: (now + Duration::seconds(self.config.access_ttl_secs as i64)).timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };
        let access_token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.signing_key.as_bytes()),
        )
        .map_err(SandboxErrorCode::internal)?;

        self.refresh_tokens
            .retain(|_, record| record.expires_at > now);
        let refresh_token = Uuid::new_v4().to_string();
        self.refresh_tokens.insert(
            refresh_token.clone(),
            RefreshRecord {
                username: username.to_string(),
                expires_at: now + Duration::seconds(self.config.refresh_ttl_secs as i64),
            },
        );

        Ok(Credential::new(access_token, refresh_token))
    }

    /// Resolve the username behind a valid access token.
    pub fn verify_access(&self, token: &str) -> Result<String, SandboxErrorCode> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        let data = decode::<AccessClaims>(
            token,
            &DecodingKey::from_secret(self.config.signing_key.as_bytes()),
            &validation,
        )
        .map_err(|_| SandboxErrorCode::InvalidToken)?;
        Ok(data.claims.sub)
    }

    /// Consume `token` and issue its successor. Refresh tokens are single-use.
    pub fn rotate(&self, token: &str) -> Result<Credential, SandboxErrorCode> {
        let (_, record) = self
            .refresh_tokens
            .remove(token)
            .ok_or(SandboxErrorCode::InvalidToken)?;
        if record.expires_at <= Utc::now() {
            return Err(SandboxErrorCode::InvalidToken);
        }
        self.issue(&record.username)
    }

    pub fn revoke(&self, token: &str) -> bool {
        self.refresh_tokens.remove(token).is_some()
    }

    pub fn list(&self, collection: &str) -> Option<Vec<Value>> {
        self.collections
            .get(collection)
            .map(|items| items.to_vec())
    }

    pub fn append(&self, collection: &str, item: Value) -> Option<Value> {
        let mut items = self.collections.get_mut(collection)?;
        items.push(item.clone());
        Some(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::SandboxUser;

    fn state(access_ttl_secs: u64) -> SandboxState {
        with_refresh_ttl(access_ttl_secs, 3600)
    }

    fn with_refresh_ttl(access_ttl_secs: u64, refresh_ttl_secs: u64) -> SandboxState {
        SandboxState::new(Sandbox {
            address: "127.0.0.1:0".to_string(),
            signing_key: "test-key".to_string(),
            access_ttl_secs,
            refresh_ttl_secs,
            users: vec![SandboxUser {
                username: "admin".to_string(),
                password: "pw".to_string(),
            }],
        })
    }

    #[test]
    fn issued_access_token_verifies() {
        let state = state(60);
        assert!(state.check_password("admin", "pw"));
        assert!(!state.check_password("admin", "nope"));

        let credential = state.issue("admin").unwrap();
        assert_eq!(state.verify_access(credential.access_token.as_str()).unwrap(), "admin");
        assert!(state.verify_access("not-a-jwt").is_err());
    }

    #[test]
    fn refresh_tokens_are_single_use() {
        let state = state(60);
        let first = state.issue("admin").unwrap();

        let second = state.rotate(first.refresh_token.as_str()).unwrap();
        assert_ne!(first.refresh_token, second.refresh_token);
        assert!(state.rotate(first.refresh_token.as_str()).is_err());
        assert!(state.revoke(second.refresh_token.as_str()));
        assert!(state.rotate(second.refresh_token.as_str()).is_err());
    }

    #[test]
    fn append_only_touches_known_collections() {
        let state = state(60);
        assert!(state.append("orders", json!({ "id": 2000 })).is_some());
        assert_eq!(state.list("orders").unwrap().len(), 4);
        assert!(state.append("payroll", json!({})).is_none());
    }

    #[test]
    fn issuing_evicts_expired_refresh_tokens() {
        let state = with_refresh_ttl(60, 0);
        let first = state.issue("admin").unwrap();
        let second = state.issue("admin").unwrap();

        assert_eq!(state.refresh_tokens.len(), 1);
        assert!(state.refresh_tokens.contains_key(second.refresh_token.as_str()));
        assert!(state.rotate(first.refresh_token.as_str()).is_err());
    }
}
