use crate::application_impl::ClientConfig;
use anyhow::{Result, anyhow};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub api: Api,
    pub credentials: Credentials,
    pub log: Log,
    #[serde(default)]
    pub sandbox: Sandbox,
}

#[derive(Debug, Deserialize)]
pub struct Api {
    pub backend: String, // "http" or "fake"
    pub base_url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,
    #[serde(default = "default_login_path")]
    pub login_path: String,
    #[serde(default = "default_logout_path")]
    pub logout_path: String,
}

impl Api {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            refresh_path: self.refresh_path.clone(),
            login_path: self.login_path.clone(),
            logout_path: self.logout_path.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub backend: String, // "memory" or "redis"
    #[serde(default)]
    pub redis_dsn: Option<String>,
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

#[derive(Debug, Deserialize)]
pub struct Log {
    pub filter: String,
}

#[derive(Clone, Deserialize)]
pub struct Sandbox {
    pub address: String,
    pub signing_key: String,
    pub access_ttl_secs: u64,
    pub refresh_ttl_secs: u64,
    #[serde(default)]
    pub users: Vec<SandboxUser>,
}

impl Default for Sandbox {
    fn default() -> Self {
        Sandbox {
            address: "127.0.0.1:8080".to_string(),
            signing_key: "sandbox-signing-key".to_string(),
            access_ttl_secs: 15 * 60,
            refresh_ttl_secs: 7 * 24 * 60 * 60,
            users: Vec::new(),
        }
    }
}

#[derive(Clone, Deserialize)]
pub struct SandboxUser {
    pub username: String,
    pub password: String,
}

// Settings are logged at startup; keep secrets out of Debug.
impl fmt::Debug for Sandbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sandbox")
            .field("address", &self.address)
            .field("signing_key", &"<redacted>")
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .field("users", &self.users)
            .finish()
    }
}

impl fmt::Debug for SandboxUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SandboxUser")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_refresh_path() -> String {
    "auth/refresh".to_string()
}

fn default_login_path() -> String {
    "auth/login".to_string()
}

fn default_logout_path() -> String {
    "auth/logout".to_string()
}

fn default_prefix() -> String {
    "backoffice:session".to_string()
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

/// Load settings from `path` (or the build profile's default file), then apply
/// `BACKOFFICE__SECTION__KEY` environment overrides.
pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let path = path.unwrap_or(SETTINGS_PATH);

    let settings: Settings = Config::builder()
        .add_source(File::with_name(path))
        .add_source(
            Environment::with_prefix("BACKOFFICE")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_settings(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn fills_defaults_for_optional_keys() {
        let file = write_settings(
            r#"
[api]
backend = "http"
base_url = "http://127.0.0.1:8080/api"

[credentials]
backend = "memory"

[log]
filter = "debug"
"#,
        );
        let settings = parse_settings(file.path().to_str()).unwrap();

        assert_eq!(settings.api.timeout(), Duration::from_secs(10));
        assert_eq!(settings.api.client_config().refresh_path, "auth/refresh");
        assert_eq!(settings.credentials.prefix, "backoffice:session");
        assert!(settings.credentials.redis_dsn.is_none());
        assert_eq!(settings.sandbox.access_ttl_secs, 900);
        assert!(settings.sandbox.users.is_empty());
    }

    #[test]
    fn reads_sandbox_users() {
        let file = write_settings(
            r#"
[api]
backend = "fake"
base_url = "http://localhost/api"
timeout_ms = 250
refresh_path = "session/refresh"

[credentials]
backend = "redis"
redis_dsn = "redis://127.0.0.1:6379"
prefix = "ops"

[log]
filter = "info"

[sandbox]
address = "127.0.0.1:9000"
signing_key = "k"
access_ttl_secs = 60
refresh_ttl_secs = 600
users = [{ username = "admin", password = "admin-pw" }]
"#,
        );
        let settings = parse_settings(file.path().to_str()).unwrap();

        assert_eq!(settings.api.timeout(), Duration::from_millis(250));
        assert_eq!(settings.api.refresh_path, "session/refresh");
        assert_eq!(settings.api.login_path, "auth/login");
        assert_eq!(settings.credentials.redis_dsn.as_deref(), Some("redis://127.0.0.1:6379"));
        assert_eq!(settings.sandbox.users.len(), 1);
        assert_eq!(settings.sandbox.users[0].username, "admin");
    }

    #[test]
    fn debug_output_hides_sandbox_secrets() {
        let sandbox = Sandbox {
            signing_key: "top-secret-key".to_string(),
            users: vec![SandboxUser {
                username: "admin".to_string(),
                password: "hunter2".to_string(),
            }],
            ..Sandbox::default()
        };
        let printed = format!("{:?}", sandbox);

        assert!(printed.contains("admin"));
        assert!(!printed.contains("top-secret-key"));
        assert!(!printed.contains("hunter2"));
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(parse_settings(Some("settings/does-not-exist.toml")).is_err());
    }
}
