//! Auth credential storage for cron8n.
//!
//! Stores the n8n connection in `~/.cron8n/config.json` as a single object
//! `{baseUrl, authMode, secret}`. A connection exists only when all three
//! fields are present; the secret is used verbatim until replaced or cleared.

use std::path::{Path, PathBuf};

use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// File mode for the auth file on Unix systems (owner read/write only).
const AUTH_FILE_MODE: u32 = 0o600;

/// How the secret is presented to the n8n API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthMode {
    /// `X-N8N-API-KEY: <secret>`
    ApiKey,
    /// `Authorization: Bearer <secret>`
    Bearer,
}

impl std::fmt::Display for AuthMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ApiKey => write!(f, "apiKey"),
            Self::Bearer => write!(f, "bearer"),
        }
    }
}

impl std::str::FromStr for AuthMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "apiKey" | "api-key" | "apikey" => Ok(Self::ApiKey),
            "bearer" => Ok(Self::Bearer),
            other => Err(format!(
                "Unknown auth mode '{}'. Expected 'apiKey' or 'bearer'",
                other
            )),
        }
    }
}

/// A complete set of credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthCredentials {
    pub base_url: String,
    pub auth_mode: AuthMode,
    pub secret: String,
}

impl AuthCredentials {
    /// Build credentials after normalising and validating the base URL.
    pub fn new(base_url: &str, auth_mode: AuthMode, secret: &str) -> Result<Self> {
        let secret = secret.trim();
        if secret.is_empty() {
            return Err(Error::validation("Secret must not be empty"));
        }

        Ok(Self {
            base_url: normalize_base_url(base_url)?,
            auth_mode,
            secret: secret.to_string(),
        })
    }
}

/// The auth document as stored on disk. Any field may be missing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_mode: Option<AuthMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

impl AuthConfig {
    /// Credentials, present only when all three fields are set.
    pub fn credentials(&self) -> Option<AuthCredentials> {
        match (&self.base_url, self.auth_mode, &self.secret) {
            (Some(base_url), Some(auth_mode), Some(secret))
                if !base_url.is_empty() && !secret.is_empty() =>
            {
                Some(AuthCredentials {
                    base_url: base_url.clone(),
                    auth_mode,
                    secret: secret.clone(),
                })
            }
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.credentials().is_some()
    }
}

impl From<AuthCredentials> for AuthConfig {
    fn from(creds: AuthCredentials) -> Self {
        Self {
            base_url: Some(creds.base_url),
            auth_mode: Some(creds.auth_mode),
            secret: Some(creds.secret),
        }
    }
}

/// Auth store backed by a JSON file.
#[derive(Debug, Clone)]
pub struct AuthStore {
    path: PathBuf,
}

impl AuthStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the auth document. A missing or corrupt file is an empty config.
    pub async fn load(&self) -> Result<AuthConfig> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No auth config at {}", self.path.display());
                return Ok(AuthConfig::default());
            }
            Err(e) => {
                return Err(Error::file(format!(
                    "Failed to read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        match serde_json::from_str(&content) {
            Ok(config) => Ok(config),
            Err(e) => {
                warn!(
                    "Ignoring unreadable auth config {}: {}",
                    self.path.display(),
                    e
                );
                Ok(AuthConfig::default())
            }
        }
    }

    /// Stored credentials, if complete.
    pub async fn credentials(&self) -> Result<Option<AuthCredentials>> {
        Ok(self.load().await?.credentials())
    }

    /// Stored credentials, or an auth error telling the user to log in.
    pub async fn require(&self) -> Result<AuthCredentials> {
        self.credentials().await?.ok_or_else(|| {
            Error::auth("Not logged in to an n8n instance")
                .with_hint("Run 'cron8n auth login --url <url> --secret <key>'")
        })
    }

    /// Replace the stored credentials.
    pub async fn save(&self, credentials: &AuthCredentials) -> Result<()> {
        let config = AuthConfig::from(credentials.clone());
        let content = serde_json::to_string_pretty(&config)?;
        write_secure_file(&self.path, &content).await
    }

    /// Forget the stored credentials. Returns true if a file was removed.
    pub async fn clear(&self) -> Result<bool> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::file(format!(
                "Failed to remove {}: {}",
                self.path.display(),
                e
            ))),
        }
    }
}

/// Mask a secret for display.
pub fn mask_secret(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 8 {
        "*".repeat(chars.len())
    } else {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    }
}

/// Validate an http(s) URL and strip trailing slashes.
pub fn normalize_base_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    let url = Url::parse(trimmed).map_err(|e| {
        Error::validation(format!("Invalid URL '{}': {}", raw, e))
            .with_hint("Use the full address, e.g. https://n8n.example.com")
    })?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(Error::validation(format!(
            "Invalid URL '{}': scheme must be http or https",
            raw
        )));
    }

    Ok(trimmed.to_string())
}

async fn write_secure_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| Error::file(format!("Failed to create directory: {}", e)))?;
    }
    tokio::fs::write(path, content)
        .await
        .map_err(|e| Error::file(format!("Failed to write {}: {}", path.display(), e)))?;
    set_file_permissions_owner_only(path).await
}

#[cfg(unix)]
async fn set_file_permissions_owner_only(path: &Path) -> Result<()> {
    use std::fs::Permissions;
    use std::os::unix::fs::PermissionsExt;

    tokio::fs::set_permissions(path, Permissions::from_mode(AUTH_FILE_MODE))
        .await
        .map_err(|e| Error::file(format!("Failed to secure file permissions: {}", e)))
}

#[cfg(not(unix))]
async fn set_file_permissions_owner_only(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> AuthStore {
        AuthStore::new(dir.path().join("config.json"))
    }

    #[tokio::test]
    async fn test_missing_file_is_unauthenticated() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let config = store.load().await.unwrap();
        assert!(!config.is_authenticated());

        let err = store.require().await.unwrap_err();
        assert_eq!(err.code(), "AUTH_ERROR");
        assert!(err.hint().is_some());
    }

    #[tokio::test]
    async fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let creds =
            AuthCredentials::new("https://n8n.example.com/", AuthMode::ApiKey, "secret-key")
                .unwrap();
        assert_eq!(creds.base_url, "https://n8n.example.com");

        store.save(&creds).await.unwrap();
        assert_eq!(store.require().await.unwrap(), creds);

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\"authMode\": \"apiKey\""));
        assert!(raw.contains("\"baseUrl\""));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let creds = AuthCredentials::new("http://localhost:5678", AuthMode::Bearer, "t").unwrap();
        store.save(&creds).await.unwrap();

        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn test_partial_config_is_unauthenticated() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        std::fs::write(
            store.path(),
            r#"{"baseUrl": "https://n8n.example.com", "authMode": "apiKey"}"#,
        )
        .unwrap();

        let config = store.load().await.unwrap();
        assert_eq!(config.base_url.as_deref(), Some("https://n8n.example.com"));
        assert!(config.credentials().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_config_is_unauthenticated() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), "{not json").unwrap();

        assert!(!store.load().await.unwrap().is_authenticated());
    }

    #[tokio::test]
    async fn test_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let creds = AuthCredentials::new("http://localhost:5678", AuthMode::ApiKey, "k").unwrap();
        store.save(&creds).await.unwrap();

        assert!(store.clear().await.unwrap());
        assert!(!store.clear().await.unwrap());
        assert!(store.credentials().await.unwrap().is_none());
    }

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(
            normalize_base_url(" http://localhost:5678// ").unwrap(),
            "http://localhost:5678"
        );
        assert!(normalize_base_url("not a url").is_err());
        assert!(normalize_base_url("ftp://example.com").is_err());
    }

    #[test]
    fn test_auth_mode_parse() {
        assert_eq!("apiKey".parse::<AuthMode>().unwrap(), AuthMode::ApiKey);
        assert_eq!("bearer".parse::<AuthMode>().unwrap(), AuthMode::Bearer);
        assert!("basic".parse::<AuthMode>().is_err());
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret("abc"), "***");
        assert_eq!(mask_secret("abcdefgh"), "********");
        assert_eq!(mask_secret("n8n_api_1234567890"), "n8n_...7890");
    }
}
