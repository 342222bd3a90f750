//! Vault KV v2 client
//!
//! Token-authenticated. Checks the token with `lookup-self`, then reads the
//! latest version of the credential secret.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use url::Url;

use super::SecretProvider;
use crate::config::VaultConfig;
use crate::error::SecretError;
use crate::models::Credential;

pub struct VaultClient {
    base_url: Url,
    token: String,
    mount: String,
    secret_path: String,
    namespace: Option<String>,
    http_client: Client,
}

#[derive(Debug, Deserialize)]
struct KvV2Response {
    data: Option<KvV2Data>,
}

#[derive(Debug, Deserialize)]
struct KvV2Data {
    data: Option<serde_json::Map<String, serde_json::Value>>,
}

impl VaultClient {
    pub fn new(config: &VaultConfig) -> Result<Self, SecretError> {
        let token = config
            .token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| SecretError::Authentication("No Vault token configured".to_string()))?;

        let mut base_url = Url::parse(&config.address).map_err(|e| {
            SecretError::Authentication(format!("Invalid Vault address {}: {}", config.address, e))
        })?;
        // Keep any path prefix (reverse-proxied Vault) when joining API paths
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http_client = Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.timeout().min(Duration::from_secs(5)))
            .build()
            .map_err(|e| SecretError::Authentication(format!("HTTP client init failed: {}", e)))?;

        Ok(Self {
            base_url,
            token,
            mount: config.mount.trim_matches('/').to_string(),
            secret_path: config.secret_path.trim_matches('/').to_string(),
            namespace: config.namespace.clone(),
            http_client,
        })
    }

    /// Logical location of the credential, e.g. `secret/network-devices`
    pub fn secret_location(&self) -> String {
        format!("{}/{}", self.mount, self.secret_path)
    }

    fn endpoint(&self, path: &str) -> Result<Url, SecretError> {
        self.base_url
            .join(path)
            .map_err(|e| SecretError::Authentication(format!("Invalid Vault URL for {}: {}", path, e)))
    }

    fn get(&self, url: Url) -> reqwest::RequestBuilder {
        let request = self
            .http_client
            .get(url)
            .header("X-Vault-Token", &self.token);
        match &self.namespace {
            Some(ns) => request.header("X-Vault-Namespace", ns),
            None => request,
        }
    }

    /// Verify the token is accepted
    pub async fn check_authenticated(&self) -> Result<(), SecretError> {
        let url = self.endpoint("v1/auth/token/lookup-self")?;

        let response = self
            .get(url)
            .send()
            .await
            .map_err(|e| SecretError::Authentication(format!("Vault unreachable: {}", e)))?;

        match response.status() {
            s if s.is_success() => Ok(()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(SecretError::Authentication(
                "Vault rejected the token".to_string(),
            )),
            s => Err(SecretError::Authentication(format!(
                "Vault token check returned HTTP {}",
                s
            ))),
        }
    }

    async fn read_secret(&self) -> Result<Credential, SecretError> {
        let url = self.endpoint(&format!("v1/{}/data/{}", self.mount, self.secret_path))?;

        let response = self
            .get(url)
            .send()
            .await
            .map_err(|e| SecretError::Authentication(format!("Vault unreachable: {}", e)))?;

        match response.status() {
            s if s.is_success() => {}
            StatusCode::NOT_FOUND => {
                return Err(self.not_found("no secret at this path"));
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(SecretError::Authentication(format!(
                    "Permission denied reading {}",
                    self.secret_location()
                )));
            }
            s => {
                return Err(SecretError::Authentication(format!(
                    "Vault read returned HTTP {}",
                    s
                )));
            }
        }

        let body: KvV2Response = response
            .json()
            .await
            .map_err(|e| self.not_found(&format!("unreadable response: {}", e)))?;

        let record = body
            .data
            .and_then(|d| d.data)
            .ok_or_else(|| self.not_found("secret has no data (deleted or destroyed version?)"))?;

        credential_from_record(&record).map_err(|reason| self.not_found(&reason))
    }

    fn not_found(&self, reason: &str) -> SecretError {
        SecretError::NotFound {
            path: self.secret_location(),
            reason: reason.to_string(),
        }
    }
}

/// Extract `username` / `password` from a KV record
fn credential_from_record(
    record: &serde_json::Map<String, serde_json::Value>,
) -> Result<Credential, String> {
    let field = |name: &str| -> Result<String, String> {
        match record.get(name) {
            None | Some(serde_json::Value::Null) => Err(format!("missing field '{}'", name)),
            Some(serde_json::Value::String(s)) if s.is_empty() => {
                Err(format!("field '{}' is empty", name))
            }
            Some(serde_json::Value::String(s)) => Ok(s.clone()),
            Some(_) => Err(format!("field '{}' is not a string", name)),
        }
    };

    Ok(Credential::new(field("username")?, field("password")?))
}

#[async_trait]
impl SecretProvider for VaultClient {
    async fn fetch_credential(&self) -> Result<Credential, SecretError> {
        self.check_authenticated().await?;
        tracing::debug!("Vault token accepted by {}", self.base_url);

        let credential = self.read_secret().await?;
        tracing::info!(
            "Retrieved credential for user '{}' from {}",
            credential.username,
            self.secret_location()
        );
        Ok(credential)
    }

    fn name(&self) -> &'static str {
        "vault"
    }
}
