//! Secrets service integration
//!
//! - `vault`: HashiCorp Vault KV v2 client

pub mod vault;

pub use vault::VaultClient;

use async_trait::async_trait;

use crate::error::SecretError;
use crate::models::Credential;

/// Source of the device login credential
#[async_trait]
pub trait SecretProvider: Send + Sync {
    /// Fetch the credential; both fields are non-empty on success
    async fn fetch_credential(&self) -> Result<Credential, SecretError>;

    /// Provider name for logs
    fn name(&self) -> &'static str;
}
