//! Configuration module
//!
//! Layered the same way on every start: optional config file, then
//! `NETBACKUP_*` environment variables (`__` separates sections), then the
//! command line overrides applied in `main`.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub vault: VaultConfig,
    #[serde(default)]
    pub inventory: InventoryConfig,
    #[serde(default)]
    pub backup: BackupConfig,
    #[serde(default)]
    pub ssh: SshConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Clone, Deserialize)]
pub struct VaultConfig {
    #[serde(default = "default_vault_address")]
    pub address: String,
    /// Never defaulted; falls back to `VAULT_TOKEN` when unset
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_vault_mount")]
    pub mount: String,
    #[serde(default = "default_secret_path")]
    pub secret_path: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default = "default_vault_timeout")]
    pub timeout_secs: u64,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            address: default_vault_address(),
            token: None,
            mount: default_vault_mount(),
            secret_path: default_secret_path(),
            namespace: None,
            timeout_secs: default_vault_timeout(),
        }
    }
}

impl VaultConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl std::fmt::Debug for VaultConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultConfig")
            .field("address", &self.address)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("mount", &self.mount)
            .field("secret_path", &self.secret_path)
            .field("namespace", &self.namespace)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InventoryConfig {
    #[serde(default = "default_inventory_path")]
    pub path: PathBuf,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            path: default_inventory_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackupConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SshConfig {
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
    #[serde(default = "default_close_timeout")]
    pub close_timeout_secs: u64,
    #[serde(default)]
    pub strict_host_key_checking: bool,
    #[serde(default = "default_sshpass_program")]
    pub sshpass_program: String,
    #[serde(default = "default_ssh_program")]
    pub ssh_program: String,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            port: default_ssh_port(),
            connect_timeout_secs: default_connect_timeout(),
            command_timeout_secs: default_command_timeout(),
            close_timeout_secs: default_close_timeout(),
            strict_host_key_checking: false,
            sshpass_program: default_sshpass_program(),
            ssh_program: default_ssh_program(),
        }
    }
}

impl SshConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn close_timeout(&self) -> Duration {
        Duration::from_secs(self.close_timeout_secs)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    /// Directory for the date-named log file; stdout only when unset
    #[serde(default)]
    pub dir: Option<PathBuf>,
    /// `EnvFilter` directive used when `RUST_LOG` is not set
    #[serde(default)]
    pub filter: Option<String>,
}

fn default_vault_address() -> String {
    std::env::var("VAULT_ADDR").unwrap_or_else(|_| "http://127.0.0.1:8200".to_string())
}

fn default_vault_mount() -> String {
    "secret".to_string()
}

fn default_secret_path() -> String {
    "network-devices".to_string()
}

fn default_vault_timeout() -> u64 {
    10
}

fn default_inventory_path() -> PathBuf {
    PathBuf::from("data/device_inventory.json")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("devices_config_backup")
}

fn default_ssh_port() -> u16 {
    22
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_command_timeout() -> u64 {
    60
}

fn default_close_timeout() -> u64 {
    5
}

fn default_sshpass_program() -> String {
    "sshpass".to_string()
}

fn default_ssh_program() -> String {
    "ssh".to_string()
}

impl Config {
    /// Load from `path` (or `config/default`) plus environment
    pub fn load(path: Option<&str>) -> anyhow::Result<Self> {
        let file = match path {
            Some(p) => config::File::with_name(p).required(true),
            None => config::File::with_name("config/default").required(false),
        };

        let settings = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix("NETBACKUP")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let mut config: Config = settings.try_deserialize()?;
        if config.vault.token.is_none() {
            config.vault.token = std::env::var("VAULT_TOKEN").ok();
        }

        Ok(config)
    }

    /// Reject configurations a run cannot start with
    pub fn validate(&self) -> anyhow::Result<()> {
        match self.vault.token.as_deref() {
            Some(token) if !token.trim().is_empty() => {}
            _ => anyhow::bail!(
                "Vault token not configured (set vault.token, NETBACKUP_VAULT__TOKEN or VAULT_TOKEN)"
            ),
        }

        url::Url::parse(&self.vault.address)
            .map_err(|e| anyhow::anyhow!("Invalid vault.address {}: {}", self.vault.address, e))?;

        if self.vault.timeout_secs == 0 {
            anyhow::bail!("vault.timeout_secs must be greater than zero");
        }
        if self.ssh.connect_timeout_secs == 0 || self.ssh.command_timeout_secs == 0 {
            anyhow::bail!("SSH timeouts must be greater than zero");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_toml(toml: &str) -> Config {
        config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults_apply_to_missing_sections() {
        let cfg = from_toml(
            r#"
            [vault]
            address = "http://vault.lab:8200"
            token = "hvs.test"
            "#,
        );
        assert_eq!(cfg.vault.mount, "secret");
        assert_eq!(cfg.vault.secret_path, "network-devices");
        assert_eq!(cfg.ssh.port, 22);
        assert_eq!(cfg.ssh.connect_timeout(), Duration::from_secs(10));
        assert!(!cfg.ssh.strict_host_key_checking);
        assert_eq!(cfg.backup.output_dir, PathBuf::from("devices_config_backup"));
        assert!(cfg.logging.dir.is_none());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_missing_token_rejected() {
        let cfg = from_toml(
            r#"
            [vault]
            address = "http://vault.lab:8200"
            token = "   "
            "#,
        );
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("Vault token not configured"));
    }

    #[test]
    fn test_invalid_address_rejected() {
        let cfg = from_toml(
            r#"
            [vault]
            address = "not a url"
            token = "hvs.test"
            "#,
        );
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_zero_vault_timeout_rejected() {
        let cfg = from_toml(
            r#"
            [vault]
            address = "http://vault.lab:8200"
            token = "hvs.test"
            timeout_secs = 0
            "#,
        );
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("vault.timeout_secs"));
    }

    #[test]
    fn test_debug_redacts_token() {
        let cfg = from_toml(
            r#"
            [vault]
            address = "http://vault.lab:8200"
            token = "hvs.very-secret"
            "#,
        );
        let rendered = format!("{:?}", cfg);
        assert!(!rendered.contains("hvs.very-secret"));
    }
}
