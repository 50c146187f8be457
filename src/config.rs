use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub bind_addr: SocketAddr,

    // Armored server key pair
    pub secret_key_path: PathBuf,
    pub public_key_path: PathBuf,
    pub passphrase: Option<String>,

    pub max_body_bytes: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8888)),
            secret_key_path: PathBuf::from("keys/rsa_server_secret.asc"),
            public_key_path: PathBuf::from("keys/rsa_server.asc"),
            passphrase: None,
            max_body_bytes: 64 * 1024, // 64KB
        }
    }
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("bind_addr", &self.bind_addr)
            .field("secret_key_path", &self.secret_key_path)
            .field("public_key_path", &self.public_key_path)
            .field("passphrase", &self.passphrase.as_ref().map(|_| "<redacted>"))
            .field("max_body_bytes", &self.max_body_bytes)
            .finish()
    }
}

impl ServiceConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Some(addr) = var("RSABS_BIND_ADDR") {
            config.bind_addr = addr.parse()?;
        }

        if let Some(path) = var("RSABS_SECRET_KEY_PATH") {
            config.secret_key_path = path.into();
        }

        if let Some(path) = var("RSABS_PUBLIC_KEY_PATH") {
            config.public_key_path = path.into();
        }

        if let Some(passphrase) = var("RSABS_PASSPHRASE") {
            config.passphrase = Some(passphrase);
        }

        if let Some(size) = var("RSABS_MAX_BODY_BYTES") {
            config.max_body_bytes = size.parse()?;
        }

        Ok(config)
    }

    pub fn from_toml(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ServiceConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.secret_key_path.as_os_str().is_empty() {
            anyhow::bail!("secret_key_path must be set");
        }

        if self.public_key_path.as_os_str().is_empty() {
            anyhow::bail!("public_key_path must be set");
        }

        if self.max_body_bytes == 0 {
            anyhow::bail!("max_body_bytes must be > 0");
        }

        Ok(())
    }
}
