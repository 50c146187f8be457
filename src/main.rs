use anyhow::Context;
use rsabs::config::ServiceConfig;
use rsabs::server::IssuanceServer;
use rsabs::IssuanceContext;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = if let Ok(path) = std::env::var("RSABS_CONFIG_PATH") {
        ServiceConfig::from_toml(path)?
    } else {
        ServiceConfig::from_env()?
    };
    config.validate()?;

    // Load the server key pair before binding anything
    let secret = std::fs::read(&config.secret_key_path)
        .with_context(|| format!("reading {}", config.secret_key_path.display()))?;
    let public = std::fs::read(&config.public_key_path)
        .with_context(|| format!("reading {}", config.public_key_path.display()))?;

    let passphrase = config.passphrase.clone();
    let provider = move |prompt: &str| {
        info!("{}", prompt);
        passphrase.clone()
    };
    let issuance = IssuanceContext::from_armored(&secret, &public, Some(&provider))
        .context("loading server key pair")?;

    let server = IssuanceServer::new(config, issuance)?;
    server.start().await?;

    Ok(())
}
