use std::net::SocketAddr;

use authentic_client::ClientConfig;
use serde::Deserialize;

/// Default configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "authentic.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Socket address to listen on.
    pub listen: String,
    /// Log level used when `RUST_LOG` is not set.
    pub log_level: String,
    /// Authority settings for the token verifier.
    pub auth: ClientConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:3000".to_string(),
            log_level: "info".to_string(),
            auth: ClientConfig::default(),
        }
    }
}

impl GatewayConfig {
    pub fn listen_addr(&self) -> Result<SocketAddr, String> {
        self.listen
            .parse()
            .map_err(|e| format!("listen: invalid socket address '{}': {e}", self.listen))
    }

    pub fn validate(&self) -> Result<(), String> {
        self.listen_addr()?;
        self.auth.validate().map_err(|e| format!("auth: {e}"))
    }
}

pub mod loader {
    use super::{DEFAULT_CONFIG_PATH, GatewayConfig};
    use config::{Config, ConfigBuilder, Environment, File, builder::DefaultState};
    use std::path::PathBuf;

    pub fn load_config(path: Option<&str>) -> Result<GatewayConfig, String> {
        let pathbuf = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_PATH));
        let mut builder = Config::builder();
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        // Environment variable overrides, e.g., AUTHENTIC__AUTH__SERVER=https://auth.example.com
        builder = builder.add_source(
            Environment::with_prefix("AUTHENTIC")
                .try_parsing(true)
                .separator("__"),
        );
        build(builder)
    }

    pub(crate) fn build(builder: ConfigBuilder<DefaultState>) -> Result<GatewayConfig, String> {
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: GatewayConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}
