//! Configuration read once from the environment

use crate::agent::{DEFAULT_API_URL, DEFAULT_MODEL};
use crate::skills::DEFAULT_COINGECKO_URL;
use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 8000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be a port number, got {value:?}")]
    InvalidPort { name: &'static str, value: String },
}

/// Everything the binary needs to wire the host and the surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    pub anthropic_api_key: Option<String>,
    /// Optional LLM gateway root; rewrites the Messages endpoint
    pub gateway: Option<String>,
    pub model: String,
    pub port: u16,
    pub coingecko_url: String,
    pub log_file: PathBuf,
}

impl ChatConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let port = match get("CRYPTO_CHAT_PORT") {
            Some(value) => value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPort {
                    name: "CRYPTO_CHAT_PORT",
                    value,
                })?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            anthropic_api_key: get("ANTHROPIC_API_KEY"),
            gateway: get("LLM_GATEWAY"),
            model: get("CRYPTO_CHAT_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            port,
            coingecko_url: get("COINGECKO_API_URL")
                .unwrap_or_else(|| DEFAULT_COINGECKO_URL.to_string()),
            log_file: get("CRYPTO_CHAT_LOG")
                .map_or_else(|| std::env::temp_dir().join("crypto-chat.log"), PathBuf::from),
        })
    }

    /// Messages endpoint, routed through the gateway when one is set
    pub fn api_url(&self) -> String {
        match &self.gateway {
            Some(gw) => format!("{}/_/gateway/anthropic/v1/messages", gw.trim_end_matches('/')),
            None => DEFAULT_API_URL.to_string(),
        }
    }

    /// API key to send. Gateway mode accepts an implicit key.
    pub fn effective_api_key(&self) -> Option<String> {
        self.anthropic_api_key
            .clone()
            .or_else(|| self.gateway.as_ref().map(|_| "implicit".to_string()))
    }
}
