//! Reconstruction configuration
//!
//! Loaded from a TOML file (`IOU_CONFIG_PATH`, default `iou_config.toml`)
//! and overlaid with `IOU_*` environment variables.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::iou::{Address, IouError};
use crate::source::{BlockRange, BlockTag, IOU_EVENT_TOPIC};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IouConfig {
    /// JSON-RPC endpoint (HTTP).
    #[serde(default = "default_rpc_endpoint")]
    pub rpc_endpoint: String,

    /// Address of the contract emitting `Iou` events.
    #[serde(default)]
    pub contract_address: String,

    /// First block to scan.
    #[serde(default)]
    pub from_block: u64,

    /// Last block to scan, `"latest"` or a number.
    #[serde(default)]
    pub to_block: BlockTag,

    /// Blocks per `eth_getLogs` request.
    #[serde(default = "default_log_block_range")]
    pub log_block_range: u64,

    /// Per-request HTTP timeout (milliseconds).
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Topic0 identifying `Iou` logs. Other logs from the contract are ignored.
    #[serde(default = "default_event_topic")]
    pub event_topic: String,
}

fn default_rpc_endpoint() -> String {
    "http://127.0.0.1:8545".to_string()
}

fn default_log_block_range() -> u64 {
    10_000
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_event_topic() -> String {
    IOU_EVENT_TOPIC.to_string()
}

impl Default for IouConfig {
    fn default() -> Self {
        Self {
            rpc_endpoint: default_rpc_endpoint(),
            contract_address: String::new(),
            from_block: 0,
            to_block: BlockTag::Latest,
            log_block_range: default_log_block_range(),
            request_timeout_ms: default_request_timeout_ms(),
            event_topic: default_event_topic(),
        }
    }
}

impl IouConfig {
    /// Load from TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save to TOML file
    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Config file (if present) overlaid with environment variables.
    pub fn from_env() -> Self {
        let path =
            std::env::var("IOU_CONFIG_PATH").unwrap_or_else(|_| "iou_config.toml".to_string());

        let mut config = Self::load(&path).unwrap_or_else(|e| {
            tracing::debug!("Using default IOU config ({}): {}", path, e);
            Self::default()
        });
        config.apply_env();
        config
    }

    /// Override fields from `IOU_*` variables. Unparsable values are ignored.
    pub fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("IOU_RPC_URL") {
            if !v.is_empty() {
                self.rpc_endpoint = v;
            }
        }
        if let Ok(v) = std::env::var("IOU_CONTRACT_ADDRESS") {
            self.contract_address = v;
        }
        if let Ok(v) = std::env::var("IOU_FROM_BLOCK") {
            match v.parse() {
                Ok(n) => self.from_block = n,
                Err(_) => tracing::warn!(value = %v, "ignoring invalid IOU_FROM_BLOCK"),
            }
        }
        if let Ok(v) = std::env::var("IOU_TO_BLOCK") {
            match v.parse() {
                Ok(tag) => self.to_block = tag,
                Err(_) => tracing::warn!(value = %v, "ignoring invalid IOU_TO_BLOCK"),
            }
        }
        if let Ok(v) = std::env::var("IOU_LOG_BLOCK_RANGE") {
            if let Ok(n) = v.parse() {
                self.log_block_range = n;
            }
        }
        if let Ok(v) = std::env::var("IOU_EVENT_TOPIC") {
            if !v.trim().is_empty() {
                self.event_topic = v;
            }
        }
        if let Ok(v) = std::env::var("IOU_REQUEST_TIMEOUT_MS") {
            if let Ok(ms) = v.parse() {
                self.request_timeout_ms = ms;
            }
        }
    }

    pub fn contract(&self) -> Result<Address, IouError> {
        if self.contract_address.trim().is_empty() {
            return Err(IouError::InvalidConfig(
                "contract_address is not set".to_string(),
            ));
        }
        self.contract_address.parse()
    }

    pub fn range(&self) -> BlockRange {
        BlockRange::new(self.from_block, self.to_block)
    }

    pub fn validate(&self) -> Result<(), IouError> {
        if self.rpc_endpoint.trim().is_empty() {
            return Err(IouError::InvalidConfig("rpc_endpoint is empty".to_string()));
        }
        self.contract()?;
        if self.log_block_range == 0 {
            return Err(IouError::InvalidConfig(
                "log_block_range must be positive".to_string(),
            ));
        }
        validate_topic(&self.event_topic)?;
        if let BlockTag::Number(to) = self.to_block {
            if to < self.from_block {
                return Err(IouError::InvalidConfig(format!(
                    "from_block {} is after to_block {}",
                    self.from_block, to
                )));
            }
        }
        Ok(())
    }
}

/// A topic is a `0x`-prefixed 32-byte hash.
pub fn validate_topic(topic: &str) -> Result<(), IouError> {
    let digits = topic.trim().strip_prefix("0x").unwrap_or("");
    if digits.len() != 64 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(IouError::InvalidConfig(format!(
            "event_topic '{}' is not a 32-byte hex hash",
            topic
        )));
    }
    Ok(())
}
