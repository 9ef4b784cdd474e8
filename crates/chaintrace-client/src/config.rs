//! Client configuration.
//!
//! Every field except `rpc_url` has a default, so a minimal TOML file is:
//!
//! ```toml
//! rpc_url = "http://127.0.0.1:8545"
//! ```

use chaintrace_rpc::{HttpClientConfig, RetryConfig};
use chaintrace_trace::TracerConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ClientError;
use crate::observability::LogConfig;

/// Which transactions get a call trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TracingMode {
    /// Decode from the transaction and receipt only.
    None,
    /// Trace only transactions whose receipt reports failure.
    #[default]
    Reverted,
    All,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

fn default_max_retries() -> u32 { 3 }
fn default_initial_backoff_ms() -> u64 { 100 }
fn default_max_backoff_ms() -> u64 { 10_000 }
fn default_multiplier() -> f64 { 2.0 }

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            multiplier: default_multiplier(),
        }
    }
}

impl RetrySettings {
    pub fn to_retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
            multiplier: self.multiplier,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceSettings {
    #[serde(default)]
    pub mode: TracingMode,
    #[serde(default = "default_trace_timeout_ms")]
    pub timeout_ms: u64,
    /// Snapshot runtime code of unknown callees for bytecode matching.
    #[serde(default = "bool_true")]
    pub fetch_code: bool,
    /// Match unknown callees by function selector across all known ABIs.
    #[serde(default)]
    pub selector_fallback: bool,
}

fn default_trace_timeout_ms() -> u64 { 30_000 }
fn bool_true() -> bool { true }

impl Default for TraceSettings {
    fn default() -> Self {
        Self {
            mode: TracingMode::default(),
            timeout_ms: default_trace_timeout_ms(),
            fetch_code: true,
            selector_fallback: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptSettings {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_receipt_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_poll_interval_ms() -> u64 { 250 }
fn default_receipt_timeout_ms() -> u64 { 60_000 }

impl Default for ReceiptSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            timeout_ms: default_receipt_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NonceSettings {
    #[serde(default = "default_sync_timeout_ms")]
    pub sync_timeout_ms: u64,
}

fn default_sync_timeout_ms() -> u64 { 10_000 }

impl Default for NonceSettings {
    fn default() -> Self {
        Self {
            sync_timeout_ms: default_sync_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// HTTP JSON-RPC endpoint, e.g. "http://127.0.0.1:8545"
    pub rpc_url: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub tracing: TraceSettings,
    #[serde(default)]
    pub receipt: ReceiptSettings,
    #[serde(default)]
    pub nonce: NonceSettings,
    /// Where registered deployments are persisted. Not persisted when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_map_file: Option<PathBuf>,
    #[serde(default)]
    pub log: LogConfig,
}

fn default_request_timeout_ms() -> u64 { 30_000 }

impl ClientConfig {
    /// Defaults for everything but the endpoint.
    pub fn new(rpc_url: impl Into<String>) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            request_timeout_ms: default_request_timeout_ms(),
            retry: RetrySettings::default(),
            tracing: TraceSettings::default(),
            receipt: ReceiptSettings::default(),
            nonce: NonceSettings::default(),
            contract_map_file: None,
            log: LogConfig::default(),
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ClientError> {
        let config: Self = toml::from_str(s).map_err(|e| ClientError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, ClientError> {
        let text = std::fs::read_to_string(path).map_err(|error| ClientError::Io {
            path: path.to_path_buf(),
            error,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        if self.rpc_url.trim().is_empty() {
            return Err(ClientError::config("rpc_url must not be empty"));
        }
        let positive = [
            ("request_timeout_ms", self.request_timeout_ms),
            ("tracing.timeout_ms", self.tracing.timeout_ms),
            ("receipt.poll_interval_ms", self.receipt.poll_interval_ms),
            ("receipt.timeout_ms", self.receipt.timeout_ms),
            ("nonce.sync_timeout_ms", self.nonce.sync_timeout_ms),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, v)| *v == 0) {
            return Err(ClientError::config(format!("{name} must be greater than zero")));
        }
        if self.retry.multiplier < 1.0 {
            return Err(ClientError::config("retry.multiplier must be at least 1.0"));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn http_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            retry: self.retry.to_retry_config(),
            request_timeout: self.request_timeout(),
        }
    }

    pub fn tracer_config(&self) -> TracerConfig {
        TracerConfig {
            timeout: Duration::from_millis(self.tracing.timeout_ms),
            retry: self.retry.to_retry_config(),
            fetch_code: self.tracing.fetch_code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_toml_uses_defaults() {
        let c = ClientConfig::from_toml_str(r#"rpc_url = "http://127.0.0.1:8545""#).unwrap();
        assert_eq!(c.request_timeout_ms, 30_000);
        assert_eq!(c.retry.max_retries, 3);
        assert_eq!(c.tracing.mode, TracingMode::Reverted);
        assert!(c.tracing.fetch_code);
        assert!(!c.tracing.selector_fallback);
        assert_eq!(c.receipt.poll_interval_ms, 250);
        assert_eq!(c.log.level, "info");
        assert!(c.contract_map_file.is_none());
    }

    #[test]
    fn nested_sections_override() {
        let c = ClientConfig::from_toml_str(
            r#"
            rpc_url = "http://node:8545"
            contract_map_file = "deployed_contracts_simulated_1337.toml"

            [tracing]
            mode = "all"
            selector_fallback = true

            [receipt]
            poll_interval_ms = 50

            [log]
            level = "debug"
            json = true
            [log.components]
            chaintrace-evm = "trace"
            "#,
        )
        .unwrap();
        assert_eq!(c.tracing.mode, TracingMode::All);
        assert!(c.tracing.selector_fallback);
        assert_eq!(c.tracing.timeout_ms, 30_000);
        assert_eq!(c.receipt.poll_interval_ms, 50);
        assert!(c.log.json);
        assert_eq!(c.log.components["chaintrace-evm"], "trace");
        assert!(c.contract_map_file.is_some());
    }

    #[test]
    fn zero_timeouts_are_rejected() {
        let err = ClientConfig::from_toml_str(
            r#"
            rpc_url = "http://node:8545"
            [receipt]
            poll_interval_ms = 0
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("receipt.poll_interval_ms"));
    }

    #[test]
    fn empty_url_is_rejected() {
        assert!(ClientConfig::new("  ").validate().is_err());
        assert!(ClientConfig::new("http://x").validate().is_ok());
    }

    #[test]
    fn unknown_mode_is_a_config_error() {
        let err = ClientConfig::from_toml_str(
            r#"
            rpc_url = "http://node:8545"
            [tracing]
            mode = "sometimes"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ClientError::Config { .. }));
    }

    #[test]
    fn retry_settings_convert() {
        let r = RetrySettings::default().to_retry_config();
        assert_eq!(r.initial_backoff, Duration::from_millis(100));
        assert_eq!(r.max_backoff, Duration::from_secs(10));
    }
}
