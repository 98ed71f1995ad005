// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Herald relay.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup.

use serde::{Deserialize, Serialize};

/// Top-level Herald configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HeraldConfig {
    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,

    /// Pooled sender accounts, in index order.
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,

    /// Single-account shorthand, used only when `accounts` is empty.
    #[serde(default)]
    pub bot_token: Option<String>,

    /// Account selection and shutdown behavior.
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Humanized pacing parameters.
    #[serde(default)]
    pub delay: DelayConfig,

    /// Duplicate-suppression table settings.
    #[serde(default)]
    pub dedup: DedupConfig,

    /// Event-stream ingress settings.
    #[serde(default)]
    pub watch: WatchConfig,

    /// HTTP ingress settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Prometheus metrics settings.
    #[serde(default)]
    pub prometheus: PrometheusConfig,
}

impl HeraldConfig {
    /// The effective account list.
    ///
    /// Falls back to a single account built from the top-level `bot_token`
    /// when no `[[accounts]]` entries are configured.
    pub fn resolved_accounts(&self) -> Vec<AccountConfig> {
        if !self.accounts.is_empty() {
            return self.accounts.clone();
        }
        match &self.bot_token {
            Some(token) => vec![AccountConfig {
                name: None,
                bot_token: token.clone(),
            }],
            None => Vec::new(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// One pooled account.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AccountConfig {
    /// Display name. Defaults to `account_<bot id>`.
    #[serde(default)]
    pub name: Option<String>,

    /// Bot API token (`<bot id>:<secret>`).
    pub bot_token: String,
}

impl AccountConfig {
    /// The configured name, or one derived from the token's bot id.
    pub fn display_name(&self, index: usize) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        match self.bot_token.split_once(':') {
            Some((id, _)) if !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()) => {
                format!("account_{id}")
            }
            _ => format!("account_{index}"),
        }
    }
}

/// Account selection and shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DispatchConfig {
    /// `round_robin`, `random`, or `fixed_first`. Unknown values behave as
    /// `fixed_first` with a startup warning.
    #[serde(default = "default_distribution_strategy")]
    pub distribution_strategy: String,

    /// Seconds to wait for the queue to drain on shutdown.
    #[serde(default = "default_drain_timeout_secs")]
    pub drain_timeout_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            distribution_strategy: default_distribution_strategy(),
            drain_timeout_secs: default_drain_timeout_secs(),
        }
    }
}

fn default_distribution_strategy() -> String {
    "round_robin".to_string()
}

fn default_drain_timeout_secs() -> u64 {
    30
}

/// Humanized pacing parameters. All values are seconds unless noted.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DelayConfig {
    /// Base interval between sends.
    #[serde(default = "default_send_interval")]
    pub send_interval: f64,

    /// Upper bound of the Beta(2,2) jitter added to the interval.
    #[serde(default = "default_send_jitter")]
    pub send_jitter: f64,

    #[serde(default = "default_think_time_min")]
    pub think_time_min: f64,

    #[serde(default = "default_think_time_max")]
    pub think_time_max: f64,

    #[serde(default = "default_operation_delay_min")]
    pub operation_delay_min: f64,

    #[serde(default = "default_operation_delay_max")]
    pub operation_delay_max: f64,

    /// Extra seconds per task already waiting in the queue.
    #[serde(default = "default_batch_delay_factor")]
    pub batch_delay_factor: f64,

    /// Probability (0..=1) of resting after a successful send.
    #[serde(default = "default_rest_probability")]
    pub rest_probability: f64,

    #[serde(default = "default_rest_time_min")]
    pub rest_time_min: f64,

    #[serde(default = "default_rest_time_max")]
    pub rest_time_max: f64,
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            send_interval: default_send_interval(),
            send_jitter: default_send_jitter(),
            think_time_min: default_think_time_min(),
            think_time_max: default_think_time_max(),
            operation_delay_min: default_operation_delay_min(),
            operation_delay_max: default_operation_delay_max(),
            batch_delay_factor: default_batch_delay_factor(),
            rest_probability: default_rest_probability(),
            rest_time_min: default_rest_time_min(),
            rest_time_max: default_rest_time_max(),
        }
    }
}

fn default_send_interval() -> f64 {
    2.0
}

fn default_send_jitter() -> f64 {
    1.0
}

fn default_think_time_min() -> f64 {
    0.5
}

fn default_think_time_max() -> f64 {
    2.0
}

fn default_operation_delay_min() -> f64 {
    0.2
}

fn default_operation_delay_max() -> f64 {
    0.8
}

fn default_batch_delay_factor() -> f64 {
    0.3
}

fn default_rest_probability() -> f64 {
    0.05
}

fn default_rest_time_min() -> f64 {
    10.0
}

fn default_rest_time_max() -> f64 {
    30.0
}

/// Duplicate-suppression table configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DedupConfig {
    /// Seconds between retention sweeps.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Seconds a fingerprint is remembered.
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval_secs(),
            retention_secs: default_retention_secs(),
        }
    }
}

fn default_sweep_interval_secs() -> u64 {
    300
}

fn default_retention_secs() -> u64 {
    1800
}

/// Event-stream ingress configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WatchConfig {
    /// Listen to every account's incoming messages.
    #[serde(default)]
    pub enabled: bool,

    /// Only messages from this sender handle are relayed.
    #[serde(default)]
    pub target_username: Option<String>,

    /// Fixed relay destination. `None` relays back into the source chat.
    #[serde(default)]
    pub destination: Option<String>,

    /// Drop messages dated before the listener started.
    #[serde(default = "default_ignore_history")]
    pub ignore_history: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            target_username: None,
            destination: None,
            ignore_history: default_ignore_history(),
        }
    }
}

fn default_ignore_history() -> bool {
    true
}

/// HTTP ingress configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Enable the HTTP API.
    #[serde(default = "default_gateway_enabled")]
    pub enabled: bool,

    /// Host address to bind.
    #[serde(default = "default_gateway_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bearer token required on `/api/send`. `None` leaves it open.
    #[serde(default)]
    pub bearer_token: Option<String>,

    /// Timeout for fetching photo URLs.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Maximum request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: default_gateway_enabled(),
            host: default_gateway_host(),
            port: default_gateway_port(),
            bearer_token: None,
            fetch_timeout_secs: default_fetch_timeout_secs(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_gateway_enabled() -> bool {
    true
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    8000
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

fn default_max_body_bytes() -> usize {
    20 * 1024 * 1024
}

/// Prometheus metrics configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PrometheusConfig {
    /// Install the recorder and serve `/metrics`.
    #[serde(default)]
    pub enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_prefers_configured_name() {
        let account = AccountConfig {
            name: Some("alpha".into()),
            bot_token: "123:abc".into(),
        };
        assert_eq!(account.display_name(0), "alpha");
    }

    #[test]
    fn display_name_derives_from_bot_id() {
        let account = AccountConfig {
            name: None,
            bot_token: "987654:secret".into(),
        };
        assert_eq!(account.display_name(3), "account_987654");
    }

    #[test]
    fn display_name_falls_back_to_index() {
        let account = AccountConfig {
            name: None,
            bot_token: "not-a-token".into(),
        };
        assert_eq!(account.display_name(2), "account_2");
    }

    #[test]
    fn legacy_bot_token_becomes_single_account() {
        let config = HeraldConfig {
            bot_token: Some("1:a".into()),
            ..Default::default()
        };
        let accounts = config.resolved_accounts();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].bot_token, "1:a");
    }

    #[test]
    fn explicit_accounts_win_over_legacy_token() {
        let config = HeraldConfig {
            bot_token: Some("1:a".into()),
            accounts: vec![
                AccountConfig {
                    name: None,
                    bot_token: "2:b".into(),
                },
                AccountConfig {
                    name: None,
                    bot_token: "3:c".into(),
                },
            ],
            ..Default::default()
        };
        let accounts = config.resolved_accounts();
        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].bot_token, "2:b");
    }
}
