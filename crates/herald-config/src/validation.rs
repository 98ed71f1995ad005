// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Collects every violation instead of failing on the first one.

use std::collections::HashSet;

use herald_core::ChatTarget;

use crate::diagnostic::ConfigError;
use crate::model::{DelayConfig, HeraldConfig};

/// Validate a deserialized configuration for semantic correctness.
pub fn validate_config(config: &HeraldConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    validate_accounts(config, &mut errors);
    validate_delay(&config.delay, &mut errors);

    if config.dedup.sweep_interval_secs == 0 {
        errors.push(ConfigError::validation(
            "dedup.sweep_interval_secs must be greater than 0",
        ));
    }

    if config.watch.enabled {
        let target = config
            .watch
            .target_username
            .as_deref()
            .map(|t| t.trim().trim_start_matches('@'))
            .unwrap_or("");
        if target.is_empty() {
            errors.push(ConfigError::validation(
                "watch.target_username is required when watch.enabled = true",
            ));
        }
    }

    if let Some(dest) = &config.watch.destination
        && dest.parse::<ChatTarget>().is_err()
    {
        errors.push(ConfigError::validation(format!(
            "watch.destination `{dest}` is neither a chat id nor an @handle"
        )));
    }

    if config.gateway.enabled && config.gateway.host.trim().is_empty() {
        errors.push(ConfigError::validation("gateway.host must not be empty"));
    }

    if config.gateway.fetch_timeout_secs == 0 {
        errors.push(ConfigError::validation(
            "gateway.fetch_timeout_secs must be greater than 0",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_accounts(config: &HeraldConfig, errors: &mut Vec<ConfigError>) {
    let accounts = config.resolved_accounts();
    if accounts.is_empty() {
        errors.push(ConfigError::validation(
            "at least one account is required: add an [[accounts]] entry or set bot_token",
        ));
        return;
    }

    let mut seen_names = HashSet::new();
    for (i, account) in accounts.iter().enumerate() {
        if account.bot_token.trim().is_empty() {
            errors.push(ConfigError::validation(format!(
                "accounts[{i}].bot_token must not be empty"
            )));
        }
        let name = account.display_name(i);
        if name.trim().is_empty() {
            errors.push(ConfigError::validation(format!(
                "accounts[{i}].name must not be empty"
            )));
        } else if !seen_names.insert(name.clone()) {
            errors.push(ConfigError::validation(format!(
                "duplicate account name `{name}` in [[accounts]]"
            )));
        }
    }
}

/// Upper bound, in seconds, for every configured delay value.
pub const MAX_DELAY_SECS: f64 = 86_400.0;

/// Checks pacing values: each must be finite, non-negative and at most
/// [`MAX_DELAY_SECS`], ranges must not be inverted, and the rest
/// probability must lie in `[0, 1]`.
pub fn validate_delay(delay: &DelayConfig, errors: &mut Vec<ConfigError>) {
    let scalars = [
        ("send_interval", delay.send_interval),
        ("send_jitter", delay.send_jitter),
        ("batch_delay_factor", delay.batch_delay_factor),
    ];
    for (key, value) in scalars {
        if !in_bounds(value) {
            errors.push(ConfigError::validation(format!(
                "delay.{key} must be a number between 0 and {MAX_DELAY_SECS}, got {value}"
            )));
        }
    }

    let ranges = [
        ("think_time", delay.think_time_min, delay.think_time_max),
        (
            "operation_delay",
            delay.operation_delay_min,
            delay.operation_delay_max,
        ),
        ("rest_time", delay.rest_time_min, delay.rest_time_max),
    ];
    for (key, min, max) in ranges {
        if !in_bounds(min) || !in_bounds(max) {
            errors.push(ConfigError::validation(format!(
                "delay.{key}_min/max must be numbers between 0 and {MAX_DELAY_SECS}"
            )));
        } else if min > max {
            errors.push(ConfigError::validation(format!(
                "delay.{key}_min ({min}) must not exceed delay.{key}_max ({max})"
            )));
        }
    }

    if !(0.0..=1.0).contains(&delay.rest_probability) {
        errors.push(ConfigError::validation(format!(
            "delay.rest_probability must be within [0, 1], got {}",
            delay.rest_probability
        )));
    }
}

fn in_bounds(value: f64) -> bool {
    (0.0..=MAX_DELAY_SECS).contains(&value)
}
