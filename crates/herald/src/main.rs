// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Herald - multi-account chat relay.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod serve;
mod shutdown;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use herald_config::{ConfigError, HeraldConfig};
use herald_dispatch::DistributionPolicy;

/// Herald - relays chat messages through a pool of accounts.
#[derive(Parser, Debug)]
#[command(name = "herald", version, about, long_about = None)]
struct Cli {
    /// Configuration file, replacing the standard search path.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// Start relaying (the default).
    Serve,
    /// Validate the configuration and print a summary.
    Check,
}

fn load_config(path: Option<&PathBuf>) -> Result<HeraldConfig, Vec<ConfigError>> {
    match path {
        Some(path) => herald_config::load_and_validate_path(path),
        None => herald_config::load_and_validate(),
    }
}

fn summarize(config: &HeraldConfig) -> String {
    let accounts = config.resolved_accounts();
    let names: Vec<String> = accounts
        .iter()
        .enumerate()
        .map(|(i, a)| a.display_name(i))
        .collect();
    format!(
        "accounts: {} ({})\npolicy: {}\nwatch: {}\ngateway: {}",
        accounts.len(),
        names.join(", "),
        DistributionPolicy::from_config(&config.dispatch.distribution_strategy),
        if config.watch.enabled { "enabled" } else { "disabled" },
        if config.gateway.enabled {
            format!("{}:{}", config.gateway.host, config.gateway.port)
        } else {
            "disabled".to_string()
        },
    )
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_ref()) {
        Ok(config) => config,
        Err(errors) => {
            herald_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("herald: {e}");
                std::process::exit(1);
            }
        }
        Commands::Check => {
            println!("configuration ok\n{}", summarize(&config));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        // Only jemalloc supports advancing the stats epoch.
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::try_parse_from(["herald"]).unwrap();
        assert_eq!(cli.command, None);
        assert_eq!(cli.config, None);
    }

    #[test]
    fn config_flag_is_global() {
        let cli = Cli::try_parse_from(["herald", "check", "--config", "/tmp/h.toml"]).unwrap();
        assert_eq!(cli.command, Some(Commands::Check));
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/h.toml")));
    }

    #[test]
    fn summary_lists_accounts_and_policy() {
        let config = herald_config::load_and_validate_str(
            r#"
            [[accounts]]
            name = "alpha"
            bot_token = "1:a"

            [[accounts]]
            bot_token = "2:b"

            [dispatch]
            distribution_strategy = "random"

            [gateway]
            enabled = false
            "#,
        )
        .unwrap();
        let summary = summarize(&config);
        assert!(summary.contains("accounts: 2 (alpha, account_2)"));
        assert!(summary.contains("policy: random"));
        assert!(summary.contains("gateway: disabled"));
    }
}
