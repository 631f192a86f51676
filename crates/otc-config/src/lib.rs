//! Runtime configuration (§6.3): one `clap` `Parser` struct covering
//! every recognized option, each overridable by an environment
//! variable of the same name.

#![warn(rust_2018_idioms)]

use clap::Parser;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// `otc-broker`'s top-level configuration.
#[derive(Parser, Debug, Clone)]
#[command(name = "otc-broker", about = "OTC atomic-swap broker")]
pub struct Config {
    /// Base URL used to build `createDeal`'s shareable links.
    #[arg(long, env = "BASE_URL")]
    pub base_url: String,

    /// Port the JSON-RPC HTTP server binds to.
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Engine tick interval.
    #[arg(long, env = "TICK_INTERVAL_MS", default_value_t = 5_000)]
    pub tick_interval_ms: u64,

    /// Terminal-failure threshold for a transaction queue item.
    #[arg(long, env = "MAX_ATTEMPTS_PER_ITEM", default_value_t = 10)]
    pub max_attempts_per_item: u32,

    /// RocksDB data directory.
    #[arg(long, env = "DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    /// Repeatable `CHAIN_ID=ADDRESS`; the broker's operator/commission
    /// wallet on each supported chain.
    #[arg(long = "operator-address", value_parser = parse_key_value)]
    pub operator_address: Vec<(String, String)>,

    /// Repeatable `KEY=VALUE`, passed through verbatim to whichever
    /// chain plugin recognizes `KEY`'s prefix.
    #[arg(long = "plugin-config", value_parser = parse_key_value)]
    pub plugin_config: Vec<(String, String)>,
}

impl Config {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn operator_addresses(&self) -> HashMap<String, String> {
        self.operator_address.iter().cloned().collect()
    }

    pub fn plugin_config(&self) -> HashMap<String, String> {
        self.plugin_config.iter().cloned().collect()
    }
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s.split_once('=').ok_or_else(|| format!("expected KEY=VALUE, got `{s}`"))?;
    if key.is_empty() {
        return Err(format!("empty key in `{s}`"));
    }
    Ok((key.to_string(), value.to_string()))
}
