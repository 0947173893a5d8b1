pub mod config;

use std::path::Path;

use anyhow::Context;
use clap::{Parser, Subcommand};
use pf_domain::config::Config;

/// How long `run` keeps going after stdin closes, so debounced calls still fire.
pub const DEFAULT_LINGER_MS: u64 = 250;

/// particle-flow: run Particle device-cloud flow nodes from a TOML file.
#[derive(Debug, Parser)]
#[command(name = "particle-flow", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Spawn the configured nodes and pump JSON lines (default).
    Run {
        /// Milliseconds to keep running after stdin reaches EOF.
        #[arg(long, default_value_t = DEFAULT_LINGER_MS)]
        linger_ms: u64,
    },
    /// Parse the flow file and report any problems.
    Validate,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the flow file named by `PF_CONFIG` (or `flow.toml` by default).
/// Returns the parsed [`Config`] and the path that was used.
pub fn load_config() -> anyhow::Result<(Config, String)> {
    let config_path = std::env::var("PF_CONFIG").unwrap_or_else(|_| "flow.toml".into());
    let config = load_config_from(Path::new(&config_path))?;
    Ok((config, config_path))
}

/// Parse `path`; a missing file yields the defaults (no nodes).
pub fn load_config_from(path: &Path) -> anyhow::Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}
