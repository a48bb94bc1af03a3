// Command handlers module
pub mod config;
pub mod counters;
pub mod gpu;
pub mod processes;
pub mod version;
pub mod watch;

// Re-exports for cleaner imports
pub use gpu::execute as gpu;
pub use processes::execute as processes;
pub use version::execute as version;
pub use watch::execute as watch;

use anyhow::{Context, Result};
use clap::ArgMatches;

use crate::core::config::EngineConfig;
use crate::ui::ProcessSort;

/// Saved configuration with command-line overrides applied.
pub fn load_config(matches: &ArgMatches) -> Result<EngineConfig> {
    let mut config = EngineConfig::load().context("Failed to load configuration")?;
    if let Some(&interval) = matches.try_get_one::<u64>("interval").ok().flatten() {
        config.process.tick_interval_ms = interval;
    }
    if let Some(&alpha) = matches.try_get_one::<f64>("alpha").ok().flatten() {
        config.gpu.ema_alpha = alpha;
    }
    Ok(config.validate())
}

fn sort_arg(matches: &ArgMatches) -> ProcessSort {
    matches
        .try_get_one::<String>("sort")
        .ok()
        .flatten()
        .and_then(|value| ProcessSort::from_arg(value))
        .unwrap_or(ProcessSort::Cpu)
}

fn top_arg(matches: &ArgMatches) -> usize {
    matches.try_get_one::<usize>("top").ok().flatten().copied().unwrap_or(15)
}
