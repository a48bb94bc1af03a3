use anyhow::Result;
use clap::ArgMatches;
use colored::Colorize;

use crate::core::config::EngineConfig;

pub fn execute(matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("show", _)) => {
            let config = EngineConfig::load()?.validate();
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Some(("path", _)) => {
            println!("{}", EngineConfig::get_config_path()?.display());
        }
        Some(("reset", _)) => {
            EngineConfig::default().save()?;
            println!("{}", "Configuration reset to defaults".green());
        }
        _ => {
            println!("Use 'taskscope config --help' for more information.");
        }
    }
    Ok(())
}
