//! One-shot process table.

use std::thread;

use anyhow::Result;
use clap::ArgMatches;
use log::warn;

use super::{load_config, sort_arg, top_arg};
use crate::core::process::ProcessDeltaEngine;
use crate::platform;
use crate::ui::{print_process_table, rank_processes};

pub fn execute(matches: &ArgMatches) -> Result<()> {
    let config = load_config(matches)?;
    let json = matches.get_flag("json");
    let sort = sort_arg(matches);
    let top = top_arg(matches);

    let mut engine = ProcessDeltaEngine::new(platform::process_backends(), config.process.clone());

    // CPU and disk rates need a baseline tick.
    engine.tick()?;
    thread::sleep(config.process.tick_interval());
    if let Err(e) = engine.tick() {
        warn!("Second process sample failed, rates are from the first: {}", e);
    }

    let records = engine.snapshot();
    if json {
        let ranked: Vec<_> = rank_processes(&records, sort, top);
        println!("{}", serde_json::to_string_pretty(&ranked)?);
    } else {
        print_process_table(&records, sort, top);
    }
    Ok(())
}
