//! Continuous sampling through the background runtime.

use anyhow::{Context, Result};
use clap::ArgMatches;

use super::{load_config, sort_arg, top_arg};
use crate::core::runtime::TelemetryRuntime;
use crate::platform;
use crate::ui::print_watch_frame;

pub fn execute(matches: &ArgMatches) -> Result<()> {
    let config = load_config(matches)?;
    let json = matches.get_flag("json");
    let sort = sort_arg(matches);
    let top = top_arg(matches);
    let count = matches.get_one::<u64>("count").copied();

    let engines = platform::build_engines(&config);
    let mut runtime = TelemetryRuntime::start(engines, &config).context("Failed to start telemetry runtime")?;
    // Wait up to a few intervals for each frame before giving up.
    let timeout = config.process.tick_interval() * 5;

    let mut frames = 0u64;
    while count.map_or(true, |limit| frames < limit) {
        let Some(snapshot) = runtime.wait_for_update(timeout) else {
            log::warn!("No telemetry update within {} ms", timeout.as_millis());
            break;
        };
        if json {
            println!("{}", serde_json::to_string(snapshot.as_ref())?);
        } else {
            print_watch_frame(&snapshot, sort, top);
        }
        frames += 1;
    }

    runtime.shutdown();
    Ok(())
}
