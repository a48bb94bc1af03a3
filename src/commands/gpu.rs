//! GPU identity and a short usage sample.

use std::thread;

use anyhow::Result;
use clap::ArgMatches;
use serde_json::json;

use super::load_config;
use crate::platform;
use crate::ui::print_gpu_report;

/// Readings taken before reporting, so smoothing and rate counters settle.
const WARMUP_SAMPLES: usize = 3;

pub fn execute(matches: &ArgMatches) -> Result<()> {
    let config = load_config(matches)?;
    let mut service = platform::build_gpu_service(&config, platform::counter_backend());

    let mut usage = service.usage();
    for _ in 1..WARMUP_SAMPLES {
        thread::sleep(config.gpu.min_sampling_interval());
        usage = service.usage();
    }

    if matches.get_flag("json") {
        let report = json!({
            "provider": service.provider_name(),
            "info": service.static_info(),
            "usage": usage,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_gpu_report(service.static_info(), &usage, &service.provider_name());
    }
    Ok(())
}
