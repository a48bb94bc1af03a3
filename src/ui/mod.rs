// Terminal output

pub mod formatters;
pub mod telemetry;

pub use formatters::{format_bytes, format_percent, format_rate, truncate, usage_bar};
pub use telemetry::{
    print_gpu_report, print_process_table, print_system_usage, print_watch_frame, rank_processes, ProcessSort,
};
