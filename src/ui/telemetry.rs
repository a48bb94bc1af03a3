use colored::Colorize;

use super::formatters::{format_bytes, format_percent, format_rate, load_color, truncate, usage_bar};
use crate::core::gpu::{GpuAdapterDynamicInfo, GpuDetailInfo};
use crate::core::process::{ProcessCategory, ProcessRecord};
use crate::core::runtime::TelemetrySnapshot;
use crate::core::tasks::SystemUsage;

const NAME_WIDTH: usize = 28;
const USER_WIDTH: usize = 20;

/// Column the process table is ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessSort {
    Cpu,
    Memory,
    Disk,
    Pid,
    Name,
}

impl ProcessSort {
    pub fn from_arg(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "cpu" => Some(ProcessSort::Cpu),
            "memory" | "mem" => Some(ProcessSort::Memory),
            "disk" | "io" => Some(ProcessSort::Disk),
            "pid" => Some(ProcessSort::Pid),
            "name" => Some(ProcessSort::Name),
            _ => None,
        }
    }
}

/// Order `records` by `sort` (descending for load columns) and keep `top`.
pub fn rank_processes(records: &[ProcessRecord], sort: ProcessSort, top: usize) -> Vec<&ProcessRecord> {
    let mut ranked: Vec<&ProcessRecord> = records.iter().collect();
    match sort {
        ProcessSort::Cpu => ranked.sort_by(|a, b| b.cpu_usage.total_cmp(&a.cpu_usage).then(a.pid.cmp(&b.pid))),
        ProcessSort::Memory => {
            ranked.sort_by(|a, b| b.working_set_bytes.cmp(&a.working_set_bytes).then(a.pid.cmp(&b.pid)))
        }
        ProcessSort::Disk => ranked.sort_by(|a, b| {
            let a_io = a.read_bytes_per_sec + a.write_bytes_per_sec;
            let b_io = b.read_bytes_per_sec + b.write_bytes_per_sec;
            b_io.cmp(&a_io).then(a.pid.cmp(&b.pid))
        }),
        ProcessSort::Pid => ranked.sort_by_key(|r| r.pid),
        ProcessSort::Name => ranked.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase())),
    }
    ranked.truncate(top);
    ranked
}

fn category_label(category: ProcessCategory) -> colored::ColoredString {
    match category {
        ProcessCategory::Application => "app".cyan(),
        ProcessCategory::Background => "bg".normal(),
        ProcessCategory::SystemWindow => "sys".magenta(),
    }
}

fn print_section_header(title: &str) {
    println!("\n{}", title.bold().green());
    println!("{}", "-".repeat(title.len()));
}

pub fn print_process_table(records: &[ProcessRecord], sort: ProcessSort, top: usize) {
    print_section_header(&format!("PROCESSES ({} total)", records.len()));
    println!(
        "{:>7} {:<name$} {:>4} {:>7} {:>11} {:>12} {:>12} {:<user$}",
        "PID",
        "NAME",
        "TYPE",
        "CPU",
        "MEMORY",
        "READ",
        "WRITE",
        "USER",
        name = NAME_WIDTH,
        user = USER_WIDTH,
    );

    for record in rank_processes(records, sort, top) {
        println!(
            "{:>7} {:<name$} {:>4} {} {:>11} {:>12} {:>12} {:<user$}",
            record.pid,
            truncate(&record.name, NAME_WIDTH),
            category_label(record.category),
            load_color(format_percent(record.cpu_usage), record.cpu_usage),
            format_bytes(record.working_set_bytes),
            format_rate(record.read_bytes_per_sec),
            format_rate(record.write_bytes_per_sec),
            truncate(&record.username, USER_WIDTH).dimmed(),
            name = NAME_WIDTH,
            user = USER_WIDTH,
        );
    }
}

pub fn print_gpu_report(info: &GpuDetailInfo, usage: &GpuAdapterDynamicInfo, provider: &str) {
    print_section_header("GPU");
    println!("  Name: {}", info.name.bold());
    if !info.driver_version.is_empty() {
        match info.driver_date {
            Some(date) => println!("  Driver: {} ({})", info.driver_version, date),
            None => println!("  Driver: {}", info.driver_version),
        }
    }
    if info.total_dedicated_bytes > 0 {
        println!("  Dedicated Memory: {}", format_bytes(info.total_dedicated_bytes));
    }
    if info.total_shared_bytes > 0 {
        println!("  Shared Memory: {}", format_bytes(info.total_shared_bytes));
    }
    println!("  Provider: {}", provider.dimmed());
    println!(
        "  Usage: {} {}",
        usage_bar(usage.global_usage_percent, 30),
        format_percent(usage.global_usage_percent)
    );
    println!(
        "  3D: {}  Compute: {}",
        format_percent(usage.three_d_percent),
        format_percent(usage.compute_percent)
    );
    println!(
        "  Memory Used: {} dedicated, {} shared",
        format_bytes(usage.dedicated_memory_used),
        format_bytes(usage.shared_memory_used)
    );

    for adapter in &usage.adapters {
        println!(
            "    {} {} {}  copy {}  dec {}  enc {}  mem {}",
            truncate(&adapter.adapter_key, 32).cyan(),
            usage_bar(adapter.usage_percent, 20),
            format_percent(adapter.usage_percent),
            format_percent(adapter.copy_percent),
            format_percent(adapter.video_decode_percent),
            format_percent(adapter.video_encode_percent),
            format_bytes(adapter.dedicated_memory_used),
        );
    }
}

pub fn print_system_usage(system: &SystemUsage) {
    print_section_header("SYSTEM");
    println!("  CPU:     {} {}", usage_bar(system.cpu_percent, 30), format_percent(system.cpu_percent));
    let memory = system.memory.used_percentage();
    println!(
        "  Memory:  {} {}  ({} / {})",
        usage_bar(memory, 30),
        format_percent(memory),
        format_bytes(system.memory.used_physical_bytes),
        format_bytes(system.memory.total_physical_bytes)
    );
    println!(
        "  Disk:    {} {}  read {}  write {}",
        usage_bar(system.disk.active_time_percent, 30),
        format_percent(system.disk.active_time_percent),
        format_rate(system.disk.read_bytes_per_sec as u64),
        format_rate(system.disk.write_bytes_per_sec as u64)
    );
    println!(
        "  Network: sent {}  received {}",
        format_rate(system.network.bytes_sent_per_sec as u64),
        format_rate(system.network.bytes_received_per_sec as u64)
    );
}

/// One frame of the watch view.
pub fn print_watch_frame(snapshot: &TelemetrySnapshot, sort: ProcessSort, top: usize) {
    println!(
        "\n{} tick {}  +{} ~{} -{}",
        "TASKSCOPE".bold().bright_cyan(),
        snapshot.process_ticks,
        snapshot.last_delta.added,
        snapshot.last_delta.updated,
        snapshot.last_delta.removed,
    );
    if let Some(error) = &snapshot.process_error {
        println!("{}", format!("Process sampling failed: {}", error).yellow());
    }
    print_system_usage(&snapshot.system);
    println!(
        "\n  GPU: {} {}  ({})",
        usage_bar(snapshot.gpu.global_usage_percent, 30),
        format_percent(snapshot.gpu.global_usage_percent),
        snapshot.gpu_provider.dimmed()
    );
    print_process_table(&snapshot.processes, sort, top);
}
