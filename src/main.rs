use anyhow::Result;
use clap::{value_parser, Arg, ArgAction, Command};

use taskscope::commands;

fn sort_arg() -> Arg {
    Arg::new("sort")
        .short('s')
        .long("sort")
        .value_name("KEY")
        .help("Sort processes by cpu, memory, disk, pid or name")
        .value_parser(["cpu", "memory", "disk", "pid", "name"])
        .default_value("cpu")
}

fn top_arg() -> Arg {
    Arg::new("top")
        .short('n')
        .long("top")
        .value_name("COUNT")
        .help("Number of processes to show")
        .value_parser(value_parser!(usize))
        .default_value("15")
}

fn json_arg() -> Arg {
    Arg::new("json")
        .long("json")
        .help("Print JSON instead of tables")
        .action(ArgAction::SetTrue)
}

fn build_cli() -> Command {
    Command::new("taskscope")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Live process and GPU telemetry")
        .disable_version_flag(true)
        .arg(
            Arg::new("version")
                .short('v')
                .short_alias('V')
                .long("version")
                .help("Print version information")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("interval")
                .short('i')
                .long("interval")
                .value_name("MS")
                .help("Process sampling interval in milliseconds")
                .value_parser(value_parser!(u64))
                .global(true),
        )
        .arg(
            Arg::new("alpha")
                .long("alpha")
                .value_name("ALPHA")
                .help("GPU usage smoothing factor in (0, 1]")
                .value_parser(value_parser!(f64))
                .global(true),
        )
        .subcommand(
            Command::new("processes")
                .alias("ps")
                .about("Sample the process table once and print it")
                .arg(sort_arg())
                .arg(top_arg())
                .arg(json_arg()),
        )
        .subcommand(
            Command::new("gpu")
                .about("Show GPU identity and current usage")
                .arg(json_arg()),
        )
        .subcommand(
            Command::new("watch")
                .about("Stream live telemetry until interrupted")
                .arg(sort_arg())
                .arg(top_arg())
                .arg(json_arg())
                .arg(
                    Arg::new("count")
                        .short('c')
                        .long("count")
                        .value_name("FRAMES")
                        .help("Stop after this many updates")
                        .value_parser(value_parser!(u64)),
                ),
        )
        .subcommand(
            Command::new("counters")
                .about("Inspect performance counter names")
                .subcommand_required(true)
                .arg_required_else_help(true)
                .subcommand(Command::new("list").about("List counter categories"))
                .subcommand(
                    Command::new("resolve")
                        .about("Resolve a category from candidate names")
                        .arg(
                            Arg::new("candidates")
                                .help("Candidate category names, in priority order")
                                .required(true)
                                .num_args(1..),
                        )
                        .arg(
                            Arg::new("counter")
                                .long("counter")
                                .value_name("NAME")
                                .help("Also resolve a counter inside the category"),
                        ),
                ),
        )
        .subcommand(
            Command::new("config")
                .about("Manage configuration")
                .subcommand_required(true)
                .arg_required_else_help(true)
                .subcommand(Command::new("show").about("Print the effective configuration"))
                .subcommand(Command::new("path").about("Print the configuration file path"))
                .subcommand(Command::new("reset").about("Restore default configuration")),
        )
        .subcommand(Command::new("version").about("Shows version information"))
}

fn main() -> Result<()> {
    taskscope::init_logging();

    let matches = build_cli().get_matches();

    if matches.get_flag("version") {
        return commands::version();
    }

    match matches.subcommand() {
        Some(("processes", sub_matches)) => commands::processes(sub_matches)?,
        Some(("gpu", sub_matches)) => commands::gpu(sub_matches)?,
        Some(("watch", sub_matches)) => commands::watch(sub_matches)?,
        Some(("counters", sub_matches)) => commands::counters::execute(sub_matches)?,
        Some(("config", sub_matches)) => commands::config::execute(sub_matches)?,
        Some(("version", _)) => commands::version()?,
        _ => {
            println!("Welcome to taskscope!");
            println!("Use 'taskscope --help' for more information.");
        }
    }

    Ok(())
}
