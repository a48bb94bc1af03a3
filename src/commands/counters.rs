//! Counter name diagnostics.

use anyhow::Result;
use clap::ArgMatches;
use colored::Colorize;

use crate::core::counters::CounterResolver;
use crate::platform;

pub fn execute(matches: &ArgMatches) -> Result<()> {
    let resolver = CounterResolver::new(platform::counter_backend());

    match matches.subcommand() {
        Some(("list", _)) => {
            let mut categories = resolver.backend().list_categories()?;
            categories.sort_by_key(|c| c.to_lowercase());
            for category in categories {
                println!("{}", category);
            }
        }
        Some(("resolve", sub_matches)) => {
            let candidates: Vec<&str> = sub_matches
                .get_many::<String>("candidates")
                .map(|values| values.map(String::as_str).collect())
                .unwrap_or_default();

            match resolver.resolve_category(&candidates) {
                Ok(category) => {
                    println!("{} {}", "Category:".bold(), category.green());
                    if let Some(counter) = sub_matches.get_one::<String>("counter") {
                        let resolved = resolver.resolve_counter(&category, &[counter.as_str()]);
                        println!("{} {}", "Counter:".bold(), resolved.green());
                    }
                }
                Err(e) => println!("{}", e.to_string().yellow()),
            }
        }
        _ => {
            println!("Use 'taskscope counters --help' for more information.");
        }
    }
    Ok(())
}
