use anyhow::Result;

pub fn execute() -> Result<()> {
    println!("taskscope version {}", env!("CARGO_PKG_VERSION"));
    Ok(())
}
