//! Config Command
//!
//! Usage:
//!   repodiagram config show [-f toml|json]
//!   repodiagram config path

use crate::config::{Config, ConfigLoader};
use crate::types::Result;

/// Print the effective configuration with secrets omitted
pub fn show(config: &Config, format: &str) -> Result<()> {
    let rendered = ConfigLoader::render(config, format == "json")?;
    println!("{}", rendered);

    let keys = [
        ("llm.api_key", config.llm.api_key.is_some()),
        ("github.token", config.github.token.is_some()),
    ];
    for (name, present) in keys {
        println!(
            "# {}: {}",
            name,
            if present { "set" } else { "not set" }
        );
    }
    Ok(())
}

pub fn path() -> Result<()> {
    ConfigLoader::show_path();
    Ok(())
}
