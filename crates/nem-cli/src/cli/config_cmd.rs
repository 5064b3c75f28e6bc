use crate::cli::ConfigCommands;
use crate::config::NemConfig;
use anyhow::Result;
use std::path::{Path, PathBuf};

pub fn run(cmd: ConfigCommands, config_path: &Path, data_dir: Option<PathBuf>) -> Result<()> {
    match cmd {
        ConfigCommands::Validate => validate(config_path, data_dir),
        ConfigCommands::Show => show(config_path, data_dir),
    }
}

fn validate(config_path: &Path, data_dir: Option<PathBuf>) -> Result<()> {
    let config = match NemConfig::load_or_default(config_path) {
        Ok(config) => config.with_data_dir(data_dir),
        Err(e) => {
            println!("Failed to parse {}: {:#}", config_path.display(), e);
            std::process::exit(1);
        }
    };

    let errors = config.validate();
    if errors.is_empty() {
        println!("{} is valid.", config_path.display());
        return Ok(());
    }
    println!("Validation errors in {}:", config_path.display());
    for e in &errors {
        println!("  - {}", e);
    }
    std::process::exit(1);
}

fn show(config_path: &Path, data_dir: Option<PathBuf>) -> Result<()> {
    let config = NemConfig::load_or_default(config_path)?.with_data_dir(data_dir);
    match toml::to_string_pretty(&config) {
        Ok(s) => println!("{}", s),
        Err(e) => anyhow::bail!("Failed to serialize config: {}", e),
    }
    Ok(())
}
