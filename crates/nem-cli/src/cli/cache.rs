use crate::cli::{format_bytes, open_manager, CacheCommands, ReportFormat};
use crate::config::NemConfig;
use anyhow::Result;
use nem_core::DataType;

pub fn run(cmd: CacheCommands, config: &NemConfig) -> Result<()> {
    let manager = open_manager(config)?;
    match cmd {
        CacheCommands::Stats { format } => {
            let stats = manager.stats()?;
            if format == ReportFormat::Json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
                return Ok(());
            }

            println!();
            println!("Query Cache");
            println!("{}", "─".repeat(50));
            // A fresh process has an empty memory tier; disk is what persists.
            println!("Memory entries:  {:>10}", stats.memory.entries);
            println!("Memory budget:   {:>10}", format_bytes(stats.memory.max_bytes as u64));
            match &stats.disk {
                Some(disk) => {
                    println!("Disk entries:    {:>10}", disk.entries);
                    println!("  expired        {:>10}", disk.expired);
                    println!("Disk payload:    {:>10}", format_bytes(disk.payload_bytes));
                    println!("Disk file:       {:>10}", format_bytes(disk.file_bytes));
                }
                None => println!("Disk tier:       {:>10}", "off"),
            }
            println!("Pool:            {:>4} / {}", stats.pool.open, stats.pool.size);
            println!("{}", "─".repeat(50));
            println!();
        }
        CacheCommands::Clear { data_type } => {
            let removed = match data_type {
                Some(tag) => manager.invalidate_data_type(tag.parse::<DataType>()?)?,
                None => manager.clear()?,
            };
            println!("Removed {} cached result(s).", removed);
        }
        CacheCommands::Purge => {
            let removed = manager.purge_expired()?;
            println!("Purged {} expired result(s).", removed);
        }
    }
    manager.shutdown()?;
    Ok(())
}
