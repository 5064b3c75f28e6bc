use crate::cli::{format_bytes, ReportFormat, ResolveArgs};
use crate::config::NemConfig;
use anyhow::Result;
use nem_core::ResolutionManager;

/// Pure decision; no store or cache is opened.
pub fn run(args: ResolveArgs, config: &NemConfig) -> Result<()> {
    let engine = config.to_engine_config()?;
    let manager = ResolutionManager::new(engine.resolution)?;
    let decision = manager.resolve(
        args.range.start.as_str(),
        args.range.end.as_str(),
        &args.range.data_type,
        args.range.resolution_override()?,
    )?;

    if args.format == ReportFormat::Json {
        println!("{}", serde_json::to_string_pretty(&decision)?);
        return Ok(());
    }

    println!("Data type:  {}", decision.data_type);
    println!("Range:      {}", decision.range);
    println!("Duration:   {} h", decision.range.duration().num_minutes() as f64 / 60.0);
    println!("Resolution: {}", decision.resolution);
    println!("Reason:     {}", decision.reason);
    println!("Estimate:   {}", format_bytes(decision.estimated_bytes));
    Ok(())
}
