use crate::cli::{format_bytes, open_manager, OutputFormat, QueryArgs};
use crate::config::NemConfig;
use anyhow::{bail, Context, Result};
use nem_core::{DataRequest, QueryOutput};
use std::time::Duration;

pub async fn run(args: QueryArgs, config: &NemConfig) -> Result<()> {
    let mut request = DataRequest::for_tag(
        &args.range.data_type,
        args.range.start.as_str(),
        args.range.end.as_str(),
    )?
    .with_entities(args.entities.iter().cloned())
    .with_group_by(args.group_by.into())
    .with_bucket(args.bucket.into())
    .with_aggregation(args.agg.into());
    if let Some(resolution) = args.range.resolution_override()? {
        request = request.with_resolution(resolution);
    }

    let manager = open_manager(config)?;
    let worker = {
        let manager = manager.clone();
        tokio::task::spawn_blocking(move || manager.query(&request))
    };

    let timeout = Duration::from_secs(args.timeout);
    let output = match tokio::time::timeout(timeout, worker).await {
        Ok(joined) => joined.context("query worker panicked")??,
        Err(_) => bail!("query did not finish within {:?}", timeout),
    };

    match args.format {
        OutputFormat::Json => print_json(&output)?,
        OutputFormat::Csv => print_csv(&output)?,
        OutputFormat::Table => print_table(&output, args.limit),
    }

    manager.shutdown()?;
    Ok(())
}

fn print_table(output: &QueryOutput, limit: usize) {
    let meta = &output.metadata;
    println!();
    println!("{}", meta.params);
    println!("{}", "─".repeat(60));
    println!("Resolution: {} ({})", meta.resolution, meta.reason);
    println!("Cache:      {}", meta.cache_status.as_str());
    println!("Estimate:   {}", format_bytes(meta.estimated_bytes));
    println!("Rows:       {}", meta.rows);
    println!("Elapsed:    {:.1} ms", meta.elapsed.as_secs_f64() * 1000.0);
    println!("Key:        {}", meta.key.short());
    println!("{}", "─".repeat(60));
    println!("{:<20}  {:<16}  {:>14}", "TIMESTAMP", "ENTITY", "VALUE");

    let shown = if limit == 0 { output.result.len() } else { limit };
    for record in output.result.records.iter().take(shown) {
        println!(
            "{:<20}  {:<16}  {:>14.3}",
            record.timestamp.format("%Y-%m-%d %H:%M"),
            record.entity,
            record.value
        );
    }
    if output.result.len() > shown {
        println!("... {} more rows", output.result.len() - shown);
    }
    println!();
}

fn print_json(output: &QueryOutput) -> Result<()> {
    let meta = &output.metadata;
    let body = serde_json::json!({
        "metadata": {
            "data_type": meta.params.data_type,
            "resolution": meta.resolution,
            "reason": meta.reason,
            "cache_status": meta.cache_status,
            "estimated_bytes": meta.estimated_bytes,
            "rows": meta.rows,
            "elapsed_ms": meta.elapsed.as_secs_f64() * 1000.0,
            "key": meta.key,
        },
        "records": output.result.records,
    });
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

fn print_csv(output: &QueryOutput) -> Result<()> {
    let mut writer = csv::Writer::from_writer(std::io::stdout());
    writer.write_record(nem_core::ResultSet::COLUMNS)?;
    for record in &output.result.records {
        writer.write_record([
            record.timestamp.format("%Y/%m/%d %H:%M:%S").to_string(),
            record.entity.clone(),
            record.value.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
