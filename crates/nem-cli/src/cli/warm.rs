use crate::cli::{open_manager, WarmArgs};
use crate::config::NemConfig;
use anyhow::{Context, Result};
use nem_core::{DataRequest, DataType};
use std::time::Instant;

/// Fires `concurrency` identical requests per data type at once. Identical
/// requests coalesce, so each data type costs one store scan.
pub async fn run(args: WarmArgs, config: &NemConfig) -> Result<()> {
    let data_types: Vec<DataType> = if args.data_types.is_empty() {
        DataType::ALL.to_vec()
    } else {
        args.data_types
            .iter()
            .map(|t| t.parse())
            .collect::<nem_core::Result<_>>()?
    };

    let manager = open_manager(config)?;
    let started = Instant::now();
    let mut tasks = Vec::new();

    for data_type in &data_types {
        let request = DataRequest::new(*data_type, args.start.as_str(), args.end.as_str());
        for _ in 0..args.concurrency.max(1) {
            let manager = manager.clone();
            let request = request.clone();
            tasks.push(tokio::task::spawn_blocking(move || {
                (request.data_type, manager.query(&request))
            }));
        }
    }

    let mut failures = 0;
    for task in tasks {
        let (data_type, outcome) = task.await.context("warm worker panicked")?;
        match outcome {
            Ok(output) => tracing::info!(
                "{}: {} rows, {} ({})",
                data_type,
                output.metadata.rows,
                output.metadata.cache_status.as_str(),
                output.metadata.resolution
            ),
            Err(e) => {
                failures += 1;
                tracing::warn!("{}: {}", data_type, e);
            }
        }
    }

    let stats = manager.stats()?;
    println!(
        "Warmed {} data type(s) in {:.2}s: {} executions, {} cached entries{}",
        data_types.len(),
        started.elapsed().as_secs_f64(),
        stats.executions,
        stats.memory.entries,
        if failures > 0 {
            format!(", {} failed requests", failures)
        } else {
            String::new()
        }
    );
    manager.shutdown()?;
    Ok(())
}
