pub mod cache;
pub mod config_cmd;
pub mod query;
pub mod resolve;
pub mod warm;

use crate::config::NemConfig;
use clap::{Args, Parser, Subcommand, ValueEnum};
use nem_core::{Aggregation, Bucket, GroupBy, QueryManager, Resolution};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "nem")]
#[command(version, about = "Resolution-aware, cached queries over AEMO NEM market data")]
pub struct Cli {
    /// Path to nem.toml
    #[arg(long, global = true, env = "NEM_CONFIG", default_value = "nem.toml")]
    pub config: PathBuf,

    /// Path to the data directory (overrides config file)
    #[arg(long, global = true, env = "NEM_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a query and print the result
    Query(QueryArgs),
    /// Show which resolution a range would use, without querying
    Resolve(ResolveArgs),
    /// Run queries concurrently to populate the cache
    Warm(WarmArgs),
    /// Cache maintenance
    #[command(subcommand)]
    Cache(CacheCommands),
    /// Configuration commands
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Args, Debug, Clone)]
pub struct RangeArgs {
    /// Data type: generation, price or transmission
    pub data_type: String,

    /// Range start (date or timestamp, market time)
    #[arg(long)]
    pub start: String,

    /// Range end (date or timestamp, market time)
    #[arg(long)]
    pub end: String,

    /// Force a resolution: fine/5min or coarse/30min
    #[arg(long)]
    pub resolution: Option<String>,
}

impl RangeArgs {
    pub fn resolution_override(&self) -> anyhow::Result<Option<Resolution>> {
        Ok(self.resolution.as_deref().map(str::parse).transpose()?)
    }
}

#[derive(Args, Debug)]
pub struct QueryArgs {
    #[command(flatten)]
    pub range: RangeArgs,

    /// Keep only these entity ids (repeatable)
    #[arg(long = "entity")]
    pub entities: Vec<String>,

    #[arg(long, value_enum, default_value_t = GroupByArg::Entity)]
    pub group_by: GroupByArg,

    #[arg(long, value_enum, default_value_t = BucketArg::Native)]
    pub bucket: BucketArg,

    #[arg(long, value_enum, default_value_t = AggArg::Sum)]
    pub agg: AggArg,

    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,

    /// Maximum rows to print in table format (0 = all)
    #[arg(long, default_value = "20")]
    pub limit: usize,

    /// Give up after this many seconds
    #[arg(long, default_value = "60")]
    pub timeout: u64,
}

#[derive(Args, Debug)]
pub struct ResolveArgs {
    #[command(flatten)]
    pub range: RangeArgs,

    #[arg(long, value_enum, default_value_t = ReportFormat::Table)]
    pub format: ReportFormat,
}

#[derive(Args, Debug)]
pub struct WarmArgs {
    /// Data types to warm (default: all)
    pub data_types: Vec<String>,

    /// Range start
    #[arg(long)]
    pub start: String,

    /// Range end
    #[arg(long)]
    pub end: String,

    /// Concurrent callers per data type
    #[arg(long, default_value = "4")]
    pub concurrency: usize,
}

#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Cache and pool statistics
    Stats {
        #[arg(long, value_enum, default_value_t = ReportFormat::Table)]
        format: ReportFormat,
    },
    /// Remove every cached result, or those of one data type
    Clear {
        #[arg(long)]
        data_type: Option<String>,
    },
    /// Remove expired entries
    Purge,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    Validate,
    Show,
}

/// Query result output.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Csv,
    Json,
}

/// Output for reports that have no tabular rows.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Table,
    Json,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupByArg {
    Entity,
    Fuel,
    Region,
    Total,
}

impl From<GroupByArg> for GroupBy {
    fn from(arg: GroupByArg) -> Self {
        match arg {
            GroupByArg::Entity => GroupBy::Entity,
            GroupByArg::Fuel => GroupBy::Fuel,
            GroupByArg::Region => GroupBy::Region,
            GroupByArg::Total => GroupBy::Total,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketArg {
    Native,
    Hourly,
    Daily,
}

impl From<BucketArg> for Bucket {
    fn from(arg: BucketArg) -> Self {
        match arg {
            BucketArg::Native => Bucket::Native,
            BucketArg::Hourly => Bucket::Hourly,
            BucketArg::Daily => Bucket::Daily,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggArg {
    Sum,
    Mean,
    Min,
    Max,
}

impl From<AggArg> for Aggregation {
    fn from(arg: AggArg) -> Self {
        match arg {
            AggArg::Sum => Aggregation::Sum,
            AggArg::Mean => Aggregation::Mean,
            AggArg::Min => Aggregation::Min,
            AggArg::Max => Aggregation::Max,
        }
    }
}

pub fn open_manager(config: &NemConfig) -> anyhow::Result<Arc<QueryManager>> {
    let engine = config.to_engine_config()?;
    Ok(Arc::new(QueryManager::open(engine)?))
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KiB");
        assert_eq!(format_bytes(512 * 1024 * 1024), "512.0 MiB");
    }

    #[test]
    fn test_query_args_parse() {
        let cli = Cli::try_parse_from([
            "nem", "query", "price", "--start", "2024-01-01", "--end", "2024-01-02",
            "--entity", "NSW1", "--entity", "VIC1", "--bucket", "hourly", "--format", "json",
        ])
        .unwrap();
        match cli.command {
            Commands::Query(args) => {
                assert_eq!(args.range.data_type, "price");
                assert_eq!(args.entities, vec!["NSW1", "VIC1"]);
                assert_eq!(args.bucket, BucketArg::Hourly);
                assert_eq!(args.format, OutputFormat::Json);
                assert_eq!(args.group_by, GroupByArg::Entity);
                assert!(args.range.resolution_override().unwrap().is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_unknown_flag_values_rejected() {
        let base = ["nem", "query", "price", "--start", "2024-01-01", "--end", "2024-01-02"];
        for extra in [["--format", "yaml"], ["--group-by", "plant"], ["--bucket", "weekly"], ["--agg", "median"]] {
            let argv = base.iter().chain(extra.iter()).copied();
            assert!(Cli::try_parse_from(argv).is_err(), "{extra:?} accepted");
        }
        assert!(Cli::try_parse_from(["nem", "cache", "stats", "--format", "csv"]).is_err());
    }

    #[test]
    fn test_bad_resolution_flag() {
        let args = RangeArgs {
            data_type: "price".into(),
            start: "2024-01-01".into(),
            end: "2024-01-02".into(),
            resolution: Some("weekly".into()),
        };
        assert!(args.resolution_override().is_err());
    }
}
