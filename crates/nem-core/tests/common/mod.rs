#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use nem_core::{EngineConfig, RetryPolicy};
use std::fmt::Write as _;
use std::path::Path;
use std::time::Duration;

pub const DUIDS: [(&str, &str, &str); 4] = [
    ("BW01", "Black Coal", "NSW1"),
    ("LYA1", "Brown Coal", "VIC1"),
    ("MACARTH1", "Wind", "VIC1"),
    ("NYNGAN1", "Solar", "NSW1"),
];

pub const REGIONS: [&str; 5] = ["NSW1", "QLD1", "SA1", "TAS1", "VIC1"];

pub fn ts(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, min, 0)
        .unwrap()
}

fn aemo(ts: NaiveDateTime) -> String {
    ts.format("%Y/%m/%d %H:%M:%S").to_string()
}

/// One day of 5-minute SCADA, ending at `end`.
pub fn write_scada(dir: &Path, end: NaiveDateTime) {
    let mut body = String::from("SETTLEMENTDATE,DUID,SCADAVALUE\n");
    for i in (0..288).rev() {
        let at = end - TimeDelta::minutes(5 * i);
        for (n, (duid, _, _)) in DUIDS.iter().enumerate() {
            writeln!(body, "{},{},{}", aemo(at), duid, 100 * (n + 1)).unwrap();
        }
    }
    std::fs::write(dir.join("scada_5min.csv"), body).unwrap();
}

/// Half-hourly prices, one row per region per day at noon, from `start`
/// for `days` days. Sparse on purpose: only the table shape matters.
pub fn write_coarse_prices(dir: &Path, start: NaiveDateTime, days: i64) {
    let mut body = String::from("SETTLEMENTDATE,REGIONID,RRP\n");
    for d in 0..days {
        let at = start + TimeDelta::days(d) + TimeDelta::hours(12);
        for (n, region) in REGIONS.iter().enumerate() {
            writeln!(body, "{},{},{}", aemo(at), region, 50 + n).unwrap();
        }
    }
    std::fs::write(dir.join("prices_30min.csv"), body).unwrap();
}

pub fn write_units(dir: &Path) {
    let mut body = String::from("DUID,FUEL,REGION\n");
    for (duid, fuel, region) in DUIDS {
        writeln!(body, "{},{},{}", duid, fuel, region).unwrap();
    }
    std::fs::write(dir.join("units.csv"), body).unwrap();
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn config(dir: &Path) -> EngineConfig {
    init_logging();
    EngineConfig::new(dir).with_retry(
        RetryPolicy::default()
            .with_initial_backoff(Duration::from_millis(1))
            .with_max_backoff(Duration::from_millis(5)),
    )
}
