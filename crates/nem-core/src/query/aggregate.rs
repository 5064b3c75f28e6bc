use crate::adapters::UnitRegistry;
use crate::query::request::{Aggregation, Bucket, GroupBy};
use crate::types::{DataType, Record};
use chrono::{NaiveDateTime, NaiveTime, TimeDelta, Timelike};
use std::collections::{BTreeMap, HashSet};

pub const TOTAL_LABEL: &str = "Total";

#[derive(Debug, Clone, Copy)]
struct Accumulator {
    sum: f64,
    count: u64,
    min: f64,
    max: f64,
}

impl Accumulator {
    fn new(value: f64) -> Self {
        Self {
            sum: value,
            count: 1,
            min: value,
            max: value,
        }
    }

    fn push(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    fn finish(&self, aggregation: Aggregation) -> f64 {
        match aggregation {
            Aggregation::Sum => self.sum,
            Aggregation::Mean => self.sum / self.count as f64,
            Aggregation::Min => self.min,
            Aggregation::Max => self.max,
        }
    }
}

/// Label for the bucket a timestamp falls into. AEMO timestamps mark the end
/// of their interval, so `01:00` belongs to the hour starting `00:00`.
pub fn bucket_start(ts: NaiveDateTime, bucket: Bucket) -> NaiveDateTime {
    let inside = ts - TimeDelta::seconds(1);
    match bucket {
        Bucket::Native => ts,
        Bucket::Hourly => inside
            .date()
            .and_time(NaiveTime::MIN)
            + TimeDelta::hours(inside.hour() as i64),
        Bucket::Daily => inside.date().and_time(NaiveTime::MIN),
    }
}

fn group_label<'a>(
    record: &'a Record,
    data_type: DataType,
    group_by: GroupBy,
    units: &'a UnitRegistry,
) -> &'a str {
    match group_by {
        GroupBy::Entity => &record.entity,
        GroupBy::Total => TOTAL_LABEL,
        GroupBy::Fuel => units.fuel_label(&record.entity),
        GroupBy::Region => match data_type {
            DataType::Generation => units.region_label(&record.entity),
            _ => &record.entity,
        },
    }
}

/// Keep only the listed raw entities; an empty filter keeps everything.
pub fn filter_entities(records: Vec<Record>, entities: &[String]) -> Vec<Record> {
    if entities.is_empty() {
        return records;
    }
    let wanted: HashSet<&str> = entities.iter().map(String::as_str).collect();
    records
        .into_iter()
        .filter(|r| wanted.contains(r.entity.as_str()))
        .collect()
}

/// Group and bucket canonical records. Every raw value landing in the same
/// (bucket, group) cell feeds one aggregate. Output is sorted by
/// (timestamp, label).
pub fn aggregate(
    records: &[Record],
    data_type: DataType,
    group_by: GroupBy,
    bucket: Bucket,
    aggregation: Aggregation,
    units: &UnitRegistry,
) -> Vec<Record> {
    let mut cells: BTreeMap<(NaiveDateTime, &str), Accumulator> = BTreeMap::new();
    for record in records {
        if !record.value.is_finite() {
            continue;
        }
        let label = group_label(record, data_type, group_by, units);
        let ts = bucket_start(record.timestamp, bucket);
        cells
            .entry((ts, label))
            .and_modify(|acc| acc.push(record.value))
            .or_insert_with(|| Accumulator::new(record.value));
    }

    cells
        .into_iter()
        .map(|((ts, label), acc)| Record::new(ts, label, acc.finish(aggregation)))
        .collect()
}
