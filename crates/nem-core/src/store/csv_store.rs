use crate::error::{NemError, Result};
use crate::store::frame::Frame;
use crate::store::traits::{Connection, ConnectionManager};
use crate::time::{parse_market_timestamp, TimeRange};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Flat-file store: each table is `<data_dir>/<table>.csv` with a header row.
#[derive(Debug, Clone)]
pub struct CsvStore {
    data_dir: PathBuf,
}

impl CsvStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn table_path(&self, table: &str) -> PathBuf {
        self.data_dir.join(format!("{}.csv", table))
    }
}

impl ConnectionManager for CsvStore {
    fn connect(&self) -> Result<Box<dyn Connection>> {
        if !self.data_dir.is_dir() {
            return Err(NemError::Configuration(format!(
                "data directory {:?} does not exist",
                self.data_dir
            )));
        }
        Ok(Box::new(CsvConnection {
            store: self.clone(),
            scans: 0,
        }))
    }

    fn describe(&self) -> String {
        format!("csv:{}", self.data_dir.display())
    }
}

pub struct CsvConnection {
    store: CsvStore,
    scans: u64,
}

impl CsvConnection {
    pub fn scans(&self) -> u64 {
        self.scans
    }
}

impl Connection for CsvConnection {
    fn scan(&mut self, table: &str, time_column: &str, range: &TimeRange) -> Result<Frame> {
        self.scans += 1;
        let path = self.store.table_path(table);
        let file = File::open(&path)?;

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(BufReader::new(file));

        let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let mut frame = Frame::new(table, columns);
        let time_idx = frame.column_index(time_column).ok_or_else(|| NemError::Schema {
            dataset: table.to_string(),
            missing: vec![time_column.to_string()],
            detail: "time column not found".into(),
        })?;

        for (row_no, record) in reader.records().enumerate() {
            let record = record?;
            let raw_ts = record.get(time_idx).unwrap_or_default();
            let ts = parse_market_timestamp(raw_ts).map_err(|_| {
                NemError::schema(
                    table,
                    format!("row {}: unparseable {} value {:?}", row_no + 1, time_column, raw_ts),
                )
            })?;
            if range.contains(ts) {
                frame.push_row(record.iter().map(str::to_string).collect())?;
            }
        }

        log::debug!(
            "scanned {} for {}: {} rows",
            path.display(),
            range,
            frame.num_rows()
        );
        Ok(frame)
    }

    fn has_table(&mut self, table: &str) -> Result<bool> {
        Ok(self.store.table_path(table).is_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_table(dir: &TempDir, name: &str, body: &str) {
        let mut f = File::create(dir.path().join(format!("{}.csv", name))).unwrap();
        f.write_all(body.as_bytes()).unwrap();
    }

    fn range(start: &str, end: &str) -> TimeRange {
        TimeRange::new(start, end).unwrap()
    }

    #[test]
    fn test_scan_filters_by_range() {
        let dir = TempDir::new().unwrap();
        write_table(
            &dir,
            "prices_5min",
            "SETTLEMENTDATE,REGIONID,RRP\n\
             2024/01/01 00:05:00,NSW1,80.5\n\
             2024/01/01 00:10:00,NSW1,82.0\n\
             2024/01/01 00:15:00,NSW1,79.1\n",
        );

        let store = CsvStore::new(dir.path());
        let mut conn = store.connect().unwrap();
        let frame = conn
            .scan("prices_5min", "settlementdate", &range("2024-01-01 00:10", "2024-01-01 00:15"))
            .unwrap();
        assert_eq!(frame.num_rows(), 2);
        assert_eq!(frame.column("RRP").unwrap(), &["82.0".to_string(), "79.1".to_string()]);
    }

    #[test]
    fn test_missing_table_is_not_found_io() {
        let dir = TempDir::new().unwrap();
        let mut conn = CsvStore::new(dir.path()).connect().unwrap();
        let err = conn
            .scan("scada_5min", "SETTLEMENTDATE", &range("2024-01-01", "2024-01-02"))
            .unwrap_err();
        assert!(matches!(err, NemError::Io(ref e) if e.kind() == std::io::ErrorKind::NotFound));
        assert!(!err.is_transient());
        assert!(!conn.has_table("scada_5min").unwrap());
    }

    #[test]
    fn test_missing_time_column_is_schema_error() {
        let dir = TempDir::new().unwrap();
        write_table(&dir, "prices_5min", "INTERVAL,REGIONID,RRP\n1,NSW1,80\n");
        let mut conn = CsvStore::new(dir.path()).connect().unwrap();
        let err = conn
            .scan("prices_5min", "SETTLEMENTDATE", &range("2024-01-01", "2024-01-02"))
            .unwrap_err();
        match err {
            NemError::Schema { dataset, missing, .. } => {
                assert_eq!(dataset, "prices_5min");
                assert_eq!(missing, vec!["SETTLEMENTDATE".to_string()]);
            }
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn test_connect_requires_data_dir() {
        let store = CsvStore::new("/definitely/not/a/real/nem/dir");
        assert!(matches!(store.connect(), Err(NemError::Configuration(_))));
    }
}
