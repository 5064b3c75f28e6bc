use crate::error::{NemError, Result};
use crate::store::frame::Frame;
use crate::store::traits::{Connection, ConnectionManager};
use crate::time::{parse_market_timestamp, TimeRange};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

#[derive(Default)]
struct Shared {
    tables: RwLock<HashMap<String, Frame>>,
    scans: AtomicU64,
    fail_next: AtomicU64,
}

/// In-process store holding whole tables as frames. Counts every scan,
/// which makes cache behaviour observable in tests and benches.
#[derive(Clone, Default)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_table(&self, frame: Frame) {
        let mut tables = self
            .shared
            .tables
            .write()
            .unwrap_or_else(|e| e.into_inner());
        tables.insert(frame.table().to_string(), frame);
    }

    pub fn remove_table(&self, table: &str) -> bool {
        let mut tables = self
            .shared
            .tables
            .write()
            .unwrap_or_else(|e| e.into_inner());
        tables.remove(table).is_some()
    }

    /// Total scans issued across every connection.
    pub fn scan_count(&self) -> u64 {
        self.shared.scans.load(Ordering::SeqCst)
    }

    /// Make the next `n` scans fail with a transient I/O error.
    pub fn fail_next_scans(&self, n: u64) {
        self.shared.fail_next.store(n, Ordering::SeqCst);
    }
}

impl ConnectionManager for MemoryStore {
    fn connect(&self) -> Result<Box<dyn Connection>> {
        Ok(Box::new(MemoryConnection {
            shared: Arc::clone(&self.shared),
        }))
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

struct MemoryConnection {
    shared: Arc<Shared>,
}

impl Connection for MemoryConnection {
    fn scan(&mut self, table: &str, time_column: &str, range: &TimeRange) -> Result<Frame> {
        self.shared.scans.fetch_add(1, Ordering::SeqCst);

        let injected = self
            .shared
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(NemError::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "injected scan failure",
            )));
        }

        let tables = self
            .shared
            .tables
            .read()
            .unwrap_or_else(|e| e.into_inner());
        let frame = tables.get(table).ok_or_else(|| {
            NemError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("table {} not found", table),
            ))
        })?;

        let times = frame.column(time_column).ok_or_else(|| NemError::Schema {
            dataset: table.to_string(),
            missing: vec![time_column.to_string()],
            detail: "time column not found".into(),
        })?;
        let mut keep = Vec::with_capacity(times.len());
        for (row, raw) in times.iter().enumerate() {
            let ts = parse_market_timestamp(raw).map_err(|_| {
                NemError::schema(table, format!("row {}: unparseable timestamp {:?}", row + 1, raw))
            })?;
            keep.push(range.contains(ts));
        }
        Ok(frame.filter_rows(|i| keep[i]))
    }

    fn has_table(&mut self, table: &str) -> Result<bool> {
        let tables = self
            .shared
            .tables
            .read()
            .unwrap_or_else(|e| e.into_inner());
        Ok(tables.contains_key(table))
    }
}
