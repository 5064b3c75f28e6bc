use crate::error::Result;
use crate::store::frame::Frame;
use crate::time::TimeRange;

/// One handle onto the columnar store. Handles are used by one thread at a
/// time; the pool provides concurrency.
pub trait Connection: Send {
    /// Rows of `table` whose `time_column` falls inside `range`.
    fn scan(&mut self, table: &str, time_column: &str, range: &TimeRange) -> Result<Frame>;

    /// Whether `table` exists in the store.
    fn has_table(&mut self, table: &str) -> Result<bool>;
}

/// Opens connections for the pool.
pub trait ConnectionManager: Send + Sync {
    fn connect(&self) -> Result<Box<dyn Connection>>;

    /// Human-readable location of the store, for logs.
    fn describe(&self) -> String;
}
