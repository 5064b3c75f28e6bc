//! Columnar store access: the connection seam, two backends and the pool.

pub mod csv_store;
pub mod frame;
pub mod memory;
pub mod pool;
pub mod traits;

pub use csv_store::{CsvConnection, CsvStore};
pub use frame::Frame;
pub use memory::MemoryStore;
pub use pool::{ConnectionPool, PoolConfig, PoolStatus, PooledConnection};
pub use traits::{Connection, ConnectionManager};
