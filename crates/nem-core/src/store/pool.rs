use crate::error::{NemError, Result};
use crate::store::traits::{Connection, ConnectionManager};
use serde::{Deserialize, Serialize};
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PoolConfig {
    /// Maximum number of open connections.
    pub size: usize,
    /// How long a checkout may wait for a free connection.
    pub checkout_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            size: 4,
            checkout_timeout: Duration::from_secs(5),
        }
    }
}

impl PoolConfig {
    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    pub fn with_checkout_timeout(mut self, timeout: Duration) -> Self {
        self.checkout_timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.size == 0 {
            return Err(NemError::Configuration(
                "pool size must be at least 1".into(),
            ));
        }
        if self.checkout_timeout.is_zero() {
            return Err(NemError::Configuration(
                "checkout_timeout must be > 0".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    pub size: usize,
    pub open: usize,
    pub idle: usize,
}

impl PoolStatus {
    pub fn in_use(&self) -> usize {
        self.open - self.idle
    }
}

/// A store connection as held by the pool, plus whether it failed in a way
/// that makes it unfit for reuse.
pub struct StoreConnection {
    conn: Box<dyn Connection>,
    broken: bool,
}

/// Adapts a store's `ConnectionManager` to r2d2.
pub struct StoreConnectionManager {
    inner: Box<dyn ConnectionManager>,
}

impl r2d2::ManageConnection for StoreConnectionManager {
    type Connection = StoreConnection;
    type Error = NemError;

    fn connect(&self) -> Result<StoreConnection> {
        Ok(StoreConnection {
            conn: self.inner.connect()?,
            broken: false,
        })
    }

    fn is_valid(&self, conn: &mut StoreConnection) -> Result<()> {
        if conn.broken {
            return Err(NemError::Configuration("connection marked broken".into()));
        }
        Ok(())
    }

    fn has_broken(&self, conn: &mut StoreConnection) -> bool {
        conn.broken
    }
}

/// Fixed-size connection pool. Connections are opened lazily up to
/// `size`; further checkouts block until one is returned or the checkout
/// timeout passes.
#[derive(Clone)]
pub struct ConnectionPool {
    pool: r2d2::Pool<StoreConnectionManager>,
    config: PoolConfig,
    closed: Arc<AtomicBool>,
}

impl ConnectionPool {
    pub fn new(manager: impl ConnectionManager + 'static, config: PoolConfig) -> Result<Self> {
        Self::from_boxed(Box::new(manager), config)
    }

    /// Fails fast when the store cannot be opened at all; after that,
    /// connections are opened on demand.
    pub fn from_boxed(manager: Box<dyn ConnectionManager>, config: PoolConfig) -> Result<Self> {
        config.validate()?;
        drop(manager.connect()?);
        log::info!(
            "connection pool for {} (size {})",
            manager.describe(),
            config.size
        );

        let max_size = u32::try_from(config.size).map_err(|_| {
            NemError::Configuration(format!("pool size {} is too large", config.size))
        })?;
        let pool = r2d2::Pool::builder()
            .max_size(max_size)
            .min_idle(Some(0))
            .connection_timeout(config.checkout_timeout)
            .build_unchecked(StoreConnectionManager { inner: manager });

        Ok(Self {
            pool,
            config,
            closed: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Borrow a connection, waiting up to the configured timeout.
    pub fn get(&self) -> Result<PooledConnection> {
        self.get_timeout(self.config.checkout_timeout)
    }

    pub fn get_timeout(&self, timeout: Duration) -> Result<PooledConnection> {
        if self.is_closed() {
            return Err(NemError::Configuration("connection pool is closed".into()));
        }
        match self.pool.get_timeout(timeout) {
            Ok(conn) => Ok(PooledConnection { conn }),
            Err(e) => {
                log::warn!("connection checkout failed after {:?}: {}", timeout, e);
                Err(NemError::PoolTimeout(timeout))
            }
        }
    }

    pub fn status(&self) -> PoolStatus {
        let state = self.pool.state();
        PoolStatus {
            size: self.config.size,
            open: state.connections as usize,
            idle: state.idle_connections as usize,
        }
    }

    /// Refuse further checkouts. Open connections are released when the
    /// last handle to the pool is dropped.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// A checked-out connection. Returned to the pool on drop unless marked
/// broken.
pub struct PooledConnection {
    conn: r2d2::PooledConnection<StoreConnectionManager>,
}

impl PooledConnection {
    pub fn mark_broken(&mut self) {
        self.conn.broken = true;
    }
}

impl Deref for PooledConnection {
    type Target = dyn Connection;

    fn deref(&self) -> &Self::Target {
        &*self.conn.conn
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.conn.conn
    }
}
