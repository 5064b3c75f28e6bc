use crate::cache::key::CacheKey;
use crate::types::ResultSet;
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

enum FlightState {
    Running,
    /// `None` when the leader failed or was abandoned.
    Done(Option<Arc<ResultSet>>),
}

pub struct Flight {
    state: Mutex<FlightState>,
    done: Condvar,
}

impl Flight {
    fn new() -> Self {
        Self {
            state: Mutex::new(FlightState::Running),
            done: Condvar::new(),
        }
    }

    /// Wait for the leader. `None` means the caller should compute the
    /// result itself: the leader failed or the wait timed out.
    pub fn wait(&self, timeout: Duration) -> Option<Arc<ResultSet>> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            if let FlightState::Done(result) = &*state {
                return result.clone();
            }
            if self.done.wait_until(&mut state, deadline).timed_out() {
                return match &*state {
                    FlightState::Done(result) => result.clone(),
                    FlightState::Running => None,
                };
            }
        }
    }
}

pub enum Role<'a> {
    Leader(LeaderGuard<'a>),
    Follower(Arc<Flight>),
}

/// At most one computation in flight per key.
#[derive(Default)]
pub struct SingleFlight {
    inflight: Mutex<HashMap<CacheKey, Arc<Flight>>>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join(&self, key: &CacheKey) -> Role<'_> {
        let mut inflight = self.inflight.lock();
        if let Some(flight) = inflight.get(key) {
            return Role::Follower(flight.clone());
        }
        let flight = Arc::new(Flight::new());
        inflight.insert(key.clone(), flight.clone());
        Role::Leader(LeaderGuard {
            owner: self,
            key: key.clone(),
            flight,
            finished: false,
        })
    }

    pub fn in_flight(&self) -> usize {
        self.inflight.lock().len()
    }

    /// Callers currently waiting on `key` (the map and the leader each hold one reference).
    #[cfg(test)]
    fn followers(&self, key: &CacheKey) -> usize {
        self.inflight
            .lock()
            .get(key)
            .map(|f| Arc::strong_count(f).saturating_sub(2))
            .unwrap_or(0)
    }
}

/// Held by the caller computing a key. Dropping it without calling
/// `complete` releases waiters with no result.
pub struct LeaderGuard<'a> {
    owner: &'a SingleFlight,
    key: CacheKey,
    flight: Arc<Flight>,
    finished: bool,
}

impl LeaderGuard<'_> {
    pub fn complete(mut self, result: Option<Arc<ResultSet>>) {
        self.finish(result);
    }

    fn finish(&mut self, result: Option<Arc<ResultSet>>) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.owner.inflight.lock().remove(&self.key);
        *self.flight.state.lock() = FlightState::Done(result);
        self.flight.done.notify_all();
    }
}

impl Drop for LeaderGuard<'_> {
    fn drop(&mut self) {
        self.finish(None);
    }
}
