use apicov_core::{Observation, Scope};
use parking_lot::Mutex;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

/// Append-only sequence of observations.
///
/// Every append takes the lock for exactly one push, so concurrent writers
/// can interleave records but never tear one. The lock is never held across
/// an await point.
#[derive(Debug, Default)]
pub struct ObservationLog {
    entries: Mutex<Vec<Observation>>,
}

impl ObservationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log pre-populated with `observations`, for test setup.
    pub fn seeded(observations: impl IntoIterator<Item = Observation>) -> Self {
        let log = Self::new();
        log.seed(observations);
        log
    }

    /// Append a batch in order, for test setup.
    pub fn seed(&self, observations: impl IntoIterator<Item = Observation>) {
        self.entries.lock().extend(observations);
    }

    pub fn append(&self, observation: Observation) {
        self.entries.lock().push(observation);
    }

    pub fn snapshot(&self) -> Vec<Observation> {
        self.entries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Empty the log, returning how many observations were dropped.
    pub fn clear(&self) -> usize {
        let mut entries = self.entries.lock();
        let removed = entries.len();
        entries.clear();
        removed
    }
}

static PROCESS_OBSERVATIONS: OnceLock<Arc<ObservationLog>> = OnceLock::new();

/// The process-wide shared log, created on first use.
///
/// Interceptors pick this up by default; tests that need isolation inject
/// their own log through [`ObservationStore::with_shared`].
pub fn process_observations() -> Arc<ObservationLog> {
    PROCESS_OBSERVATIONS
        .get_or_init(|| {
            debug!("Initializing process-wide observation log");
            Arc::new(ObservationLog::new())
        })
        .clone()
}

/// The two sequences an interceptor writes to: its own local log and a
/// (usually process-wide) shared log.
#[derive(Debug)]
pub struct ObservationStore {
    local: ObservationLog,
    shared: Arc<ObservationLog>,
}

impl Default for ObservationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObservationStore {
    pub fn new() -> Self {
        Self::with_shared(process_observations())
    }

    pub fn with_shared(shared: Arc<ObservationLog>) -> Self {
        Self {
            local: ObservationLog::new(),
            shared,
        }
    }

    /// Record an observation locally and, when `share` is set, in the shared log.
    pub fn append(&self, observation: Observation, share: bool) {
        // Lock order is always local then shared, so the local sequence stays
        // a subsequence of the shared one even when tasks race on one store.
        let mut local = self.local.entries.lock();
        if share {
            self.shared.append(observation.clone());
        }
        local.push(observation);
    }

    /// Seed the local log (and optionally the shared one) for test setup.
    pub fn seed(&self, observations: impl IntoIterator<Item = Observation>, share: bool) {
        let observations: Vec<Observation> = observations.into_iter().collect();
        if share {
            self.shared.seed(observations.iter().cloned());
        }
        self.local.seed(observations);
    }

    pub fn snapshot(&self, scope: Scope) -> Vec<Observation> {
        match scope {
            Scope::Local => self.local.snapshot(),
            Scope::Shared => self.shared.snapshot(),
        }
    }

    pub fn local(&self) -> &ObservationLog {
        &self.local
    }

    pub fn shared(&self) -> &Arc<ObservationLog> {
        &self.shared
    }

    pub fn clear_local(&self) {
        let removed = self.local.clear();
        debug!(removed, "Cleared local observations");
    }

    /// Empties the shared log for every interceptor attached to it.
    pub fn clear_shared(&self) {
        let removed = self.shared.clear();
        info!(removed, "Cleared shared observations");
    }
}
