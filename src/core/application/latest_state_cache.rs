//! Lock-free holder of the newest snapshot and the health of the last cycle.

use crate::core::domain::model::snapshot::ClusterSnapshot;
use arc_swap::ArcSwap;
use std::sync::Arc;
use std::time::SystemTime;

/// Health of the collection loop as seen by readers.
#[derive(Debug, Clone, PartialEq)]
pub enum Readiness {
    /// No cycle has succeeded yet.
    NotYetCollected,
    /// The latest cycle published a snapshot.
    Healthy { last_update: SystemTime },
    /// The latest cycle failed; a previous snapshot may still be served.
    LastCycleFailed {
        last_success: Option<SystemTime>,
        error: String,
        consecutive_failures: u32,
    },
}

#[derive(Debug, Clone)]
struct FailureRecord {
    error: String,
    consecutive: u32,
}

/// The whole cache value; replaced as one unit, never mutated.
#[derive(Debug, Default)]
struct CacheState {
    snapshot: Option<Arc<ClusterSnapshot>>,
    last_success: Option<SystemTime>,
    last_failure: Option<FailureRecord>,
}

/// Holds the newest snapshot behind a single atomically swapped pointer.
///
/// Readers never wait on the writer and always see either the previous or
/// the new state in full. Once a snapshot has been stored, `get` never
/// returns `None` again.
#[derive(Debug, Default)]
pub struct LatestStateCache {
    state: ArcSwap<CacheState>,
}

impl LatestStateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes a new snapshot and clears the failure streak.
    pub fn set(&self, snapshot: Arc<ClusterSnapshot>) {
        self.state.store(Arc::new(CacheState {
            snapshot: Some(snapshot),
            last_success: Some(SystemTime::now()),
            last_failure: None,
        }));
    }

    /// Records a failed cycle, keeping whatever snapshot is already present.
    pub fn record_failure(&self, error: impl Into<String>) {
        let error = error.into();
        self.state.rcu(|current| {
            let consecutive = current
                .last_failure
                .as_ref()
                .map_or(1, |f| f.consecutive.saturating_add(1));
            CacheState {
                snapshot: current.snapshot.clone(),
                last_success: current.last_success,
                last_failure: Some(FailureRecord {
                    error: error.clone(),
                    consecutive,
                }),
            }
        });
    }

    /// The newest snapshot, or `None` before the first successful cycle.
    pub fn get(&self) -> Option<Arc<ClusterSnapshot>> {
        self.state.load().snapshot.clone()
    }

    pub fn readiness(&self) -> Readiness {
        let state = self.state.load();
        match (&state.last_failure, state.last_success) {
            (Some(failure), last_success) => Readiness::LastCycleFailed {
                last_success,
                error: failure.error.clone(),
                consecutive_failures: failure.consecutive,
            },
            (None, Some(last_update)) => Readiness::Healthy { last_update },
            (None, None) => Readiness::NotYetCollected,
        }
    }
}
