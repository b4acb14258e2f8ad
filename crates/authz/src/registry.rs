//! Family registry - one serialization lane per active family
//!
//! The first request for a family starts its lane, the last one to finish
//! tears it down. Administrative mutations of a family run one at a time
//! on the lane; queries and signature submissions only hold a lease.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};

struct Lane {
    leases: usize,
    gate: Arc<AsyncMutex<()>>,
}

type Lanes = Arc<Mutex<HashMap<String, Lane>>>;

/// Process-wide map of family name to lane, reference counted by leases
#[derive(Clone, Default)]
pub struct FamilyRegistry {
    lanes: Lanes,
}

impl FamilyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a lease on `family`, starting its lane if needed
    pub fn enter(&self, family: &str) -> FamilyLease {
        let mut lanes = self.lanes.lock().unwrap_or_else(PoisonError::into_inner);
        let lane = lanes.entry(family.to_string()).or_insert_with(|| {
            tracing::debug!(family, "family lane started");
            Lane {
                leases: 0,
                gate: Arc::new(AsyncMutex::new(())),
            }
        });
        lane.leases += 1;

        FamilyLease {
            family: family.to_string(),
            gate: lane.gate.clone(),
            lanes: self.lanes.clone(),
        }
    }

    /// Families with at least one live lease
    pub fn active_families(&self) -> usize {
        self.lanes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Live leases on `family`
    pub fn leases(&self, family: &str) -> usize {
        self.lanes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(family)
            .map_or(0, |lane| lane.leases)
    }
}

/// A live reference to a family lane; dropping the last one stops the lane
pub struct FamilyLease {
    family: String,
    gate: Arc<AsyncMutex<()>>,
    lanes: Lanes,
}

impl FamilyLease {
    pub fn family(&self) -> &str {
        &self.family
    }

    /// Wait for exclusive use of the lane
    pub async fn exclusive(&self) -> AsyncMutexGuard<'_, ()> {
        self.gate.lock().await
    }
}

impl Drop for FamilyLease {
    fn drop(&mut self) {
        let mut lanes = self.lanes.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(lane) = lanes.get_mut(&self.family) {
            lane.leases = lane.leases.saturating_sub(1);
            if lane.leases == 0 {
                lanes.remove(&self.family);
                tracing::debug!(family = %self.family, "family lane stopped");
            }
        }
    }
}
