//! The coordinator: a single mutex guarding the region/worker registries,
//! backed by the durable [`Store`] and fronted by the [`EventBus`].

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::event::{Event, EventBus, Subscriber};
use crate::registry::{RegionState, RegionStatus, WorkerState, WorkerUpdate, KNOWN_REGIONS};
use crate::store::Store;
use crate::CoordinatorError;

const CELLS_PER_REGION: u64 = 2048 * 2048;

fn now_unix() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[derive(Serialize)]
pub struct StatusSnapshot {
    pub regions: Vec<RegionState>,
    pub workers: Vec<WorkerState>,
    pub total_regions: usize,
    pub complete_regions: usize,
    pub overall_progress: f64,
}

struct Inner {
    regions: BTreeMap<String, RegionState>,
    workers: BTreeMap<String, WorkerState>,
}

pub struct Coordinator {
    inner: Mutex<Inner>,
    store: Store,
    events: EventBus,
}

impl Coordinator {
    pub fn open(db_path: &Path) -> Result<Self, CoordinatorError> {
        let store = Store::open(db_path)?;
        Self::from_store(store)
    }

    pub fn open_in_memory() -> Result<Self, CoordinatorError> {
        Self::from_store(Store::open_in_memory()?)
    }

    fn from_store(store: Store) -> Result<Self, CoordinatorError> {
        let mut regions = BTreeMap::new();
        for region in store.load_regions()? {
            regions.insert(region.key(), region);
        }
        if regions.is_empty() {
            for &(rx, ry) in KNOWN_REGIONS {
                let region = RegionState::new(rx, ry, CELLS_PER_REGION);
                regions.insert(region.key(), region);
            }
        }

        Ok(Self {
            inner: Mutex::new(Inner {
                regions,
                workers: BTreeMap::new(),
            }),
            store,
            events: EventBus::new(),
        })
    }

    pub fn subscribe(&self) -> (u64, Subscriber) {
        self.events.subscribe()
    }

    pub fn unsubscribe(&self, id: u64) {
        self.events.unsubscribe(id);
    }

    pub fn push_log(&self, level: &str, message: impl Into<String>) {
        self.events.publish(Event::Log {
            level: level.to_string(),
            message: message.into(),
        });
    }

    pub fn publish(&self, event: Event) {
        self.events.publish(event);
    }

    pub fn register_worker(&self, name: impl Into<String>) {
        let name = name.into();
        let mut inner = self.inner.lock().unwrap();
        inner
            .workers
            .entry(name.clone())
            .or_insert_with(|| WorkerState::new(name));
    }

    pub fn remove_worker(&self, name: &str) {
        self.inner.lock().unwrap().workers.remove(name);
        self.events.publish(Event::WorkerUpdate {
            worker_name: name.to_string(),
        });
    }

    pub fn update_worker(&self, name: &str, update: WorkerUpdate) {
        {
            let mut inner = self.inner.lock().unwrap();
            if let Some(worker) = inner.workers.get_mut(name) {
                if let Some(status) = update.status {
                    worker.status = status;
                }
                if let Some(region) = update.current_region {
                    worker.current_region = region;
                }
                if let Some((x, y, z)) = update.position {
                    worker.x = x;
                    worker.y = y;
                    worker.z = z;
                }
                if let Some(cells) = update.cells_scanned {
                    worker.cells_scanned = cells;
                }
                if let Some(rate) = update.cells_per_sec {
                    worker.cells_per_sec = rate;
                }
                if let Some(errors) = update.errors {
                    worker.errors = errors;
                }
            }
        }
        self.events.publish(Event::WorkerUpdate {
            worker_name: name.to_string(),
        });
    }

    /// Claims the first pending region (sorted by key) for `worker`,
    /// persists the claim, and emits a region_update event.
    pub fn get_next_region(&self, worker: &str) -> Result<Option<RegionState>, CoordinatorError> {
        let claimed = {
            let mut inner = self.inner.lock().unwrap();
            let next_key = inner
                .regions
                .values()
                .find(|r| r.status == RegionStatus::Pending)
                .map(|r| r.key());

            match next_key {
                Some(key) => {
                    let region = inner.regions.get_mut(&key).unwrap();
                    region.status = RegionStatus::Scanning;
                    region.assigned_worker = worker.to_string();
                    region.started_at = now_unix();
                    Some(region.clone())
                }
                None => None,
            }
        };

        if let Some(region) = &claimed {
            self.store.persist_region(region)?;
            self.events.publish(Event::RegionUpdate {
                region_key: region.key(),
            });
        }

        Ok(claimed)
    }

    /// Releases a claimed region back to the registry. `Complete` sets
    /// `completed_at`; any other status clears the claim so it becomes
    /// eligible for `get_next_region` again.
    pub fn release_region(
        &self,
        region_key: &str,
        status: RegionStatus,
        error: Option<String>,
    ) -> Result<(), CoordinatorError> {
        let updated = {
            let mut inner = self.inner.lock().unwrap();
            match inner.regions.get_mut(region_key) {
                Some(region) => {
                    region.status = status;
                    if status == RegionStatus::Complete {
                        region.completed_at = now_unix();
                    } else {
                        region.assigned_worker.clear();
                        region.started_at = 0.0;
                    }
                    if let Some(err) = error {
                        region.error = err;
                    }
                    Some(region.clone())
                }
                None => None,
            }
        };

        if let Some(region) = updated {
            self.store.persist_region(&region)?;
            self.events.publish(Event::RegionUpdate {
                region_key: region.key(),
            });
        }
        Ok(())
    }

    pub fn record_cell(
        &self,
        region_key: &str,
        cell_x: i64,
        cell_y: i64,
        height: i16,
        nswe: u8,
    ) -> Result<(), CoordinatorError> {
        self.store
            .record_cell(region_key, cell_x, cell_y, height, nswe)?;

        let mut inner = self.inner.lock().unwrap();
        if let Some(region) = inner.regions.get_mut(region_key) {
            region.scanned_cells += 1;
        }
        Ok(())
    }

    pub fn get_scanned_cells(
        &self,
        region_key: &str,
    ) -> Result<Vec<(i64, i64, i16, u8)>, CoordinatorError> {
        self.store.load_scanned_cells(region_key)
    }

    pub fn get_status(&self) -> StatusSnapshot {
        let inner = self.inner.lock().unwrap();
        let regions: Vec<RegionState> = inner.regions.values().cloned().collect();
        let workers: Vec<WorkerState> = inner.workers.values().cloned().collect();

        let complete_regions = regions
            .iter()
            .filter(|r| r.status == RegionStatus::Complete)
            .count();
        let overall_progress = if regions.is_empty() {
            0.0
        } else {
            regions.iter().map(|r| r.progress()).sum::<f64>() / regions.len() as f64
        };

        StatusSnapshot {
            total_regions: regions.len(),
            complete_regions,
            overall_progress,
            regions,
            workers,
        }
    }

    /// Truncates the durable store and resets the in-memory registry back
    /// to all-pending for the known region list.
    pub fn reset(&self) -> Result<(), CoordinatorError> {
        self.store.reset()?;
        let mut inner = self.inner.lock().unwrap();
        inner.regions.clear();
        inner.workers.clear();
        for &(rx, ry) in KNOWN_REGIONS {
            let region = RegionState::new(rx, ry, CELLS_PER_REGION);
            inner.regions.insert(region.key(), region);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeds_known_regions_when_store_is_empty() {
        let coordinator = Coordinator::open_in_memory().unwrap();
        let status = coordinator.get_status();
        assert_eq!(status.total_regions, KNOWN_REGIONS.len());
        assert_eq!(status.complete_regions, 0);
    }

    #[test]
    fn get_next_region_claims_and_persists_in_sorted_order() {
        let coordinator = Coordinator::open_in_memory().unwrap();
        let claimed = coordinator.get_next_region("worker-a").unwrap().unwrap();
        assert_eq!(claimed.status, RegionStatus::Scanning);
        assert_eq!(claimed.assigned_worker, "worker-a");

        let second = coordinator.get_next_region("worker-b").unwrap().unwrap();
        assert_ne!(claimed.key(), second.key());
    }

    #[test]
    fn release_region_complete_sets_completed_at() {
        let coordinator = Coordinator::open_in_memory().unwrap();
        let claimed = coordinator.get_next_region("worker-a").unwrap().unwrap();
        coordinator
            .release_region(&claimed.key(), RegionStatus::Complete, None)
            .unwrap();

        let status = coordinator.get_status();
        let region = status
            .regions
            .iter()
            .find(|r| r.key() == claimed.key())
            .unwrap();
        assert_eq!(region.status, RegionStatus::Complete);
        assert!(region.completed_at > 0.0);
    }

    #[test]
    fn release_region_pending_clears_claim_for_reclaim() {
        let coordinator = Coordinator::open_in_memory().unwrap();
        let claimed = coordinator.get_next_region("worker-a").unwrap().unwrap();
        coordinator
            .release_region(&claimed.key(), RegionStatus::Pending, None)
            .unwrap();

        let reclaimed = coordinator.get_next_region("worker-b").unwrap().unwrap();
        assert_eq!(reclaimed.key(), claimed.key());
        assert_eq!(reclaimed.assigned_worker, "worker-b");
    }

    #[test]
    fn record_cell_increments_scanned_count_and_persists() {
        let coordinator = Coordinator::open_in_memory().unwrap();
        let claimed = coordinator.get_next_region("worker-a").unwrap().unwrap();
        coordinator
            .record_cell(&claimed.key(), 0, 0, -100, 0xFF)
            .unwrap();

        let status = coordinator.get_status();
        let region = status
            .regions
            .iter()
            .find(|r| r.key() == claimed.key())
            .unwrap();
        assert_eq!(region.scanned_cells, 1);

        let cells = coordinator.get_scanned_cells(&claimed.key()).unwrap();
        assert_eq!(cells, vec![(0, 0, -100, 0xFF)]);
    }

    #[test]
    fn reset_restores_all_known_regions_to_pending() {
        let coordinator = Coordinator::open_in_memory().unwrap();
        coordinator.get_next_region("worker-a").unwrap();
        coordinator.reset().unwrap();

        let status = coordinator.get_status();
        assert!(status.regions.iter().all(|r| r.status == RegionStatus::Pending));
    }
}
