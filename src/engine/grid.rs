use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::NaiveDate;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::catalog::Catalog;
use crate::model::*;
use crate::remote::{AriSnapshot, AriSource};

use super::EngineError;

/// Last-known remote state for one date range.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AriGrid {
    /// Range the snapshot was loaded for; `None` before the first load.
    pub range: Option<DateRange>,
    pub rate_plans: HashMap<EntityId, DatePlane<AriRecord>>,
    pub room_types: HashMap<EntityId, DatePlane<u32>>,
}

impl AriGrid {
    /// Translate a remote snapshot into local ids. Entities the catalog does
    /// not know, dates outside `range` and empty records are dropped; rates
    /// of zero or below are cleared.
    pub fn from_snapshot(snapshot: AriSnapshot, catalog: &Catalog, range: DateRange) -> Self {
        let mut rate_plans: HashMap<EntityId, DatePlane<AriRecord>> = HashMap::new();
        for (external_id, days) in snapshot.rate_plan_ari {
            let Some(id) = catalog.rate_plan_for_external(&external_id) else {
                debug!("ignoring ARI for unknown rate plan {external_id}");
                continue;
            };
            let plane: DatePlane<AriRecord> = days
                .into_iter()
                .filter(|(date, _)| range.contains(*date))
                .map(|(date, rec)| (date, rec.sanitized()))
                .filter(|(_, rec)| !rec.is_empty())
                .collect();
            if !plane.is_empty() {
                rate_plans.insert(id, plane);
            }
        }

        let mut room_types: HashMap<EntityId, DatePlane<u32>> = HashMap::new();
        for (external_id, days) in snapshot.room_type_availability {
            let Some(id) = catalog.room_type_for_external(&external_id) else {
                debug!("ignoring availability for unknown room type {external_id}");
                continue;
            };
            let plane: DatePlane<u32> = days
                .into_iter()
                .filter(|(date, _)| range.contains(*date))
                .collect();
            if !plane.is_empty() {
                room_types.insert(id, plane);
            }
        }

        Self {
            range: Some(range),
            rate_plans,
            room_types,
        }
    }

    pub fn record(&self, rate_plan_id: &EntityId, date: NaiveDate) -> Option<&AriRecord> {
        self.rate_plans.get(rate_plan_id)?.get(&date)
    }

    /// Explicit room-type availability, without any fallback.
    pub fn room_type_value(&self, room_type_id: &EntityId, date: NaiveDate) -> Option<u32> {
        self.room_types.get(room_type_id)?.get(&date).copied()
    }

    /// Stored value or `None`. Unknown entities and dates are not an error.
    pub fn get(&self, entity_id: &EntityId, date: NaiveDate, field: Field) -> Option<Value> {
        if let Some(plane) = self.rate_plans.get(entity_id) {
            return plane.get(&date)?.get(field);
        }
        match field {
            Field::Availability => self.room_type_value(entity_id, date).map(Value::Count),
            _ => None,
        }
    }
}

/// Outcome of a load that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The response replaced the grid.
    Applied { generation: u64 },
    /// A newer load was issued before this one resolved; its response was dropped.
    Superseded { generation: u64 },
}

/// Holds the current [`AriGrid`] and applies only the latest-issued load.
pub struct GridStore {
    grid: RwLock<Arc<AriGrid>>,
    issued: AtomicU64,
}

impl Default for GridStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GridStore {
    pub fn new() -> Self {
        Self {
            grid: RwLock::new(Arc::new(AriGrid::default())),
            issued: AtomicU64::new(0),
        }
    }

    pub async fn snapshot(&self) -> Arc<AriGrid> {
        self.grid.read().await.clone()
    }

    pub fn latest_generation(&self) -> u64 {
        self.issued.load(Ordering::SeqCst)
    }

    /// Reserve the next load generation. Callers issue it in the same
    /// critical section that reads the range being loaded, so generation
    /// order matches range-change order.
    pub fn issue(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Fetch `range` from `source` and replace the grid wholesale.
    ///
    /// On failure the previous grid stays. Either way, a response is dropped
    /// when a generation newer than `generation` has been issued.
    pub async fn load(
        &self,
        source: &dyn AriSource,
        property_id: &str,
        catalog: &Catalog,
        range: DateRange,
        generation: u64,
    ) -> Result<LoadOutcome, EngineError> {
        let started = std::time::Instant::now();
        let result = source.fetch_ari(property_id, range.start, range.end).await;
        metrics::histogram!(crate::observability::LOAD_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());

        // Generation is re-checked under the write lock so two responses
        // can't both pass the check and apply out of order.
        let mut guard = self.grid.write().await;
        if generation != self.issued.load(Ordering::SeqCst) {
            debug!("dropping superseded load {generation} for {}..{}", range.start, range.end);
            metrics::counter!(crate::observability::LOADS_TOTAL, "status" => "superseded")
                .increment(1);
            return Ok(LoadOutcome::Superseded { generation });
        }

        match result {
            Ok(snapshot) => {
                *guard = Arc::new(AriGrid::from_snapshot(snapshot, catalog, range));
                metrics::counter!(crate::observability::LOADS_TOTAL, "status" => "applied")
                    .increment(1);
                Ok(LoadOutcome::Applied { generation })
            }
            Err(e) => {
                warn!("ARI load for {}..{} failed: {e}", range.start, range.end);
                metrics::counter!(crate::observability::LOADS_TOTAL, "status" => "failed")
                    .increment(1);
                Err(EngineError::LoadFailed(e))
            }
        }
    }

    /// Write successfully pushed values into the current grid so reads reflect
    /// them until the follow-up reload lands. Dates outside the loaded range
    /// are ignored.
    pub async fn merge_pushed(
        &self,
        restrictions: &[(EntityId, NaiveDate, AriRecord)],
        availability: &[(EntityId, NaiveDate, u32)],
    ) {
        let mut guard = self.grid.write().await;
        let Some(range) = guard.range else { return };
        let grid = Arc::make_mut(&mut guard);
        for (id, date, record) in restrictions {
            if range.contains(*date) {
                grid.rate_plans.entry(*id).or_default().insert(*date, *record);
            }
        }
        for (id, date, value) in availability {
            if range.contains(*date) {
                grid.room_types.entry(*id).or_default().insert(*date, *value);
            }
        }
    }
}
