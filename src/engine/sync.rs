use std::collections::{BTreeSet, HashSet};

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::catalog::Catalog;
use crate::model::*;
use crate::remote::{AvailabilityRecord, MutationSink, PushResponse, PushWarning, RestrictionRecord};

use super::{AriGrid, Batch, Draft, Engine, EngineError, LoadOutcome};

/// What happened to the grid after a successful push.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ReloadStatus {
    /// Nothing was pushed, so nothing was reloaded.
    #[default]
    NotNeeded,
    Applied,
    /// A newer load (e.g. a range change) won.
    Superseded,
    /// The push went through but the reload failed; the grid holds the
    /// optimistically merged values.
    Failed(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveReport {
    pub restrictions_sent: usize,
    pub availability_sent: usize,
    /// Entities whose edits were left out because they have no external id.
    pub skipped: Vec<EntityId>,
    /// Per-record warnings from both batches, de-duplicated, in arrival order.
    pub warnings: Vec<PushWarning>,
    pub reload: ReloadStatus,
}

/// The two upstream batches plus the local form of what they carry.
#[derive(Debug, Default)]
pub(super) struct Batches {
    pub restrictions: Vec<RestrictionRecord>,
    pub availability: Vec<AvailabilityRecord>,
    pub merged_restrictions: Vec<(EntityId, NaiveDate, AriRecord)>,
    pub merged_availability: Vec<(EntityId, NaiveDate, u32)>,
    pub skipped: BTreeSet<EntityId>,
}

impl Batches {
    pub fn is_empty(&self) -> bool {
        self.restrictions.is_empty() && self.availability.is_empty()
    }
}

/// Diff the draft against the grid.
///
/// A rate plan × date goes out when a staged field differs from the grid;
/// the record carries every populated field of grid + draft. A staged rate
/// of zero or below counts as unset and is never sent. Room-type
/// availability goes out when it differs from the explicit grid value.
/// Entities without an external id are skipped, not failed.
pub(super) fn build_batches(draft: &Draft, grid: &AriGrid, catalog: &Catalog) -> Batches {
    let mut batches = Batches::default();

    for ((id, date), patch) in draft.rate_plan_patches() {
        let base = grid.record(&id, date).copied().unwrap_or_default();
        let staged_rate = patch.rate.and_then(positive_rate);
        let rate_changed = staged_rate.is_some_and(|r| Some(r) != base.rate);
        let restrictions_changed = !base.restrictions.covers(&patch.restrictions);
        if !rate_changed && !restrictions_changed {
            continue;
        }

        let merged = AriRecord {
            rate: match patch.rate {
                Some(_) => staged_rate,
                None => base.rate,
            },
            restrictions: base.restrictions.overlay(&patch.restrictions),
        }
        .sanitized();

        let Some(external_id) = catalog.rate_plan(&id).and_then(|p| p.external_id.clone()) else {
            if batches.skipped.insert(id) {
                warn!("rate plan {id} has no channel-manager mapping; skipping its edits");
            }
            continue;
        };
        batches.restrictions.push(RestrictionRecord {
            rate_plan_id: external_id,
            date,
            rate: merged.rate,
            restrictions: merged.restrictions,
        });
        batches.merged_restrictions.push((id, date, merged));
    }

    for ((id, date), availability) in draft.room_type_patches() {
        if grid.room_type_value(&id, date) == Some(availability) {
            continue;
        }
        let Some(external_id) = catalog.room_type(&id).and_then(|rt| rt.external_id.clone()) else {
            if batches.skipped.insert(id) {
                warn!("room type {id} has no channel-manager mapping; skipping its edits");
            }
            continue;
        };
        batches.availability.push(AvailabilityRecord {
            room_type_id: external_id,
            date,
            availability,
        });
        batches.merged_availability.push((id, date, availability));
    }

    batches
}

/// Concatenate, dropping exact duplicates but keeping first-seen order.
pub(super) fn merge_warnings(first: Vec<PushWarning>, second: Vec<PushWarning>) -> Vec<PushWarning> {
    let mut seen = HashSet::new();
    first
        .into_iter()
        .chain(second)
        .filter(|w| seen.insert(w.clone()))
        .collect()
}

async fn push_restrictions(
    sink: &dyn MutationSink,
    records: Vec<RestrictionRecord>,
) -> Result<PushResponse, EngineError> {
    if records.is_empty() {
        return Ok(PushResponse::default());
    }
    let count = records.len() as u64;
    let response = sink
        .push_restrictions(records)
        .await
        .map_err(|reason| EngineError::PushFailed {
            batch: Batch::Restrictions,
            reason,
        })?;
    metrics::counter!(crate::observability::PUSH_RECORDS_TOTAL, "batch" => Batch::Restrictions.label())
        .increment(count);
    Ok(response)
}

async fn push_availability(
    sink: &dyn MutationSink,
    records: Vec<AvailabilityRecord>,
) -> Result<PushResponse, EngineError> {
    if records.is_empty() {
        return Ok(PushResponse::default());
    }
    let count = records.len() as u64;
    let response = sink
        .push_availability(records)
        .await
        .map_err(|reason| EngineError::PushFailed {
            batch: Batch::Availability,
            reason,
        })?;
    metrics::counter!(crate::observability::PUSH_RECORDS_TOTAL, "batch" => Batch::Availability.label())
        .increment(count);
    Ok(response)
}

impl Engine {
    /// Push the draft upstream.
    ///
    /// Both batches are sent together and awaited jointly. Only a batch
    /// rejection fails the save; per-record warnings are returned in the
    /// report. After a successful push the committed edits leave the draft
    /// and the grid is reloaded, warnings or not.
    pub async fn save(&self) -> Result<SaveReport, EngineError> {
        let _saving = self.saving.lock().await;

        let Ok(property_id) = self.require_property() else {
            metrics::counter!(crate::observability::SAVES_TOTAL, "status" => "config_error")
                .increment(1);
            return Err(EngineError::Configuration("no external property is mapped"));
        };

        let (range, committed) = {
            let session = self.session.read().await;
            let range = session.range.ok_or(EngineError::NoActiveRange)?;
            (range, session.draft.clone())
        };
        if !committed.is_dirty() {
            metrics::counter!(crate::observability::SAVES_TOTAL, "status" => "noop").increment(1);
            return Ok(SaveReport::default());
        }

        let grid = self.grid.snapshot().await;
        let catalog = self.catalog().await;
        let batches = build_batches(&committed, &grid, &catalog);
        metrics::counter!(crate::observability::PUSH_SKIPPED_TOTAL).increment(batches.skipped.len() as u64);

        let mut report = SaveReport {
            restrictions_sent: batches.restrictions.len(),
            availability_sent: batches.availability.len(),
            skipped: batches.skipped.iter().copied().collect(),
            ..Default::default()
        };

        if batches.is_empty() {
            // Everything staged already matches the grid (or can't be sent).
            self.finish_commit(range, &committed).await;
            metrics::counter!(crate::observability::SAVES_TOTAL, "status" => "noop").increment(1);
            return Ok(report);
        }

        info!(
            "{}: saving {} restriction and {} availability records for property {property_id}",
            self.tenant(),
            report.restrictions_sent,
            report.availability_sent
        );
        let sink = &*self.remotes.sink;
        let (restrictions, availability) = futures::join!(
            push_restrictions(sink, batches.restrictions),
            push_availability(sink, batches.availability),
        );
        let (restrictions, availability) = match (restrictions, availability) {
            (Ok(r), Ok(a)) => (r, a),
            (Err(e), _) | (_, Err(e)) => {
                warn!("{}: save failed: {e}", self.tenant());
                metrics::counter!(crate::observability::SAVES_TOTAL, "status" => "failed").increment(1);
                self.persist().await;
                self.notify.send(EngineEvent::SaveFailed {
                    reason: e.to_string(),
                });
                return Err(e);
            }
        };

        report.warnings = merge_warnings(restrictions.warnings, availability.warnings);
        if !report.warnings.is_empty() {
            warn!("{}: channel manager returned {} warnings", self.tenant(), report.warnings.len());
            metrics::counter!(crate::observability::PUSH_WARNINGS_TOTAL)
                .increment(report.warnings.len() as u64);
        }

        self.grid
            .merge_pushed(&batches.merged_restrictions, &batches.merged_availability)
            .await;
        self.finish_commit(range, &committed).await;

        report.reload = match self.reload().await {
            Ok(LoadOutcome::Applied { .. }) => ReloadStatus::Applied,
            Ok(LoadOutcome::Superseded { .. }) => ReloadStatus::Superseded,
            Err(e) => ReloadStatus::Failed(e.to_string()),
        };

        metrics::counter!(crate::observability::SAVES_TOTAL, "status" => "ok").increment(1);
        self.notify.send(EngineEvent::SaveCompleted {
            records: report.restrictions_sent + report.availability_sent,
            warnings: report.warnings.len(),
        });
        Ok(report)
    }

    /// Drop what was just committed from the draft it came from. If the user
    /// moved to another range meanwhile, the stored draft for `range` is
    /// updated instead.
    async fn finish_commit(&self, range: DateRange, committed: &Draft) {
        let mut session = self.session.write().await;
        if session.range == Some(range) {
            session.draft.discard_committed(committed);
            session.revision += 1;
            if self.write_draft(range, &session.draft) {
                session.persisted_revision = session.revision;
            }
            self.notify.send(EngineEvent::DraftChanged {
                dirty: session.draft.is_dirty(),
            });
        } else if let Some(mut stored) = self.read_draft(range) {
            stored.discard_committed(committed);
            self.write_draft(range, &stored);
        }
    }
}
