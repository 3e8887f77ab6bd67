mod derive;
mod draft;
mod error;
mod grid;
mod mutations;
mod queries;
mod sync;

pub use derive::{effective_room_type_availability, room_type_availability};
pub use draft::{Draft, DraftState, PersistedDraft};
pub use error::{Batch, EngineError};
pub use grid::{AriGrid, GridStore, LoadOutcome};
pub use sync::{ReloadStatus, SaveReport};

use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::calendar::{validate_range, Direction};
use crate::catalog::Catalog;
use crate::model::*;
use crate::notify::NotifyHub;
use crate::persist::{DraftStore, StoreError};
use crate::remote::{AriSource, EntityProvider, MutationSink};

/// The channel manager, read side and write side.
#[derive(Clone)]
pub struct Remotes {
    pub source: Arc<dyn AriSource>,
    pub sink: Arc<dyn MutationSink>,
}

/// The active window and the draft scoped to it. Locked together so a draft
/// can never be read against the wrong range.
#[derive(Default)]
pub(super) struct Session {
    range: Option<DateRange>,
    draft: Draft,
    /// Bumped on every draft change.
    revision: u64,
    /// Revision last written to the store.
    persisted_revision: u64,
}

/// One tenant's ARI calendar: grid, draft and sync, wired to injected
/// collaborators.
pub struct Engine {
    tenant: String,
    property_id: Option<String>,
    catalog: RwLock<Arc<Catalog>>,
    remotes: Remotes,
    store: Arc<dyn DraftStore>,
    pub grid: GridStore,
    session: RwLock<Session>,
    /// Serializes saves so a double submit can't push the same draft twice.
    saving: Mutex<()>,
    pub notify: Arc<NotifyHub>,
}

impl Engine {
    pub fn new(
        tenant: impl Into<String>,
        property_id: Option<String>,
        catalog: Catalog,
        remotes: Remotes,
        store: Arc<dyn DraftStore>,
        notify: Arc<NotifyHub>,
    ) -> Self {
        Self {
            tenant: tenant.into(),
            property_id,
            catalog: RwLock::new(Arc::new(catalog)),
            remotes,
            store,
            grid: GridStore::new(),
            session: RwLock::new(Session::default()),
            saving: Mutex::new(()),
            notify,
        }
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    pub fn property_id(&self) -> Option<&str> {
        self.property_id.as_deref()
    }

    pub(super) fn require_property(&self) -> Result<&str, EngineError> {
        self.property_id
            .as_deref()
            .ok_or(EngineError::Configuration("no external property is mapped"))
    }

    pub async fn catalog(&self) -> Arc<Catalog> {
        self.catalog.read().await.clone()
    }

    /// Swap in a new catalog. Takes effect on the next load.
    pub async fn set_catalog(&self, catalog: Catalog) {
        *self.catalog.write().await = Arc::new(catalog);
    }

    pub async fn refresh_catalog(&self, provider: &dyn EntityProvider) -> Result<(), EngineError> {
        let catalog = Catalog::from_provider(provider)
            .await
            .map_err(EngineError::LoadFailed)?;
        self.set_catalog(catalog).await;
        Ok(())
    }

    pub async fn active_range(&self) -> Option<DateRange> {
        self.session.read().await.range
    }

    // ── Range control ───────────────────────────────────────────

    /// Make `[start, end]` the active window: persist the outgoing draft,
    /// restore a saved draft for the new window if there is one, then load
    /// the grid.
    pub async fn activate_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<LoadOutcome, EngineError> {
        let range = validate_range(start, end)?;
        let restored_draft = {
            let mut session = self.session.write().await;
            if let Some(old) = session.range
                && session.revision != session.persisted_revision
            {
                self.write_draft(old, &session.draft);
            }
            let restored = self.read_draft(range);
            let restored_draft = restored.is_some();
            session.range = Some(range);
            session.draft = restored.unwrap_or_default();
            session.revision += 1;
            session.persisted_revision = session.revision;
            restored_draft
        };
        info!(
            "{}: range {}..{} active{}",
            self.tenant,
            range.start,
            range.end,
            if restored_draft { ", restored saved draft" } else { "" }
        );
        self.notify.send(EngineEvent::RangeChanged {
            range,
            restored_draft,
        });
        self.reload().await
    }

    /// Move the active window by its own length.
    pub async fn shift_range(&self, direction: Direction) -> Result<LoadOutcome, EngineError> {
        let current = self.active_range().await.ok_or(EngineError::NoActiveRange)?;
        let next = current.shift(direction)?;
        self.activate_range(next.start, next.end).await
    }

    /// Load the authoritative snapshot for the active range.
    pub async fn reload(&self) -> Result<LoadOutcome, EngineError> {
        let property_id = self.require_property()?;
        let (range, generation) = {
            let session = self.session.read().await;
            let range = session.range.ok_or(EngineError::NoActiveRange)?;
            // Range changes take the write lock, so no change can slip in
            // between reading the range and issuing its generation.
            (range, self.grid.issue())
        };
        let catalog = self.catalog().await;
        match self
            .grid
            .load(&*self.remotes.source, property_id, &catalog, range, generation)
            .await
        {
            Ok(LoadOutcome::Applied { generation }) => {
                self.notify.send(EngineEvent::GridLoaded { range, generation });
                Ok(LoadOutcome::Applied { generation })
            }
            Ok(superseded) => Ok(superseded),
            Err(e) => {
                self.notify.send(EngineEvent::LoadFailed {
                    range,
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    // ── Draft persistence ───────────────────────────────────────

    /// Write the draft to the store. Best-effort: failures are logged and
    /// reported as `false`.
    pub async fn persist(&self) -> bool {
        let mut session = self.session.write().await;
        let Some(range) = session.range else {
            return false;
        };
        let ok = self.write_draft(range, &session.draft);
        if ok {
            session.persisted_revision = session.revision;
        }
        ok
    }

    /// Persist only when the draft changed since the last write.
    pub async fn persist_if_changed(&self) -> bool {
        {
            let session = self.session.read().await;
            if session.range.is_none() || session.revision == session.persisted_revision {
                return false;
            }
        }
        self.persist().await
    }

    /// Replace the draft with the stored one for the active range. No-op
    /// (returns false) when nothing is stored under that exact key.
    pub async fn restore(&self) -> bool {
        let mut session = self.session.write().await;
        let Some(range) = session.range else {
            return false;
        };
        let Some(draft) = self.read_draft(range) else {
            return false;
        };
        session.draft = draft;
        session.revision += 1;
        session.persisted_revision = session.revision;
        self.notify.send(EngineEvent::DraftChanged {
            dirty: session.draft.is_dirty(),
        });
        true
    }

    /// A clean draft removes the stored record.
    fn write_draft(&self, range: DateRange, draft: &Draft) -> bool {
        let key = range.draft_key(&self.tenant);
        let result = if draft.is_dirty() {
            serde_json::to_string(&draft.to_record(key.clone()))
                .map_err(|e| StoreError::Serialization(e.to_string()))
                .and_then(|json| self.store.set(&key, &json))
        } else {
            self.store.remove(&key)
        };
        match result {
            Ok(()) => {
                debug!("persisted draft {key}");
                true
            }
            Err(e) => {
                warn!("persisting draft {key} failed: {e}");
                metrics::counter!(crate::observability::DRAFT_PERSIST_FAILURES_TOTAL).increment(1);
                false
            }
        }
    }

    fn read_draft(&self, range: DateRange) -> Option<Draft> {
        let key = range.draft_key(&self.tenant);
        let json = match self.store.get(&key) {
            Ok(Some(json)) => json,
            Ok(None) => return None,
            Err(e) => {
                warn!("reading draft {key} failed: {e}");
                metrics::counter!(crate::observability::DRAFT_PERSIST_FAILURES_TOTAL).increment(1);
                return None;
            }
        };
        match serde_json::from_str::<PersistedDraft>(&json) {
            Ok(record) if record.date_range_key == key => Some(Draft::from_record(record)),
            Ok(record) => {
                warn!("ignoring draft stored under {key} for {}", record.date_range_key);
                None
            }
            Err(e) => {
                warn!("discarding unreadable draft {key}: {e}");
                metrics::counter!(crate::observability::DRAFT_PERSIST_FAILURES_TOTAL).increment(1);
                None
            }
        }
    }
}
