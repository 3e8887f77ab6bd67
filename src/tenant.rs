use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::info;

use crate::autosave;
use crate::catalog::Catalog;
use crate::config::EngineConfig;
use crate::engine::{Engine, Remotes};
use crate::limits::*;
use crate::notify::NotifyHub;
use crate::persist::FileStore;

/// Manages per-tenant engines. Each tenant gets its own Engine, draft store
/// file and autosaver. All tenants share the channel-manager clients.
pub struct TenantManager {
    engines: DashMap<String, Arc<Engine>>,
    config: EngineConfig,
    remotes: Remotes,
    max_tenants: usize,
}

impl TenantManager {
    pub fn new(config: EngineConfig, remotes: Remotes) -> Self {
        Self {
            engines: DashMap::new(),
            config,
            remotes,
            max_tenants: MAX_TENANTS,
        }
    }

    /// Lower the tenant cap below [`MAX_TENANTS`].
    pub fn with_max_tenants(mut self, max_tenants: usize) -> Self {
        self.max_tenants = max_tenants.min(MAX_TENANTS);
        self
    }

    pub fn get(&self, tenant: &str) -> Option<Arc<Engine>> {
        let key = sanitize(tenant).ok()?;
        self.engines.get(&key).map(|e| e.value().clone())
    }

    /// Get or lazily create the engine for a tenant. `property_id` and
    /// `catalog` are only used on creation. Names that sanitize to the same
    /// file name share one engine.
    pub fn get_or_create(
        &self,
        tenant: &str,
        property_id: Option<String>,
        catalog: Catalog,
    ) -> std::io::Result<Arc<Engine>> {
        let safe_name = sanitize(tenant)?;
        if let Some(engine) = self.engines.get(&safe_name) {
            return Ok(engine.value().clone());
        }
        if self.engines.len() >= self.max_tenants {
            return Err(std::io::Error::other("too many tenants"));
        }

        std::fs::create_dir_all(&self.config.data_dir)?;
        let path = self.config.data_dir.join(format!("{safe_name}.drafts"));

        // The entry lock is held across the open so two callers can't end
        // up with two stores on one log file.
        let engine = match self.engines.entry(safe_name.clone()) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                let store = FileStore::open(&path, self.config.compact_threshold)
                    .map_err(|e| std::io::Error::other(e.to_string()))?;
                let engine = Arc::new(Engine::new(
                    safe_name.as_str(),
                    property_id,
                    catalog,
                    self.remotes.clone(),
                    Arc::new(store),
                    Arc::new(NotifyHub::new()),
                ));
                tokio::spawn(autosave::run_autosaver(
                    Arc::downgrade(&engine),
                    self.config.autosave_interval,
                ));
                info!("tenant {safe_name}: engine started, drafts at {}", path.display());
                entry.insert(engine.clone());
                engine
            }
        };

        metrics::gauge!(crate::observability::TENANTS_ACTIVE).set(self.engines.len() as f64);
        Ok(engine)
    }

    /// Flush the tenant's draft and drop its engine. The autosaver stops on
    /// its next tick.
    pub async fn close(&self, tenant: &str) -> bool {
        let Some(engine) = self.get(tenant) else {
            return false;
        };
        engine.persist().await;
        self.engines.remove(engine.tenant());
        metrics::gauge!(crate::observability::TENANTS_ACTIVE).set(self.engines.len() as f64);
        info!("tenant {tenant}: engine closed");
        true
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }
}

/// Tenant names become file names: keep only `[A-Za-z0-9_-]` (and other
/// alphanumerics) and reject what's left if it is empty or too long.
fn sanitize(tenant: &str) -> std::io::Result<String> {
    if tenant.len() > MAX_TENANT_NAME_LEN {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "tenant name too long",
        ));
    }
    let safe_name: String = tenant
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    if safe_name.is_empty() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "empty tenant name",
        ));
    }
    Ok(safe_name)
}
