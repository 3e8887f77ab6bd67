// ── Remote traffic ──────────────────────────────────────────────

/// Counter: grid loads. Labels: status (applied, superseded, failed).
pub const LOADS_TOTAL: &str = "arisync_loads_total";

/// Histogram: remote fetch latency in seconds.
pub const LOAD_DURATION_SECONDS: &str = "arisync_load_duration_seconds";

/// Counter: save attempts. Labels: status (ok, noop, failed, config_error).
pub const SAVES_TOTAL: &str = "arisync_saves_total";

/// Counter: records sent upstream. Labels: batch (restrictions, availability).
pub const PUSH_RECORDS_TOTAL: &str = "arisync_push_records_total";

/// Counter: distinct per-record warnings returned by the channel manager.
pub const PUSH_WARNINGS_TOTAL: &str = "arisync_push_warnings_total";

/// Counter: records left out because their entity has no external id.
pub const PUSH_SKIPPED_TOTAL: &str = "arisync_push_skipped_total";

// ── Local state ─────────────────────────────────────────────────

/// Counter: draft persist/restore attempts that failed and were swallowed.
pub const DRAFT_PERSIST_FAILURES_TOTAL: &str = "arisync_draft_persist_failures_total";

/// Counter: draft store log compactions.
pub const STORE_COMPACTIONS_TOTAL: &str = "arisync_store_compactions_total";

/// Gauge: number of tenants with a live engine.
pub const TENANTS_ACTIVE: &str = "arisync_tenants_active";
