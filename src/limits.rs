/// Widest calendar window a single load may request.
pub const MAX_RANGE_DAYS: i64 = 366;

/// Largest serialized draft the durable store accepts for one key.
pub const MAX_DRAFT_BYTES: usize = 4 * 1024 * 1024;

pub const MAX_TENANTS: usize = 1024;
pub const MAX_TENANT_NAME_LEN: usize = 128;
