use chrono::NaiveDate;

use crate::model::{EntityId, Field, Value};
use crate::remote::RemoteError;

/// Which upstream batch a push failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Batch {
    Restrictions,
    Availability,
}

impl Batch {
    pub fn label(&self) -> &'static str {
        match self {
            Batch::Restrictions => "restrictions",
            Batch::Availability => "availability",
        }
    }
}

#[derive(Debug)]
pub enum EngineError {
    /// Required setup is missing (e.g. no external property mapped).
    Configuration(&'static str),
    InvalidRange {
        start: NaiveDate,
        end: NaiveDate,
    },
    LimitExceeded(&'static str),
    /// No range has been activated yet.
    NoActiveRange,
    /// Edits are scoped to the active range.
    DateOutOfRange(NaiveDate),
    UnknownEntity(EntityId),
    FieldMismatch {
        field: Field,
        value: Value,
    },
    /// Room types only carry availability.
    UnsupportedField {
        entity: EntityId,
        field: Field,
    },
    /// The remote ARI source failed; the previous grid is still in place.
    LoadFailed(RemoteError),
    /// A whole batch was rejected at transport level; the draft is kept.
    PushFailed {
        batch: Batch,
        reason: RemoteError,
    },
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Configuration(msg) => write!(f, "configuration error: {msg}"),
            EngineError::InvalidRange { start, end } => {
                write!(f, "invalid date range: {start} is after {end}")
            }
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::NoActiveRange => write!(f, "no date range is active"),
            EngineError::DateOutOfRange(date) => write!(f, "{date} is outside the active range"),
            EngineError::UnknownEntity(id) => write!(f, "unknown entity: {id}"),
            EngineError::FieldMismatch { field, value } => {
                write!(f, "value {value:?} does not fit field {field}")
            }
            EngineError::UnsupportedField { entity, field } => {
                write!(f, "field {field} cannot be set on room type {entity}")
            }
            EngineError::LoadFailed(e) => write!(f, "loading ARI failed: {e}"),
            EngineError::PushFailed { batch, reason } => {
                write!(f, "pushing {} failed: {reason}", batch.label())
            }
        }
    }
}

impl std::error::Error for EngineError {}
