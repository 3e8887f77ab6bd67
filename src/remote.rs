//! Collaborators the engine talks to: the channel manager (read side and
//! write side) and the entity provider. Transport is up to the implementor.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::model::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// The request never got a response.
    Transport(String),
    /// The remote answered with a failure status.
    Status { code: u16, message: String },
    /// The response could not be decoded.
    Decode(String),
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemoteError::Transport(e) => write!(f, "transport error: {e}"),
            RemoteError::Status { code, message } => write!(f, "remote returned {code}: {message}"),
            RemoteError::Decode(e) => write!(f, "invalid response: {e}"),
        }
    }
}

impl std::error::Error for RemoteError {}

/// Authoritative ARI as returned by the channel manager, keyed by external
/// entity id then date.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AriSnapshot {
    #[serde(default)]
    pub rate_plan_ari: HashMap<String, BTreeMap<NaiveDate, AriRecord>>,
    #[serde(default)]
    pub room_type_availability: HashMap<String, BTreeMap<NaiveDate, u32>>,
}

/// One rate plan × date entry of the restriction batch. Only populated
/// fields are serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestrictionRecord {
    pub rate_plan_id: String,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate: Option<Decimal>,
    #[serde(flatten)]
    pub restrictions: Restrictions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityRecord {
    pub room_type_id: String,
    pub date: NaiveDate,
    pub availability: u32,
}

/// A record the remote accepted at transport level but flagged. The record
/// may still have been applied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PushWarning {
    pub date: NaiveDate,
    /// Field name → messages.
    pub messages: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushResponse {
    #[serde(default)]
    pub warnings: Vec<PushWarning>,
}

#[async_trait]
pub trait AriSource: Send + Sync {
    async fn fetch_ari(
        &self,
        property_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<AriSnapshot, RemoteError>;
}

#[async_trait]
pub trait MutationSink: Send + Sync {
    async fn push_restrictions(
        &self,
        records: Vec<RestrictionRecord>,
    ) -> Result<PushResponse, RemoteError>;

    async fn push_availability(
        &self,
        records: Vec<AvailabilityRecord>,
    ) -> Result<PushResponse, RemoteError>;
}

#[async_trait]
pub trait EntityProvider: Send + Sync {
    async fn entities(&self) -> Result<(Vec<RoomType>, Vec<RatePlan>), RemoteError>;
}
