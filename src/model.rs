use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Local identifier of a room type or rate plan.
pub type EntityId = Ulid;

/// One entity's values, keyed by calendar date.
pub type DatePlane<T> = BTreeMap<NaiveDate, T>;

/// Inclusive calendar window `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        debug_assert!(start <= end, "DateRange start must not be after end");
        Self { start, end }
    }

    /// Number of calendar days covered, both ends included.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomType {
    pub id: EntityId,
    pub external_id: Option<String>,
    pub name: String,
    pub position: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatePlan {
    pub id: EntityId,
    pub external_id: Option<String>,
    pub name: String,
    /// Owning room type.
    pub room_type_id: EntityId,
    pub position: u32,
}

/// The entity an edit or read addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    RoomType(EntityId),
    RatePlan(EntityId),
}

impl Target {
    pub fn id(&self) -> EntityId {
        match self {
            Target::RoomType(id) | Target::RatePlan(id) => *id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Field {
    Rate,
    Availability,
    MinStay,
    MaxStay,
    ClosedToArrival,
    ClosedToDeparture,
    StopSell,
}

impl Field {
    pub const ALL: [Field; 7] = [
        Field::Rate,
        Field::Availability,
        Field::MinStay,
        Field::MaxStay,
        Field::ClosedToArrival,
        Field::ClosedToDeparture,
        Field::StopSell,
    ];

    /// Key used by the channel manager for this field.
    pub fn name(&self) -> &'static str {
        match self {
            Field::Rate => "rate",
            Field::Availability => "availability",
            Field::MinStay => "minStay",
            Field::MaxStay => "maxStay",
            Field::ClosedToArrival => "closedToArrival",
            Field::ClosedToDeparture => "closedToDeparture",
            Field::StopSell => "stopSell",
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A single field value. Which variant is valid depends on the [`Field`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    Rate(Decimal),
    Count(u32),
    Flag(bool),
}

impl Value {
    pub fn fits(&self, field: Field) -> bool {
        matches!(
            (field, self),
            (Field::Rate, Value::Rate(_))
                | (Field::Availability | Field::MinStay | Field::MaxStay, Value::Count(_))
                | (
                    Field::ClosedToArrival | Field::ClosedToDeparture | Field::StopSell,
                    Value::Flag(_)
                )
        )
    }
}

/// Everything on an ARI record except the rate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Restrictions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_stay: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_stay: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_to_arrival: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_to_departure: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_sell: Option<bool>,
}

impl Restrictions {
    pub fn get(&self, field: Field) -> Option<Value> {
        match field {
            Field::Rate => None,
            Field::Availability => self.availability.map(Value::Count),
            Field::MinStay => self.min_stay.map(Value::Count),
            Field::MaxStay => self.max_stay.map(Value::Count),
            Field::ClosedToArrival => self.closed_to_arrival.map(Value::Flag),
            Field::ClosedToDeparture => self.closed_to_departure.map(Value::Flag),
            Field::StopSell => self.stop_sell.map(Value::Flag),
        }
    }

    /// Store `value` under `field`. Returns false when the pair does not fit
    /// (including any attempt to store a rate here).
    pub fn set(&mut self, field: Field, value: Value) -> bool {
        match (field, value) {
            (Field::Availability, Value::Count(n)) => self.availability = Some(n),
            (Field::MinStay, Value::Count(n)) => self.min_stay = Some(n),
            (Field::MaxStay, Value::Count(n)) => self.max_stay = Some(n),
            (Field::ClosedToArrival, Value::Flag(b)) => self.closed_to_arrival = Some(b),
            (Field::ClosedToDeparture, Value::Flag(b)) => self.closed_to_departure = Some(b),
            (Field::StopSell, Value::Flag(b)) => self.stop_sell = Some(b),
            _ => return false,
        }
        true
    }

    pub fn is_empty(&self) -> bool {
        *self == Restrictions::default()
    }

    /// Fields set in `over` win; the rest come from `self`.
    pub fn overlay(&self, over: &Restrictions) -> Restrictions {
        Restrictions {
            availability: over.availability.or(self.availability),
            min_stay: over.min_stay.or(self.min_stay),
            max_stay: over.max_stay.or(self.max_stay),
            closed_to_arrival: over.closed_to_arrival.or(self.closed_to_arrival),
            closed_to_departure: over.closed_to_departure.or(self.closed_to_departure),
            stop_sell: over.stop_sell.or(self.stop_sell),
        }
    }

    /// True when every field set in `staged` already has that value here.
    pub fn covers(&self, staged: &Restrictions) -> bool {
        self.overlay(staged) == *self
    }
}

/// Sparse per-(entity, date) record. A missing field inherits the channel
/// manager's default; it does not mean zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AriRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate: Option<Decimal>,
    #[serde(flatten)]
    pub restrictions: Restrictions,
}

impl AriRecord {
    pub fn get(&self, field: Field) -> Option<Value> {
        match field {
            Field::Rate => self.rate.map(Value::Rate),
            other => self.restrictions.get(other),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rate.is_none() && self.restrictions.is_empty()
    }

    /// Rates of zero or below mean "unset" and are dropped.
    pub fn sanitized(mut self) -> Self {
        self.rate = self.rate.and_then(positive_rate);
        self
    }
}

pub fn positive_rate(rate: Decimal) -> Option<Decimal> {
    (rate > Decimal::ZERO).then_some(rate)
}

/// Notifications published to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    RangeChanged {
        range: DateRange,
        restored_draft: bool,
    },
    GridLoaded {
        range: DateRange,
        generation: u64,
    },
    LoadFailed {
        range: DateRange,
        reason: String,
    },
    DraftChanged {
        dirty: bool,
    },
    SaveCompleted {
        records: usize,
        warnings: usize,
    },
    SaveFailed {
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn range_days_inclusive() {
        let r = DateRange::new(d("2025-06-01"), d("2025-06-14"));
        assert_eq!(r.days(), 14);
        assert!(r.contains(d("2025-06-01")));
        assert!(r.contains(d("2025-06-14")));
        assert!(!r.contains(d("2025-06-15")));

        let single = DateRange::new(d("2025-06-01"), d("2025-06-01"));
        assert_eq!(single.days(), 1);
    }

    #[test]
    fn value_fits_field() {
        assert!(Value::Rate(Decimal::from(100)).fits(Field::Rate));
        assert!(Value::Count(3).fits(Field::MinStay));
        assert!(Value::Flag(true).fits(Field::StopSell));
        assert!(!Value::Flag(true).fits(Field::Availability));
        assert!(!Value::Count(3).fits(Field::Rate));
    }

    #[test]
    fn restrictions_reject_rate() {
        let mut r = Restrictions::default();
        assert!(!r.set(Field::Rate, Value::Rate(Decimal::ONE)));
        assert!(!r.set(Field::StopSell, Value::Count(1)));
        assert!(r.is_empty());
        assert!(r.set(Field::StopSell, Value::Flag(true)));
        assert_eq!(r.get(Field::StopSell), Some(Value::Flag(true)));
    }

    #[test]
    fn overlay_prefers_staged_fields() {
        let base = Restrictions {
            availability: Some(4),
            min_stay: Some(2),
            ..Default::default()
        };
        let staged = Restrictions {
            min_stay: Some(3),
            stop_sell: Some(true),
            ..Default::default()
        };
        let merged = base.overlay(&staged);
        assert_eq!(merged.availability, Some(4));
        assert_eq!(merged.min_stay, Some(3));
        assert_eq!(merged.stop_sell, Some(true));
        assert!(!base.covers(&staged));
        assert!(merged.covers(&staged));
    }

    #[test]
    fn sanitized_drops_non_positive_rate() {
        let zero = AriRecord {
            rate: Some(Decimal::ZERO),
            ..Default::default()
        };
        assert_eq!(zero.sanitized().rate, None);

        let negative = AriRecord {
            rate: Some(Decimal::from(-5)),
            ..Default::default()
        };
        assert_eq!(negative.sanitized().rate, None);

        let ok = AriRecord {
            rate: Some(Decimal::new(12050, 2)),
            ..Default::default()
        };
        assert_eq!(ok.sanitized().rate, Some(Decimal::new(12050, 2)));
    }

    #[test]
    fn record_serializes_sparse_camel_case() {
        let rec = AriRecord {
            rate: None,
            restrictions: Restrictions {
                min_stay: Some(2),
                closed_to_arrival: Some(false),
                ..Default::default()
            },
        };
        let json = serde_json::to_value(rec).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "minStay": 2, "closedToArrival": false })
        );
        let back: AriRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, rec);
    }
}
