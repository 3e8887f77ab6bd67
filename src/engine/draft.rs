use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::model::*;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DraftState {
    /// Nothing staged; reads pass through to the grid.
    #[default]
    Clean,
    /// At least one value has been staged.
    Dirty,
}

/// Local edits layered over the grid, for one date range.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    /// Rate plan → date → rate.
    rates: HashMap<EntityId, DatePlane<Decimal>>,
    /// Room type → date → availability.
    availability: HashMap<EntityId, DatePlane<u32>>,
    /// Rate plan → date → restriction fields.
    restrictions: HashMap<EntityId, DatePlane<Restrictions>>,
    selected_days: BTreeSet<NaiveDate>,
}

/// On-disk form of a [`Draft`], stored as JSON under `tenant:start:end`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedDraft {
    pub date_range_key: String,
    #[serde(default)]
    pub rates: HashMap<EntityId, DatePlane<Decimal>>,
    #[serde(default)]
    pub availability: HashMap<EntityId, DatePlane<u32>>,
    #[serde(default)]
    pub restrictions: HashMap<EntityId, DatePlane<Restrictions>>,
    #[serde(default)]
    pub selected_days: BTreeSet<NaiveDate>,
}

impl Draft {
    pub fn state(&self) -> DraftState {
        if self.rates.is_empty() && self.availability.is_empty() && self.restrictions.is_empty() {
            DraftState::Clean
        } else {
            DraftState::Dirty
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.state() == DraftState::Dirty
    }

    /// Overwrite the staged value. Returns false, staging nothing, when the
    /// field/value pair doesn't fit the target.
    pub fn stage(&mut self, target: Target, date: NaiveDate, field: Field, value: Value) -> bool {
        match (target, field, value) {
            (Target::RatePlan(id), Field::Rate, Value::Rate(rate)) => {
                self.rates.entry(id).or_default().insert(date, rate);
                true
            }
            (Target::RatePlan(id), field, value) => {
                let mut current = self.staged_restrictions(&id, date);
                if !current.set(field, value) {
                    return false;
                }
                self.restrictions.entry(id).or_default().insert(date, current);
                true
            }
            (Target::RoomType(id), Field::Availability, Value::Count(n)) => {
                self.availability.entry(id).or_default().insert(date, n);
                true
            }
            (Target::RoomType(_), _, _) => false,
        }
    }

    pub fn staged(&self, target: Target, date: NaiveDate, field: Field) -> Option<Value> {
        match target {
            Target::RatePlan(id) => self.staged_record(&id, date)?.get(field),
            Target::RoomType(id) if field == Field::Availability => {
                self.staged_availability(&id, date).map(Value::Count)
            }
            Target::RoomType(_) => None,
        }
    }

    pub fn staged_availability(&self, room_type_id: &EntityId, date: NaiveDate) -> Option<u32> {
        self.availability.get(room_type_id)?.get(&date).copied()
    }

    fn staged_restrictions(&self, rate_plan_id: &EntityId, date: NaiveDate) -> Restrictions {
        self.restrictions
            .get(rate_plan_id)
            .and_then(|plane| plane.get(&date))
            .copied()
            .unwrap_or_default()
    }

    /// The staged fields of one rate plan × date, as a sparse record.
    pub fn staged_record(&self, rate_plan_id: &EntityId, date: NaiveDate) -> Option<AriRecord> {
        let rate = self.rates.get(rate_plan_id).and_then(|p| p.get(&date)).copied();
        let restrictions = self.staged_restrictions(rate_plan_id, date);
        let record = AriRecord { rate, restrictions };
        (!record.is_empty()).then_some(record)
    }

    /// Every staged rate plan × date, in id then date order.
    pub fn rate_plan_patches(&self) -> BTreeMap<(EntityId, NaiveDate), AriRecord> {
        let mut patches: BTreeMap<(EntityId, NaiveDate), AriRecord> = BTreeMap::new();
        for (id, plane) in &self.rates {
            for (date, rate) in plane {
                patches.entry((*id, *date)).or_default().rate = Some(*rate);
            }
        }
        for (id, plane) in &self.restrictions {
            for (date, restrictions) in plane {
                patches.entry((*id, *date)).or_default().restrictions = *restrictions;
            }
        }
        patches
    }

    /// Every staged room type × date availability, in id then date order.
    pub fn room_type_patches(&self) -> BTreeMap<(EntityId, NaiveDate), u32> {
        self.availability
            .iter()
            .flat_map(|(id, plane)| plane.iter().map(move |(date, n)| ((*id, *date), *n)))
            .collect()
    }

    // ── Selection ───────────────────────────────────────────────

    pub fn select_day(&mut self, date: NaiveDate) -> bool {
        self.selected_days.insert(date)
    }

    pub fn deselect_day(&mut self, date: NaiveDate) -> bool {
        self.selected_days.remove(&date)
    }

    pub fn clear_selection(&mut self) {
        self.selected_days.clear();
    }

    pub fn selected_days(&self) -> &BTreeSet<NaiveDate> {
        &self.selected_days
    }

    // ── Lifecycle ───────────────────────────────────────────────

    /// Drop every staged value, keep the selection.
    pub fn clear_staged(&mut self) {
        self.rates.clear();
        self.availability.clear();
        self.restrictions.clear();
    }

    pub fn clear(&mut self) {
        self.clear_staged();
        self.selected_days.clear();
    }

    /// Remove entries whose value is still what `committed` held. Entries
    /// edited again since `committed` was taken stay staged.
    pub fn discard_committed(&mut self, committed: &Draft) {
        discard_matching(&mut self.rates, &committed.rates);
        discard_matching(&mut self.availability, &committed.availability);
        discard_matching(&mut self.restrictions, &committed.restrictions);
    }

    pub fn to_record(&self, date_range_key: String) -> PersistedDraft {
        PersistedDraft {
            date_range_key,
            rates: self.rates.clone(),
            availability: self.availability.clone(),
            restrictions: self.restrictions.clone(),
            selected_days: self.selected_days.clone(),
        }
    }

    pub fn from_record(record: PersistedDraft) -> Self {
        let mut draft = Self {
            rates: record.rates,
            availability: record.availability,
            restrictions: record.restrictions,
            selected_days: record.selected_days,
        };
        draft.restrictions.retain(|_, plane| {
            plane.retain(|_, r| !r.is_empty());
            !plane.is_empty()
        });
        draft.rates.retain(|_, plane| !plane.is_empty());
        draft.availability.retain(|_, plane| !plane.is_empty());
        draft
    }
}

fn discard_matching<T: PartialEq>(
    staged: &mut HashMap<EntityId, DatePlane<T>>,
    committed: &HashMap<EntityId, DatePlane<T>>,
) {
    staged.retain(|id, plane| {
        if let Some(done) = committed.get(id) {
            plane.retain(|date, value| done.get(date) != Some(value));
        }
        !plane.is_empty()
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn new_draft_is_clean() {
        let draft = Draft::default();
        assert_eq!(draft.state(), DraftState::Clean);
        assert_eq!(
            draft.staged(Target::RatePlan(Ulid::new()), d("2025-06-01"), Field::Rate),
            None
        );
    }

    #[test]
    fn stage_marks_dirty_and_overwrites() {
        let plan = Target::RatePlan(Ulid::new());
        let date = d("2025-06-01");
        let mut draft = Draft::default();
        assert!(draft.stage(plan, date, Field::Rate, Value::Rate(Decimal::from(100))));
        assert!(draft.is_dirty());
        assert!(draft.stage(plan, date, Field::Rate, Value::Rate(Decimal::from(120))));
        assert_eq!(draft.staged(plan, date, Field::Rate), Some(Value::Rate(Decimal::from(120))));
    }

    #[test]
    fn stage_same_value_twice_is_idempotent() {
        let plan = Target::RatePlan(Ulid::new());
        let date = d("2025-06-01");
        let mut once = Draft::default();
        once.stage(plan, date, Field::MinStay, Value::Count(2));
        let mut twice = once.clone();
        twice.stage(plan, date, Field::MinStay, Value::Count(2));
        assert_eq!(once, twice);
    }

    #[test]
    fn room_type_accepts_only_availability() {
        let room = Target::RoomType(Ulid::new());
        let date = d("2025-06-01");
        let mut draft = Draft::default();
        assert!(!draft.stage(room, date, Field::StopSell, Value::Flag(true)));
        assert!(!draft.stage(room, date, Field::Availability, Value::Flag(true)));
        assert!(!draft.is_dirty());
        assert!(draft.stage(room, date, Field::Availability, Value::Count(4)));
        assert_eq!(draft.staged(room, date, Field::Availability), Some(Value::Count(4)));
    }

    #[test]
    fn patches_merge_rate_and_restrictions() {
        let id = Ulid::new();
        let plan = Target::RatePlan(id);
        let date = d("2025-06-01");
        let mut draft = Draft::default();
        draft.stage(plan, date, Field::Rate, Value::Rate(Decimal::from(80)));
        draft.stage(plan, date, Field::StopSell, Value::Flag(true));
        draft.stage(plan, d("2025-06-02"), Field::MaxStay, Value::Count(7));

        let patches = draft.rate_plan_patches();
        assert_eq!(patches.len(), 2);
        let first = patches[&(id, date)];
        assert_eq!(first.rate, Some(Decimal::from(80)));
        assert_eq!(first.restrictions.stop_sell, Some(true));
        assert_eq!(patches[&(id, d("2025-06-02"))].restrictions.max_stay, Some(7));
    }

    #[test]
    fn discard_committed_keeps_newer_edits() {
        let plan = Target::RatePlan(Ulid::new());
        let mut draft = Draft::default();
        draft.stage(plan, d("2025-06-01"), Field::Rate, Value::Rate(Decimal::from(100)));
        draft.stage(plan, d("2025-06-02"), Field::Rate, Value::Rate(Decimal::from(100)));
        let committed = draft.clone();

        // Edited again while the save was in flight.
        draft.stage(plan, d("2025-06-02"), Field::Rate, Value::Rate(Decimal::from(110)));
        draft.discard_committed(&committed);

        assert_eq!(draft.staged(plan, d("2025-06-01"), Field::Rate), None);
        assert_eq!(
            draft.staged(plan, d("2025-06-02"), Field::Rate),
            Some(Value::Rate(Decimal::from(110)))
        );

        let again = draft.clone();
        draft.discard_committed(&again);
        assert_eq!(draft.state(), DraftState::Clean);
    }

    #[test]
    fn clear_staged_keeps_selection() {
        let mut draft = Draft::default();
        draft.select_day(d("2025-06-01"));
        draft.stage(Target::RoomType(Ulid::new()), d("2025-06-01"), Field::Availability, Value::Count(1));
        draft.clear_staged();
        assert!(!draft.is_dirty());
        assert_eq!(draft.selected_days().len(), 1);
        draft.clear();
        assert!(draft.selected_days().is_empty());
    }

    #[test]
    fn record_json_roundtrip() {
        let plan = Target::RatePlan(Ulid::new());
        let room = Target::RoomType(Ulid::new());
        let mut draft = Draft::default();
        draft.stage(plan, d("2025-06-01"), Field::Rate, Value::Rate(Decimal::new(12050, 2)));
        draft.stage(plan, d("2025-06-01"), Field::ClosedToArrival, Value::Flag(true));
        draft.stage(room, d("2025-06-03"), Field::Availability, Value::Count(0));
        draft.select_day(d("2025-06-05"));

        let json = serde_json::to_string(&draft.to_record("acme:2025-06-01:2025-06-14".into())).unwrap();
        assert!(json.contains("\"dateRangeKey\":\"acme:2025-06-01:2025-06-14\""));
        assert!(json.contains("\"selectedDays\":[\"2025-06-05\"]"));

        let record: PersistedDraft = serde_json::from_str(&json).unwrap();
        assert_eq!(Draft::from_record(record), draft);
    }
}
