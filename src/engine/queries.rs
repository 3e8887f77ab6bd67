use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::model::*;

use super::derive;
use super::{Draft, DraftState, Engine};

impl Engine {
    /// Authoritative value from the grid, or `None`.
    pub async fn get(&self, entity_id: EntityId, date: NaiveDate, field: Field) -> Option<Value> {
        self.grid.snapshot().await.get(&entity_id, date, field)
    }

    /// What the calendar shows: the staged value if there is one, otherwise
    /// the grid. Room-type availability falls back through derivation. A
    /// staged rate of zero or below counts as unset.
    pub async fn effective(
        &self,
        entity_id: EntityId,
        date: NaiveDate,
        field: Field,
    ) -> Option<Value> {
        let catalog = self.catalog().await;
        let target = catalog.target(&entity_id)?;
        let grid = self.grid.snapshot().await;
        let session = self.session.read().await;
        match session.draft.staged(target, date, field) {
            Some(Value::Rate(rate)) if positive_rate(rate).is_none() => {}
            Some(staged) => return Some(staged),
            None => {}
        }
        match (target, field) {
            (Target::RoomType(id), Field::Availability) => {
                derive::room_type_availability(&grid, &catalog, &id, date).map(Value::Count)
            }
            _ => grid.get(&entity_id, date, field),
        }
    }

    /// Room-type availability from the grid, with the rate-plan fallback.
    pub async fn room_type_availability(
        &self,
        room_type_id: EntityId,
        date: NaiveDate,
    ) -> Option<u32> {
        let catalog = self.catalog().await;
        let grid = self.grid.snapshot().await;
        derive::room_type_availability(&grid, &catalog, &room_type_id, date)
    }

    pub async fn effective_room_type_availability(
        &self,
        room_type_id: EntityId,
        date: NaiveDate,
    ) -> Option<u32> {
        let catalog = self.catalog().await;
        let grid = self.grid.snapshot().await;
        let session = self.session.read().await;
        derive::effective_room_type_availability(&grid, &session.draft, &catalog, &room_type_id, date)
    }

    pub async fn draft_state(&self) -> DraftState {
        self.session.read().await.draft.state()
    }

    pub async fn draft(&self) -> Draft {
        self.session.read().await.draft.clone()
    }

    pub async fn selected_days(&self) -> BTreeSet<NaiveDate> {
        self.session.read().await.draft.selected_days().clone()
    }

    /// Days of the active range, ascending. Empty before a range is active.
    pub async fn dates(&self) -> Vec<NaiveDate> {
        self.active_range()
            .await
            .map(|range| range.dates())
            .unwrap_or_default()
    }
}
