use chrono::NaiveDate;

use crate::catalog::Catalog;
use crate::model::EntityId;

use super::draft::Draft;
use super::grid::AriGrid;

// ── Room-type availability fallback ───────────────────────────────

/// Availability of a room type on `date`.
///
/// 1. An explicit room-type value is the source of truth.
/// 2. Otherwise the first rate plan, in position order, that has an
///    availability for the date supplies it. Plans are never averaged.
/// 3. Otherwise `None`.
pub fn room_type_availability(
    grid: &AriGrid,
    catalog: &Catalog,
    room_type_id: &EntityId,
    date: NaiveDate,
) -> Option<u32> {
    if let Some(explicit) = grid.room_type_value(room_type_id, date) {
        return Some(explicit);
    }
    catalog
        .rate_plans_of(room_type_id)
        .iter()
        .find_map(|plan| grid.record(&plan.id, date)?.restrictions.availability)
}

/// Same as [`room_type_availability`], but a value staged in the draft wins.
pub fn effective_room_type_availability(
    grid: &AriGrid,
    draft: &Draft,
    catalog: &Catalog,
    room_type_id: &EntityId,
    date: NaiveDate,
) -> Option<u32> {
    draft
        .staged_availability(room_type_id, date)
        .or_else(|| room_type_availability(grid, catalog, room_type_id, date))
}
