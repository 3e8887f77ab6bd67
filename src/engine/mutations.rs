use chrono::NaiveDate;

use crate::model::*;

use super::{Engine, EngineError, LoadOutcome};

impl Engine {
    /// Check that `value` fits `field` and that the entity can carry it.
    async fn resolve_target(
        &self,
        entity_id: EntityId,
        field: Field,
        value: Value,
    ) -> Result<Target, EngineError> {
        if !value.fits(field) {
            return Err(EngineError::FieldMismatch { field, value });
        }
        let target = self
            .catalog()
            .await
            .target(&entity_id)
            .ok_or(EngineError::UnknownEntity(entity_id))?;
        if matches!(target, Target::RoomType(_)) && field != Field::Availability {
            return Err(EngineError::UnsupportedField {
                entity: entity_id,
                field,
            });
        }
        Ok(target)
    }

    /// Stage a value. Always overwrites what was staged for the same key.
    pub async fn set(
        &self,
        entity_id: EntityId,
        date: NaiveDate,
        field: Field,
        value: Value,
    ) -> Result<(), EngineError> {
        let target = self.resolve_target(entity_id, field, value).await?;
        let mut session = self.session.write().await;
        let range = session.range.ok_or(EngineError::NoActiveRange)?;
        if !range.contains(date) {
            return Err(EngineError::DateOutOfRange(date));
        }
        let was_dirty = session.draft.is_dirty();
        session.draft.stage(target, date, field, value);
        session.revision += 1;
        if !was_dirty {
            self.notify.send(EngineEvent::DraftChanged { dirty: true });
        }
        Ok(())
    }

    /// Stage one value on every selected day. Returns how many days it hit.
    pub async fn set_selected(
        &self,
        entity_id: EntityId,
        field: Field,
        value: Value,
    ) -> Result<usize, EngineError> {
        let target = self.resolve_target(entity_id, field, value).await?;
        let mut session = self.session.write().await;
        let range = session.range.ok_or(EngineError::NoActiveRange)?;
        let days: Vec<NaiveDate> = session
            .draft
            .selected_days()
            .iter()
            .copied()
            .filter(|d| range.contains(*d))
            .collect();
        if days.is_empty() {
            return Ok(0);
        }
        let was_dirty = session.draft.is_dirty();
        for date in &days {
            session.draft.stage(target, *date, field, value);
        }
        session.revision += 1;
        if !was_dirty {
            self.notify.send(EngineEvent::DraftChanged { dirty: true });
        }
        Ok(days.len())
    }

    pub async fn select_day(&self, date: NaiveDate) -> Result<bool, EngineError> {
        let mut session = self.session.write().await;
        let range = session.range.ok_or(EngineError::NoActiveRange)?;
        if !range.contains(date) {
            return Err(EngineError::DateOutOfRange(date));
        }
        let added = session.draft.select_day(date);
        if added {
            session.revision += 1;
        }
        Ok(added)
    }

    pub async fn deselect_day(&self, date: NaiveDate) -> bool {
        let mut session = self.session.write().await;
        let removed = session.draft.deselect_day(date);
        if removed {
            session.revision += 1;
        }
        removed
    }

    pub async fn clear_selection(&self) {
        let mut session = self.session.write().await;
        if !session.draft.selected_days().is_empty() {
            session.draft.clear_selection();
            session.revision += 1;
        }
    }

    /// Discard every staged value and the selection, drop the stored draft,
    /// and reload the grid so the view shows authoritative data again.
    pub async fn reset(&self) -> Result<LoadOutcome, EngineError> {
        {
            let mut session = self.session.write().await;
            let range = session.range.ok_or(EngineError::NoActiveRange)?;
            session.draft.clear();
            session.revision += 1;
            if self.write_draft(range, &session.draft) {
                session.persisted_revision = session.revision;
            }
        }
        self.notify.send(EngineEvent::DraftChanged { dirty: false });
        self.reload().await
    }
}
