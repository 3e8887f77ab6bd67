use chrono::{Days, NaiveDate};

use crate::engine::EngineError;
use crate::limits::MAX_RANGE_DAYS;
use crate::model::DateRange;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Previous,
    Next,
}

/// Every calendar day in `[start, end]`, ascending. Empty when `start > end`.
pub fn dates_between(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    if start > end {
        return Vec::new();
    }
    start.iter_days().take_while(|d| *d <= end).collect()
}

/// Build a range, rejecting inverted or oversized windows.
pub fn validate_range(start: NaiveDate, end: NaiveDate) -> Result<DateRange, EngineError> {
    if start > end {
        return Err(EngineError::InvalidRange { start, end });
    }
    let range = DateRange::new(start, end);
    if range.days() > MAX_RANGE_DAYS {
        return Err(EngineError::LimitExceeded("date range too wide"));
    }
    Ok(range)
}

impl DateRange {
    pub fn dates(&self) -> Vec<NaiveDate> {
        dates_between(self.start, self.end)
    }

    /// Move the window by its own length, keeping its size.
    pub fn shift(&self, direction: Direction) -> Result<DateRange, EngineError> {
        let step = Days::new(self.days() as u64);
        let moved = match direction {
            Direction::Previous => self
                .start
                .checked_sub_days(step)
                .zip(self.end.checked_sub_days(step)),
            Direction::Next => self
                .start
                .checked_add_days(step)
                .zip(self.end.checked_add_days(step)),
        };
        let (start, end) = moved.ok_or(EngineError::LimitExceeded("date out of range"))?;
        Ok(DateRange::new(start, end))
    }

    /// Storage key for drafts of this window: `tenant:YYYY-MM-DD:YYYY-MM-DD`.
    pub fn draft_key(&self, tenant: &str) -> String {
        format!("{tenant}:{}:{}", self.start, self.end)
    }
}
