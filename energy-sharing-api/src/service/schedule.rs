use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::domain::{ScheduleEntry, SharingKeyStatus};
use crate::error::{ApiError, ApiResult};

/// A stretch of time during which one schedule entry's key applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleSegment {
    pub entry_id: Uuid,
    pub key_id: Uuid,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ScheduleSegment {
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

/// Temporal assignment of allocation keys to one sharing operation.
///
/// Entries form an append-only log ordered by `sequence`. Only `end_date`
/// and `status` change once an entry is written, except for a proposal being
/// promoted to approved. The open approved entry is tracked as an index so
/// the hot query never scans the log.
///
/// Invariant: at most one entry is `Approved` with no `end_date`.
///
/// The schedule performs no I/O. Callers load it, apply one operation and
/// persist the returned entry inside a transaction scoped to the operation.
#[derive(Debug, Clone)]
pub struct SharingKeySchedule {
    sharing_operation_id: Uuid,
    entries: Vec<ScheduleEntry>,
    open_approved: Option<usize>,
}

impl SharingKeySchedule {
    pub fn new(sharing_operation_id: Uuid) -> Self {
        Self {
            sharing_operation_id,
            entries: Vec::new(),
            open_approved: None,
        }
    }

    /// Rebuilds a schedule from stored entries, in any order.
    pub fn from_entries(sharing_operation_id: Uuid, mut entries: Vec<ScheduleEntry>) -> ApiResult<Self> {
        if let Some(foreign) = entries
            .iter()
            .find(|entry| entry.sharing_operation_id != sharing_operation_id)
        {
            return Err(ApiError::InternalError(format!(
                "Schedule entry {} belongs to sharing operation {}, not {sharing_operation_id}",
                foreign.id, foreign.sharing_operation_id
            )));
        }
        entries.sort_by_key(|entry| entry.sequence);

        let open_approved_count = entries.iter().filter(|entry| entry.is_open_approved()).count();
        if open_approved_count > 1 {
            tracing::warn!(
                %sharing_operation_id,
                open_approved_count,
                "Several open approved entries stored; the most recent one is treated as active"
            );
        }

        let mut schedule = Self {
            sharing_operation_id,
            entries,
            open_approved: None,
        };
        schedule.refresh_open_approved();
        Ok(schedule)
    }

    pub fn sharing_operation_id(&self) -> Uuid {
        self.sharing_operation_id
    }

    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<ScheduleEntry> {
        self.entries
    }

    /// The currently active approved entry, if any.
    pub fn active_approved_key(&self) -> Option<&ScheduleEntry> {
        self.open_approved.map(|index| &self.entries[index])
    }

    /// The entry whose key applied at `instant`. Later entries win ties.
    pub fn entry_active_at(&self, instant: DateTime<Utc>) -> Option<&ScheduleEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.has_applied() && entry.covers(instant))
            .max_by_key(|entry| entry.sequence)
    }

    /// True while any proposed or approved entry still references the key.
    pub fn references_key(&self, key_id: Uuid) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.key_id == key_id && entry.status != SharingKeyStatus::Closed)
    }

    /// Proposes `key_id` from `start_date` on.
    ///
    /// Fails with `Conflict` when `start_date` lies before the latest boundary
    /// already fixed in the schedule: the end of the last closed entry or the
    /// start of the active approved one.
    pub fn add_key_to_sharing(&mut self, key_id: Uuid, start_date: DateTime<Utc>) -> ApiResult<ScheduleEntry> {
        if let Some(boundary) = self.latest_boundary() {
            if start_date < boundary {
                return Err(ApiError::Conflict(format!(
                    "Start date {start_date} precedes the schedule boundary {boundary}"
                )));
            }
        }

        let entry = self.new_entry(key_id, start_date, SharingKeyStatus::Proposed);
        self.entries.push(entry.clone());
        Ok(entry)
    }

    /// Closes the active approved entry at `prev_end_date`.
    pub fn close_active_approved_key(&mut self, prev_end_date: DateTime<Utc>) -> ApiResult<ScheduleEntry> {
        let index = self.open_approved.ok_or_else(|| {
            ApiError::NotFound(format!(
                "No active approved key for sharing operation {}",
                self.sharing_operation_id
            ))
        })?;
        self.close_at(index, prev_end_date)
    }

    /// Closes the open approved entry of a specific key at `prev_end_date`.
    ///
    /// Entries of the key that are already closed, or only proposed, cannot
    /// be closed and yield `Conflict`.
    pub fn close_specific_key_entry(
        &mut self,
        key_id: Uuid,
        prev_end_date: DateTime<Utc>,
    ) -> ApiResult<ScheduleEntry> {
        if !self.entries.iter().any(|entry| entry.key_id == key_id) {
            return Err(ApiError::NotFound(format!(
                "Key {key_id} is not scheduled in sharing operation {}",
                self.sharing_operation_id
            )));
        }

        let index = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.key_id == key_id && entry.is_open_approved())
            .max_by_key(|(_, entry)| entry.sequence)
            .map(|(index, _)| index)
            .ok_or_else(|| {
                ApiError::Conflict(format!(
                    "Key {key_id} has no open approved entry to close"
                ))
            })?;
        self.close_at(index, prev_end_date)
    }

    /// Writes an entry with an explicit status.
    ///
    /// `Approved` promotes the latest open proposal of the key, or appends a
    /// new approved entry when there is none (seeding history). It requires
    /// that no approved entry is open and that `new_start_date` does not
    /// precede the last closed entry's end. `Proposed` behaves like
    /// [`Self::add_key_to_sharing`].
    pub fn add_sharing_key_entry(
        &mut self,
        key_id: Uuid,
        new_start_date: DateTime<Utc>,
        status: SharingKeyStatus,
    ) -> ApiResult<ScheduleEntry> {
        match status {
            SharingKeyStatus::Proposed => return self.add_key_to_sharing(key_id, new_start_date),
            SharingKeyStatus::Closed => {
                return Err(ApiError::ValidationError(
                    "A schedule entry cannot be written as CLOSED; close the open entry instead".to_string(),
                ))
            }
            SharingKeyStatus::Approved => {}
        }

        if let Some(active) = self.active_approved_key() {
            return Err(ApiError::Conflict(format!(
                "Key {} is still approved and open since {}; close it first",
                active.key_id, active.start_date
            )));
        }
        if let Some(closed_end) = self.latest_closed_end() {
            if new_start_date < closed_end {
                return Err(ApiError::Conflict(format!(
                    "Start date {new_start_date} precedes the previous close at {closed_end}"
                )));
            }
        }

        let proposal = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| {
                entry.key_id == key_id && entry.is_open() && entry.status == SharingKeyStatus::Proposed
            })
            .max_by_key(|(_, entry)| entry.sequence)
            .map(|(index, _)| index);

        let entry = match proposal {
            Some(index) => {
                let sequence = self.next_sequence();
                let mut promoted = self.entries.remove(index);
                promoted.status = SharingKeyStatus::Approved;
                promoted.start_date = new_start_date;
                promoted.sequence = sequence;
                promoted
            }
            None => self.new_entry(key_id, new_start_date, SharingKeyStatus::Approved),
        };

        self.entries.push(entry.clone());
        self.open_approved = Some(self.entries.len() - 1);
        Ok(entry)
    }

    /// Drops the latest open proposal of `key_id`. Proposals never become
    /// closed entries; they simply disappear.
    pub fn discard_proposed_key(&mut self, key_id: Uuid) -> ApiResult<ScheduleEntry> {
        let index = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.key_id == key_id && entry.status == SharingKeyStatus::Proposed)
            .max_by_key(|(_, entry)| entry.sequence)
            .map(|(index, _)| index)
            .ok_or_else(|| ApiError::NotFound(format!("Key {key_id} has no pending proposal")))?;

        let removed = self.entries.remove(index);
        self.refresh_open_approved();
        Ok(removed)
    }

    /// Splits `[period_start, period_end)` into the stretches covered by each
    /// applied entry.
    ///
    /// Fails with `ScheduleGap` naming the first uncovered stretch.
    pub fn coverage(
        &self,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
    ) -> ApiResult<Vec<ScheduleSegment>> {
        if period_start >= period_end {
            return Err(ApiError::ValidationError(format!(
                "Period start {period_start} must precede period end {period_end}"
            )));
        }

        let applied: Vec<&ScheduleEntry> = self.entries.iter().filter(|entry| entry.has_applied()).collect();

        let mut boundaries = vec![period_start, period_end];
        for entry in &applied {
            boundaries.push(entry.start_date);
            if let Some(end) = entry.end_date {
                boundaries.push(end);
            }
        }
        boundaries.retain(|instant| *instant >= period_start && *instant <= period_end);
        boundaries.sort();
        boundaries.dedup();

        let mut segments: Vec<ScheduleSegment> = Vec::new();
        let mut gap: Option<(DateTime<Utc>, DateTime<Utc>)> = None;
        for window in boundaries.windows(2) {
            let (start, end) = (window[0], window[1]);
            let winner = applied
                .iter()
                .filter(|entry| entry.covers(start))
                .max_by_key(|entry| entry.sequence);

            match winner {
                None => {
                    gap = match gap {
                        Some((from, to)) if to == start => Some((from, end)),
                        Some(first) => Some(first),
                        None => Some((start, end)),
                    };
                }
                Some(entry) => {
                    if gap.is_some() {
                        break;
                    }
                    match segments.last_mut() {
                        Some(last) if last.entry_id == entry.id && last.end == start => last.end = end,
                        _ => segments.push(ScheduleSegment {
                            entry_id: entry.id,
                            key_id: entry.key_id,
                            start,
                            end,
                        }),
                    }
                }
            }
        }

        match gap {
            Some((from, to)) => Err(ApiError::ScheduleGap { from, to }),
            None => Ok(segments),
        }
    }

    fn close_at(&mut self, index: usize, prev_end_date: DateTime<Utc>) -> ApiResult<ScheduleEntry> {
        let entry = &mut self.entries[index];
        if prev_end_date < entry.start_date {
            return Err(ApiError::ValidationError(format!(
                "End date {prev_end_date} precedes the entry start {}",
                entry.start_date
            )));
        }

        entry.end_date = Some(prev_end_date);
        entry.status = SharingKeyStatus::Closed;
        let closed = entry.clone();
        self.refresh_open_approved();
        Ok(closed)
    }

    fn refresh_open_approved(&mut self) {
        self.open_approved = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.is_open_approved())
            .max_by_key(|(_, entry)| entry.sequence)
            .map(|(index, _)| index);
    }

    fn latest_closed_end(&self) -> Option<DateTime<Utc>> {
        self.entries
            .iter()
            .filter(|entry| entry.status == SharingKeyStatus::Closed)
            .filter_map(|entry| entry.end_date)
            .max()
    }

    fn latest_boundary(&self) -> Option<DateTime<Utc>> {
        let active_start = self.active_approved_key().map(|entry| entry.start_date);
        match (self.latest_closed_end(), active_start) {
            (Some(closed), Some(active)) => Some(closed.max(active)),
            (closed, active) => closed.or(active),
        }
    }

    fn next_sequence(&self) -> i64 {
        self.entries.iter().map(|entry| entry.sequence).max().unwrap_or(0) + 1
    }

    fn new_entry(&self, key_id: Uuid, start_date: DateTime<Utc>, status: SharingKeyStatus) -> ScheduleEntry {
        ScheduleEntry {
            id: Uuid::new_v4(),
            sequence: self.next_sequence(),
            sharing_operation_id: self.sharing_operation_id,
            key_id,
            start_date,
            end_date: None,
            status,
        }
    }
}
