//! # Persistence Gateway
//!
//! The [`RecordStore`] trait is the only way the conversation controller
//! touches storage. Every operation is scoped by owner.

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::dates::month_bounds;
use crate::models::{hours_in_range, ExtractedActivity, StoredSession, TimeRecord};

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert all activities for one submission atomically.
    ///
    /// Returns the inserted rows with generated identifiers and timestamps,
    /// in submission order. If any row fails, nothing is written.
    async fn insert_batch(
        &self,
        owner: i64,
        date: NaiveDate,
        activities: &[ExtractedActivity],
        raw_text: Option<&str>,
    ) -> Result<Vec<TimeRecord>>;

    /// Records of one day, ordered by creation time
    async fn records_on(&self, owner: i64, date: NaiveDate) -> Result<Vec<TimeRecord>>;

    /// Records in an inclusive date range, ordered by (date, creation time)
    async fn records_between(&self, owner: i64, from: NaiveDate, to: NaiveDate) -> Result<Vec<TimeRecord>>;

    /// Records of one calendar month, ordered by (date, creation time)
    async fn records_in_month(&self, owner: i64, year: i32, month: u32) -> Result<Vec<TimeRecord>> {
        match month_bounds(month, year) {
            Some((from, to)) => self.records_between(owner, from, to).await,
            None => bail!("invalid month {month}/{year}"),
        }
    }

    /// Delete a record if it belongs to `owner`. Returns whether a row was removed.
    async fn delete_record(&self, id: Uuid, owner: i64) -> Result<bool>;

    async fn save_session(&self, session: &StoredSession) -> Result<()>;

    async fn load_session(&self, owner: i64) -> Result<Option<StoredSession>>;

    async fn clear_session(&self, owner: i64) -> Result<()>;

    /// Cheap connectivity check for readiness probes
    async fn ping(&self) -> Result<()>;
}

/// In-process store with the same constraints as the SQL schema
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<TimeRecord>>,
    sessions: Mutex<HashMap<i64, StoredSession>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total rows across all owners
    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn select<F>(&self, filter: F) -> Result<Vec<TimeRecord>>
    where
        F: Fn(&TimeRecord) -> bool,
    {
        let records = self.records.lock().map_err(|_| anyhow::anyhow!("record lock poisoned"))?;
        let mut selected: Vec<TimeRecord> = records.iter().filter(|r| filter(r)).cloned().collect();
        selected.sort_by(|a, b| (a.date, a.created_at).cmp(&(b.date, b.created_at)));
        Ok(selected)
    }
}

fn check_row(activity: &ExtractedActivity) -> Result<()> {
    if activity.description.trim().is_empty() {
        bail!("description must not be empty");
    }
    if activity.project.trim().is_empty() {
        bail!("project must not be empty");
    }
    if !hours_in_range(activity.hours) {
        bail!("hours {} violate the (0, 24] constraint", activity.hours);
    }
    Ok(())
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn insert_batch(
        &self,
        owner: i64,
        date: NaiveDate,
        activities: &[ExtractedActivity],
        raw_text: Option<&str>,
    ) -> Result<Vec<TimeRecord>> {
        // Validate everything before touching the table
        for activity in activities {
            check_row(activity)?;
        }

        let now = Utc::now();
        let inserted: Vec<TimeRecord> = activities
            .iter()
            .map(|a| TimeRecord::from_activity(owner, date, a, raw_text, now))
            .collect();

        let mut records = self.records.lock().map_err(|_| anyhow::anyhow!("record lock poisoned"))?;
        records.extend(inserted.iter().cloned());

        info!(user_id = owner, count = inserted.len(), %date, "Time records created");
        Ok(inserted)
    }

    async fn records_on(&self, owner: i64, date: NaiveDate) -> Result<Vec<TimeRecord>> {
        self.select(|r| r.owner == owner && r.date == date)
    }

    async fn records_between(&self, owner: i64, from: NaiveDate, to: NaiveDate) -> Result<Vec<TimeRecord>> {
        self.select(|r| r.owner == owner && r.date >= from && r.date <= to)
    }

    async fn delete_record(&self, id: Uuid, owner: i64) -> Result<bool> {
        let mut records = self.records.lock().map_err(|_| anyhow::anyhow!("record lock poisoned"))?;
        let before = records.len();
        records.retain(|r| !(r.id == id && r.owner == owner));
        Ok(records.len() < before)
    }

    async fn save_session(&self, session: &StoredSession) -> Result<()> {
        let mut sessions = self.sessions.lock().map_err(|_| anyhow::anyhow!("session lock poisoned"))?;
        sessions.insert(session.owner, session.clone());
        Ok(())
    }

    async fn load_session(&self, owner: i64) -> Result<Option<StoredSession>> {
        let sessions = self.sessions.lock().map_err(|_| anyhow::anyhow!("session lock poisoned"))?;
        Ok(sessions.get(&owner).cloned())
    }

    async fn clear_session(&self, owner: i64) -> Result<()> {
        let mut sessions = self.sessions.lock().map_err(|_| anyhow::anyhow!("session lock poisoned"))?;
        sessions.remove(&owner);
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
