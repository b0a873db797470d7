//! Dashboard aggregation over the most recent records.
//!
//! The recent window must be newest-first: `last_value` is the first value
//! seen per field. [`RecentWindow`] only exists in that order.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::FieldRecord;

/// How many recent records the dashboard looks at.
pub const RECENT_WINDOW: usize = 10;

/// Per-field summary of the recent window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSummary {
    pub field: String,
    pub count: usize,
    /// Value of the most recent record for this field.
    pub last_value: String,
}

/// Dashboard payload: total count from the store plus the recent summaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub total_records: i64,
    pub fields: Vec<FieldSummary>,
}

/// A bounded, newest-first slice of records.
#[derive(Debug, Clone, Default)]
pub struct RecentWindow {
    records: Vec<FieldRecord>,
}

impl RecentWindow {
    /// Accept records already ordered newest-first, keeping at most
    /// [`RECENT_WINDOW`] of them.
    ///
    /// # Errors
    /// Returns [`Error::Ordering`] if any record is newer than the one before it.
    pub fn newest_first(records: Vec<FieldRecord>) -> Result<Self> {
        Self::bounded(records, RECENT_WINDOW)
    }

    /// Like [`RecentWindow::newest_first`] with an explicit size.
    pub fn bounded(mut records: Vec<FieldRecord>, size: usize) -> Result<Self> {
        if let Some(pair) = records
            .windows(2)
            .find(|pair| pair[1].timestamp > pair[0].timestamp)
        {
            return Err(Error::Ordering(format!(
                "record {} ({}) follows older record {} ({})",
                pair[1].id, pair[1].timestamp, pair[0].id, pair[0].timestamp
            )));
        }
        records.truncate(size);
        Ok(Self { records })
    }

    /// Sort into newest-first order (stable on ties) and keep the first
    /// [`RECENT_WINDOW`].
    pub fn sort_newest_first(mut records: Vec<FieldRecord>) -> Self {
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        records.truncate(RECENT_WINDOW);
        Self { records }
    }

    pub fn records(&self) -> &[FieldRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Group the window by field name, in first-seen order, truncated to `limit`.
pub fn aggregate(window: &RecentWindow, limit: usize) -> Vec<FieldSummary> {
    let mut groups: Vec<FieldSummary> = Vec::new();
    for record in window.records() {
        match groups.iter_mut().find(|g| g.field == record.field) {
            Some(group) => group.count += 1,
            None => groups.push(FieldSummary {
                field: record.field.clone(),
                count: 1,
                last_value: record.value.clone(),
            }),
        }
    }
    groups.truncate(limit);
    groups
}
