//! In-process record store for tests and local runs.

use std::time::Instant;

use chrono::Utc;
use opentelemetry::KeyValue;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{RecordStore, record_write};
use crate::auth::Session;
use crate::error::{Error, Result};
use crate::model::{
    ActivityAction, ActivityLogEntry, ChatLogEntry, FieldRecord, NewFieldRecord, RecordId,
};
use crate::telemetry::metrics;

#[derive(Default)]
struct Tables {
    /// Insertion order; queries sort newest-first.
    records: Vec<FieldRecord>,
    activity: Vec<ActivityLogEntry>,
    chat: Vec<ChatLogEntry>,
}

/// Owner-scoped store held entirely in memory.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Newest-first, latest-inserted first on equal timestamps.
fn newest_first<T: Clone>(rows: &[T], keep: impl Fn(&T) -> bool, limit: Option<i64>) -> Vec<T>
where
    T: HasTimestamp,
{
    let mut out: Vec<T> = rows.iter().rev().filter(|r| keep(r)).cloned().collect();
    out.sort_by(|a, b| b.timestamp().cmp(&a.timestamp()));
    if let Some(limit) = limit {
        out.truncate(usize::try_from(limit.max(0)).unwrap_or(usize::MAX));
    }
    out
}

trait HasTimestamp {
    fn timestamp(&self) -> chrono::DateTime<Utc>;
}

impl HasTimestamp for FieldRecord {
    fn timestamp(&self) -> chrono::DateTime<Utc> {
        self.timestamp
    }
}

impl HasTimestamp for ActivityLogEntry {
    fn timestamp(&self) -> chrono::DateTime<Utc> {
        self.timestamp
    }
}

impl HasTimestamp for ChatLogEntry {
    fn timestamp(&self) -> chrono::DateTime<Utc> {
        self.timestamp
    }
}

impl RecordStore for MemoryStore {
    async fn insert_record(&self, session: &Session, new: NewFieldRecord) -> Result<FieldRecord> {
        let record = new.validate()?.into_record(session.user_id, Utc::now());
        let started = Instant::now();
        self.tables.write().await.records.push(record.clone());
        record_write("insert", true, started);
        Ok(record)
    }

    async fn list_records(&self, session: &Session, limit: Option<i64>) -> Result<Vec<FieldRecord>> {
        let tables = self.tables.read().await;
        Ok(newest_first(
            &tables.records,
            |r| r.owner == session.user_id,
            limit,
        ))
    }

    async fn delete_record(&self, session: &Session, id: RecordId) -> Result<()> {
        let started = Instant::now();
        let mut tables = self.tables.write().await;
        let position = tables
            .records
            .iter()
            .position(|r| r.id == id && r.owner == session.user_id);
        record_write("delete", position.is_some(), started);
        let position = position.ok_or_else(|| Error::NotFound(id.to_string()))?;
        tables.records.remove(position);
        Ok(())
    }

    async fn count_records(&self, session: &Session) -> Result<i64> {
        let tables = self.tables.read().await;
        let count = tables
            .records
            .iter()
            .filter(|r| r.owner == session.user_id)
            .count();
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }

    async fn append_activity(
        &self,
        session: &Session,
        action: ActivityAction,
        details: &str,
    ) -> Result<ActivityLogEntry> {
        let entry = ActivityLogEntry {
            id: Uuid::new_v4(),
            user_id: session.user_id,
            action,
            details: details.to_string(),
            timestamp: Utc::now(),
        };
        self.tables.write().await.activity.push(entry.clone());
        metrics::activity_entries().add(1, &[KeyValue::new("action", action.as_str())]);
        Ok(entry)
    }

    async fn list_activity(&self, session: &Session, limit: i64) -> Result<Vec<ActivityLogEntry>> {
        let tables = self.tables.read().await;
        Ok(newest_first(
            &tables.activity,
            |e| e.user_id == session.user_id,
            Some(limit),
        ))
    }

    async fn append_chat_log(
        &self,
        session: &Session,
        message: &str,
        response: &str,
    ) -> Result<ChatLogEntry> {
        let entry = ChatLogEntry {
            id: Uuid::new_v4(),
            user_id: session.user_id,
            message: message.to_string(),
            response: response.to_string(),
            timestamp: Utc::now(),
        };
        self.tables.write().await.chat.push(entry.clone());
        Ok(entry)
    }

    async fn list_chat_log(&self, session: &Session, limit: i64) -> Result<Vec<ChatLogEntry>> {
        let tables = self.tables.read().await;
        Ok(newest_first(
            &tables.chat,
            |e| e.user_id == session.user_id,
            Some(limit),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UserId;
    use chrono::Duration;

    fn session() -> Session {
        Session::for_user(UserId::new(), "field@example.org")
    }

    #[tokio::test]
    async fn lists_newest_first_by_timestamp() {
        let store = MemoryStore::new();
        let s = session();
        let now = Utc::now();
        store
            .insert_record(&s, NewFieldRecord::new("Temp", "old", "A").timestamp(now - Duration::hours(2)))
            .await
            .unwrap();
        store
            .insert_record(&s, NewFieldRecord::new("Temp", "new", "A").timestamp(now))
            .await
            .unwrap();
        store
            .insert_record(&s, NewFieldRecord::new("Temp", "mid", "A").timestamp(now - Duration::hours(1)))
            .await
            .unwrap();

        let values: Vec<_> = store
            .list_records(&s, None)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.value)
            .collect();
        assert_eq!(values, vec!["new", "mid", "old"]);
        assert_eq!(store.list_records(&s, Some(1)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn rows_are_scoped_to_owner() {
        let store = MemoryStore::new();
        let alice = session();
        let bob = session();
        let record = store
            .insert_record(&alice, NewFieldRecord::new("Temp", "20", "A"))
            .await
            .unwrap();

        assert!(store.list_records(&bob, None).await.unwrap().is_empty());
        assert_eq!(store.count_records(&bob).await.unwrap(), 0);
        let err = store.delete_record(&bob, record.id).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert_eq!(store.count_records(&alice).await.unwrap(), 1);

        store.delete_record(&alice, record.id).await.unwrap();
        assert_eq!(store.count_records(&alice).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn invalid_record_is_not_stored() {
        let store = MemoryStore::new();
        let s = session();
        let err = store
            .insert_record(&s, NewFieldRecord::new("", "20", "A"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(store.count_records(&s).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn logs_are_append_only_and_scoped() {
        let store = MemoryStore::new();
        let s = session();
        store
            .append_activity(&s, ActivityAction::DataEntry, "first")
            .await
            .unwrap();
        store
            .append_chat_log(&s, "hello", "hi there")
            .await
            .unwrap();

        let activity = store.list_activity(&s, 10).await.unwrap();
        assert_eq!(activity.len(), 1);
        assert_eq!(activity[0].action, ActivityAction::DataEntry);
        assert!(store.list_activity(&session(), 10).await.unwrap().is_empty());

        let chat = store.list_chat_log(&s, 10).await.unwrap();
        assert_eq!(chat[0].response, "hi there");
    }
}
