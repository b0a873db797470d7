//! Record store collaborator.
//!
//! Every operation takes the caller's [`Session`] and only ever sees rows
//! owned by `session.user_id`, mirroring the backend's row-level policy.
//! Records come back newest-first.

pub mod memory;
pub mod postgres;

use std::future::Future;
use std::time::Instant;

use opentelemetry::KeyValue;

use crate::auth::Session;
use crate::error::Result;
use crate::model::{ActivityAction, ActivityLogEntry, ChatLogEntry, FieldRecord, NewFieldRecord, RecordId};
use crate::telemetry::metrics;

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub trait RecordStore: Send + Sync {
    /// Validate and insert a record owned by the session's user.
    fn insert_record(
        &self,
        session: &Session,
        new: NewFieldRecord,
    ) -> impl Future<Output = Result<FieldRecord>> + Send;

    /// The session's records, newest-first. `None` means no limit.
    fn list_records(
        &self,
        session: &Session,
        limit: Option<i64>,
    ) -> impl Future<Output = Result<Vec<FieldRecord>>> + Send;

    /// Delete one of the session's records.
    ///
    /// Fails with `NotFound` if the record is absent or owned by someone else.
    fn delete_record(
        &self,
        session: &Session,
        id: RecordId,
    ) -> impl Future<Output = Result<()>> + Send;

    fn count_records(&self, session: &Session) -> impl Future<Output = Result<i64>> + Send;

    fn append_activity(
        &self,
        session: &Session,
        action: ActivityAction,
        details: &str,
    ) -> impl Future<Output = Result<ActivityLogEntry>> + Send;

    /// Most recent activity first.
    fn list_activity(
        &self,
        session: &Session,
        limit: i64,
    ) -> impl Future<Output = Result<Vec<ActivityLogEntry>>> + Send;

    fn append_chat_log(
        &self,
        session: &Session,
        message: &str,
        response: &str,
    ) -> impl Future<Output = Result<ChatLogEntry>> + Send;

    /// Most recent exchange first.
    fn list_chat_log(
        &self,
        session: &Session,
        limit: i64,
    ) -> impl Future<Output = Result<Vec<ChatLogEntry>>> + Send;
}

/// Write counter plus duration, shared by every backend.
pub(crate) fn record_write(operation: &'static str, ok: bool, started: Instant) {
    metrics::record_writes().add(
        1,
        &[
            KeyValue::new("operation", operation),
            KeyValue::new("result", if ok { "ok" } else { "error" }),
        ],
    );
    metrics::operation_duration_ms().record(
        started.elapsed().as_secs_f64() * 1000.0,
        &[KeyValue::new("operation", operation)],
    );
}
