//! Per-session orchestration of records, exports, dashboard, and chat.
//!
//! The collector owns the session's in-memory record collection
//! (newest-first) and its conversation. Store failures leave both
//! untouched.

use chrono::NaiveDate;
use opentelemetry::KeyValue;
use tracing::{info, warn};

use crate::assistant::{Assistant, AssistantRequest, Reply};
use crate::auth::Session;
use crate::dashboard::{DashboardSummary, RECENT_WINDOW, RecentWindow, aggregate};
use crate::error::Result;
use crate::export::{self, ExportFormat};
use crate::filter::{FilterCriteria, filter};
use crate::llm::LanguageModel;
use crate::model::{ActivityAction, ChatMessage, FieldRecord, NewFieldRecord, RecordId};
use crate::store::RecordStore;
use crate::telemetry::metrics;

/// How many records `refresh` loads.
pub const DEFAULT_FETCH_LIMIT: i64 = 1000;

/// A rendered export and the file name to offer it under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    pub file_name: String,
    pub format: ExportFormat,
    pub body: String,
    pub record_count: usize,
}

pub struct Collector<S, M> {
    session: Session,
    store: S,
    assistant: Assistant<M>,
    records: Vec<FieldRecord>,
    conversation: Vec<ChatMessage>,
    fetch_limit: i64,
}

impl<S: RecordStore, M: LanguageModel> Collector<S, M> {
    pub fn new(session: Session, store: S, assistant: Assistant<M>) -> Self {
        Self {
            session,
            store,
            assistant,
            records: Vec::new(),
            conversation: Vec::new(),
            fetch_limit: DEFAULT_FETCH_LIMIT,
        }
    }

    pub fn with_fetch_limit(mut self, limit: i64) -> Self {
        self.fetch_limit = limit;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Loaded records, newest-first.
    pub fn records(&self) -> &[FieldRecord] {
        &self.records
    }

    /// The session's conversation, oldest turn first.
    pub fn conversation(&self) -> &[ChatMessage] {
        &self.conversation
    }

    /// Reload records from the store.
    pub async fn refresh(&mut self) -> Result<&[FieldRecord]> {
        let records = self
            .store
            .list_records(&self.session, Some(self.fetch_limit))
            .await?;
        self.records = records;
        Ok(&self.records)
    }

    /// Validate and store a new record, then log the entry.
    pub async fn submit(&mut self, new: NewFieldRecord) -> Result<FieldRecord> {
        let new = new.validate()?;
        let record = self.store.insert_record(&self.session, new).await?;

        // Keep newest-first: a back-dated record goes after newer ones.
        let at = self
            .records
            .iter()
            .position(|r| r.timestamp <= record.timestamp)
            .unwrap_or(self.records.len());
        self.records.insert(at, record.clone());

        self.log_activity(
            ActivityAction::DataEntry,
            &format!(
                "Added {}: {} at {}",
                record.field, record.value, record.location
            ),
        )
        .await;
        info!(id = %record.id, field = %record.field, "record submitted");
        Ok(record)
    }

    /// Delete a record. Local state only changes once the store confirms.
    pub async fn delete(&mut self, id: RecordId) -> Result<()> {
        self.store.delete_record(&self.session, id).await?;

        let removed = self
            .records
            .iter()
            .position(|r| r.id == id)
            .map(|i| self.records.remove(i));
        let details = match removed {
            Some(r) => format!("Deleted {}: {} at {}", r.field, r.value, r.location),
            None => format!("Deleted record {id}"),
        };
        self.log_activity(ActivityAction::DataDelete, &details).await;
        info!(%id, "record deleted");
        Ok(())
    }

    /// Loaded records matching `criteria`.
    pub fn visible(&self, criteria: &FilterCriteria) -> Result<Vec<FieldRecord>> {
        filter(&self.records, criteria)
    }

    /// Render the visible records for download, dated `date`.
    pub async fn export(
        &self,
        criteria: &FilterCriteria,
        format: ExportFormat,
        date: NaiveDate,
    ) -> Result<Export> {
        let visible = self.visible(criteria)?;
        let body = export::serialize(&visible, format)?;
        let export = Export {
            file_name: export::export_file_name(format, date),
            format,
            body,
            record_count: visible.len(),
        };

        metrics::exports().add(1, &[KeyValue::new("format", format.extension())]);
        self.log_activity(
            ActivityAction::DataExport,
            &format!(
                "Exported {} record(s) as {}",
                export.record_count, export.file_name
            ),
        )
        .await;
        Ok(export)
    }

    /// Total count from the store plus a summary of the recent window.
    ///
    /// Uses loaded records when present, otherwise queries the store.
    pub async fn dashboard(&self, limit: usize) -> Result<DashboardSummary> {
        let total_records = self.store.count_records(&self.session).await?;
        let recent = if self.records.is_empty() {
            self.store
                .list_records(&self.session, Some(RECENT_WINDOW as i64))
                .await?
        } else {
            self.records.iter().take(RECENT_WINDOW).cloned().collect()
        };
        let window = RecentWindow::newest_first(recent)?;
        Ok(DashboardSummary {
            total_records,
            fields: aggregate(&window, limit),
        })
    }

    /// Ask the assistant, record both turns, and persist the exchange.
    ///
    /// The reply is returned even if persisting it fails.
    pub async fn chat(&mut self, message: &str) -> Result<Reply> {
        let request = AssistantRequest::new(self.session.user_id, message);
        let reply = self.assistant.resolve(&request).await?;

        self.conversation.push(ChatMessage::from_user(message));
        self.conversation.push(ChatMessage::from_assistant(&reply.text));

        if let Err(e) = self
            .store
            .append_chat_log(&self.session, message, &reply.text)
            .await
        {
            warn!(error = %e, "failed to persist chat exchange");
        }
        Ok(reply)
    }

    /// Audit entries are best effort; a failed append is only logged.
    async fn log_activity(&self, action: ActivityAction, details: &str) {
        match self
            .store
            .append_activity(&self.session, action, details)
            .await
        {
            Ok(_) => {}
            Err(e) => warn!(%action, error = %e, "failed to append activity log entry"),
        }
    }
}
