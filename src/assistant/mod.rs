//! Assistant response resolution.
//!
//! Each request takes one of two paths, chosen per call:
//! - delegated: the configured [`LanguageModel`] answers;
//! - fallback: no model is configured, or the model call failed, and the
//!   message is classified against the keyword [`rules`].
//!
//! Delegation failures never reach the caller. The only errors are for
//! malformed requests.

pub mod rules;

use std::time::Instant;

use opentelemetry::KeyValue;
use serde::Serialize;
use tracing::{Instrument, debug, warn};

use crate::config::GeminiConfig;
use crate::error::{Error, Result};
use crate::llm::{GeminiClient, LanguageModel, build_prompt};
use crate::model::UserId;
use crate::telemetry::{genai, metrics};

pub use rules::{Rule, Topic, classify};

/// A chat submission.
#[derive(Debug, Clone)]
pub struct AssistantRequest {
    pub user_id: Option<UserId>,
    pub message: String,
}

impl AssistantRequest {
    pub fn new(user_id: UserId, message: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id),
            message: message.into(),
        }
    }

    fn validate(&self) -> Result<UserId> {
        let user_id = self
            .user_id
            .ok_or_else(|| Error::AssistantRequest("missing user id".to_string()))?;
        if self.message.trim().is_empty() {
            return Err(Error::AssistantRequest("message is empty".to_string()));
        }
        Ok(user_id)
    }
}

/// Which path produced a reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "path", rename_all = "snake_case")]
pub enum ReplySource {
    Delegated { model: String },
    Fallback { topic: Topic, reason: FallbackReason },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FallbackReason {
    /// No model configured.
    Unconfigured,
    /// The model call failed; carries the failure description.
    DelegationFailed(String),
}

/// The assistant's answer to one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reply {
    pub text: String,
    pub source: ReplySource,
}

impl Reply {
    pub fn is_fallback(&self) -> bool {
        matches!(self.source, ReplySource::Fallback { .. })
    }
}

/// Resolves chat messages to replies. Holds no conversation state.
#[derive(Debug, Clone)]
pub struct Assistant<M = GeminiClient> {
    model: Option<M>,
}

impl Assistant<GeminiClient> {
    /// An assistant that only ever uses the keyword fallback.
    pub fn fallback_only() -> Self {
        Self { model: None }
    }

    /// Delegate to Gemini when an API key is configured, else fall back.
    pub fn from_config(config: &GeminiConfig) -> Result<Self> {
        Ok(Self {
            model: GeminiClient::from_config(config)?,
        })
    }
}

impl<M: LanguageModel> Assistant<M> {
    pub fn new(model: Option<M>) -> Self {
        Self { model }
    }

    pub fn with_model(model: M) -> Self {
        Self { model: Some(model) }
    }

    pub fn is_delegating(&self) -> bool {
        self.model.is_some()
    }

    /// Produce a reply for `request`.
    ///
    /// # Errors
    /// Returns [`Error::AssistantRequest`] if the request has no user id or
    /// a blank message. Never fails otherwise.
    pub async fn resolve(&self, request: &AssistantRequest) -> Result<Reply> {
        let user_id = request.validate()?;
        let started = Instant::now();

        let reply = match &self.model {
            None => fallback(&request.message, FallbackReason::Unconfigured),
            Some(model) => match delegate(model, &request.message).await {
                Ok(text) => Reply {
                    text,
                    source: ReplySource::Delegated {
                        model: model.model_name().to_string(),
                    },
                },
                Err(reason) => {
                    warn!(%user_id, error = %reason, "assistant delegation failed, using fallback");
                    fallback(&request.message, FallbackReason::DelegationFailed(reason))
                }
            },
        };

        let (source, topic) = match &reply.source {
            ReplySource::Delegated { .. } => ("delegated", "none"),
            ReplySource::Fallback { topic, .. } => ("fallback", topic.as_str()),
        };
        metrics::assistant_replies().add(
            1,
            &[KeyValue::new("source", source), KeyValue::new("topic", topic)],
        );
        metrics::operation_duration_ms().record(
            started.elapsed().as_secs_f64() * 1000.0,
            &[KeyValue::new("operation", "assistant_resolve")],
        );
        debug!(%user_id, source, topic, "assistant reply resolved");

        Ok(reply)
    }
}

/// Run the delegated call under a GenAI span. Errors come back as text.
async fn delegate<M: LanguageModel>(model: &M, message: &str) -> std::result::Result<String, String> {
    let span = genai::start_chat_span(
        model.model_name(),
        model.provider(),
        model.generation(),
    );
    let prompt = build_prompt(message);
    let result = model.generate(&prompt).instrument(span.clone()).await;
    match result {
        Ok(completion) => {
            if let (Some(input), Some(output)) = (completion.input_tokens, completion.output_tokens) {
                genai::record_token_usage(&span, input, output);
                metrics::llm_tokens().add(
                    input,
                    &[
                        KeyValue::new("model", model.model_name().to_string()),
                        KeyValue::new("direction", "input"),
                    ],
                );
                metrics::llm_tokens().add(
                    output,
                    &[
                        KeyValue::new("model", model.model_name().to_string()),
                        KeyValue::new("direction", "output"),
                    ],
                );
            }
            Ok(completion.text)
        }
        Err(e) => Err(e.to_string()),
    }
}

fn fallback(message: &str, reason: FallbackReason) -> Reply {
    let rule = classify(message);
    Reply {
        text: rule.response.to_string(),
        source: ReplySource::Fallback {
            topic: rule.topic,
            reason,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{Completion, DelegationError};
    use std::sync::Mutex;

    /// Scripted model: returns a canned outcome and remembers the prompt.
    struct ScriptedModel {
        outcome: fn() -> std::result::Result<Completion, DelegationError>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        fn new(outcome: fn() -> std::result::Result<Completion, DelegationError>) -> Self {
            Self {
                outcome,
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    impl LanguageModel for ScriptedModel {
        fn model_name(&self) -> &str {
            "scripted"
        }

        fn provider(&self) -> &str {
            "test"
        }

        async fn generate(&self, prompt: &str) -> std::result::Result<Completion, DelegationError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            (self.outcome)()
        }
    }

    fn answered() -> std::result::Result<Completion, DelegationError> {
        Ok(Completion {
            text: "Check the probe depth.".to_string(),
            input_tokens: Some(12),
            output_tokens: Some(5),
        })
    }

    fn server_error() -> std::result::Result<Completion, DelegationError> {
        Err(DelegationError::Status {
            status: 503,
            body: "overloaded".to_string(),
        })
    }

    #[tokio::test]
    async fn unconfigured_assistant_falls_back() {
        let reply = Assistant::fallback_only()
            .resolve(&AssistantRequest::new(UserId::new(), "What's the ideal soil pH?"))
            .await
            .unwrap();
        assert_eq!(
            reply.source,
            ReplySource::Fallback {
                topic: Topic::Soil,
                reason: FallbackReason::Unconfigured
            }
        );
    }

    #[tokio::test]
    async fn delegated_reply_uses_model_text_and_prompt() {
        let assistant = Assistant::with_model(ScriptedModel::new(answered));
        let reply = assistant
            .resolve(&AssistantRequest::new(UserId::new(), "Probe reads 40C?"))
            .await
            .unwrap();
        assert_eq!(reply.text, "Check the probe depth.");
        assert!(!reply.is_fallback());

        let model = assistant.model.as_ref().unwrap();
        let prompts = model.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0], build_prompt("Probe reads 40C?"));
    }

    #[tokio::test]
    async fn delegation_failure_matches_unconfigured_text() {
        let failing = Assistant::with_model(ScriptedModel::new(server_error));
        let request = AssistantRequest::new(UserId::new(), "temperature check");

        let degraded = failing.resolve(&request).await.unwrap();
        let offline = Assistant::fallback_only().resolve(&request).await.unwrap();

        assert_eq!(degraded.text, offline.text);
        assert!(matches!(
            degraded.source,
            ReplySource::Fallback {
                topic: Topic::Temperature,
                reason: FallbackReason::DelegationFailed(_)
            }
        ));
    }

    #[tokio::test]
    async fn blank_message_is_rejected() {
        let err = Assistant::fallback_only()
            .resolve(&AssistantRequest::new(UserId::new(), "  \n"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AssistantRequest(_)));
    }

    #[tokio::test]
    async fn missing_user_is_rejected() {
        let request = AssistantRequest {
            user_id: None,
            message: "hello".to_string(),
        };
        let err = Assistant::fallback_only().resolve(&request).await.unwrap_err();
        assert!(matches!(err, Error::AssistantRequest(_)));
    }
}
