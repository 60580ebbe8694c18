//! The LLM collaborator contract (spec §6, "LLM contract").
//!
//! Every extraction/classification stage that needs a model call depends on
//! this trait rather than any concrete provider SDK, matching the teacher's
//! pattern of routing all model access through a narrow `async_trait`
//! boundary (`event_bus::bus` sits in front of provider calls the same way).
//! Timeouts are the collaborator's concern (spec §5: "Each LLM call has its
//! own collaborator-provided timeout; on failure the stage logs and
//! continues with empty results — no retries at the stage level").

use async_trait::async_trait;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum LlmError {
    #[error("llm request timed out after {millis}ms")]
    #[diagnostic(code(folio_enrich::llm::timeout))]
    Timeout { millis: u64 },

    #[error("llm provider error: {message}")]
    #[diagnostic(code(folio_enrich::llm::provider))]
    Provider { message: String },

    #[error("llm returned a response that did not conform to the requested schema: {message}")]
    #[diagnostic(code(folio_enrich::llm::schema))]
    SchemaMismatch { message: String },
}

pub type Result<T> = std::result::Result<T, LlmError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

/// Metadata describing a model a provider can serve (spec §6: `list_models()
/// -> list[ModelInfo]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub context_window: Option<u32>,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;

    async fn chat(&self, messages: &[ChatMessage]) -> Result<String>;

    /// Request a JSON object conforming to `schema` (a JSON-Schema-shaped
    /// descriptor). Implementations wrapping a provider that returns
    /// markdown-fenced JSON are expected to strip the fence before parsing
    /// (spec §6).
    async fn structured(&self, prompt: &str, schema: &Value) -> Result<Value>;

    async fn test_connection(&self) -> bool;

    async fn list_models(&self) -> Result<Vec<ModelInfo>>;
}

/// A no-op client used in tests and as a safe default when no provider is
/// configured. Every call succeeds with empty/placeholder output rather
/// than erroring, so pipelines degrade to ruler-only/regex-only behavior
/// instead of failing outright (spec §5 tolerance policy).
#[derive(Debug, Default, Clone)]
pub struct NullLlm;

#[async_trait]
impl LlmClient for NullLlm {
    async fn complete(&self, _prompt: &str) -> Result<String> {
        Ok(String::new())
    }

    async fn chat(&self, _messages: &[ChatMessage]) -> Result<String> {
        Ok(String::new())
    }

    async fn structured(&self, _prompt: &str, _schema: &Value) -> Result<Value> {
        Ok(Value::Object(serde_json::Map::new()))
    }

    async fn test_connection(&self) -> bool {
        true
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        Ok(Vec::new())
    }
}

/// A client whose every call returns [`LlmError::Provider`], used to
/// exercise the per-stage LLM-failure tolerance the orchestrator promises
/// (spec §7: "LLM failures... swallowed by their stage; results default to
/// empty... The pipeline still completes").
#[derive(Debug, Default, Clone)]
pub struct FailingLlm;

#[async_trait]
impl LlmClient for FailingLlm {
    async fn complete(&self, _prompt: &str) -> Result<String> {
        Err(LlmError::Provider { message: "simulated provider outage".into() })
    }

    async fn chat(&self, _messages: &[ChatMessage]) -> Result<String> {
        Err(LlmError::Provider { message: "simulated provider outage".into() })
    }

    async fn structured(&self, _prompt: &str, _schema: &Value) -> Result<Value> {
        Err(LlmError::Provider { message: "simulated provider outage".into() })
    }

    async fn test_connection(&self) -> bool {
        false
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        Err(LlmError::Provider { message: "simulated provider outage".into() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_llm_never_errors() {
        let llm = NullLlm;
        assert!(llm.complete("hello").await.unwrap().is_empty());
        assert!(llm.test_connection().await);
        assert!(llm.list_models().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failing_llm_errors_on_every_call() {
        let llm = FailingLlm;
        assert!(llm.complete("hello").await.is_err());
        assert!(llm.chat(&[]).await.is_err());
        assert!(llm.structured("hello", &Value::Null).await.is_err());
        assert!(!llm.test_connection().await);
        assert!(llm.list_models().await.is_err());
    }
}
