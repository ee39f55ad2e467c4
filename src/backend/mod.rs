//! Remote backend gateway and HTTP client plumbing.

/// Execution lifecycle endpoints.
pub mod executions;
/// HTTP implementation of the gateway.
pub mod http;
/// Template and question endpoints.
pub mod templates;
/// Photo byte upload endpoint.
pub mod uploads;

pub use http::HttpGateway;

use crate::error::EngineError;
use crate::model::{AnswerRecord, Execution, Question, Template};
use async_trait::async_trait;
use uuid::Uuid;

/// Narrow interface to the managed backend.
///
/// Every call is a remote operation that may fail; the engine surfaces the
/// failure and never retries on its own.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    /// Resolve the opening template for a unit: the unit-specific binding
    /// first, then the default-flagged template. `None` when neither exists.
    async fn fetch_opening_template_for_unit(
        &self,
        unit_id: &str,
    ) -> Result<Option<Template>, EngineError>;

    /// Questions belonging to a template.
    async fn fetch_questions(&self, template_id: &str) -> Result<Vec<Question>, EngineError>;

    /// Create the server-side execution record.
    async fn create_execution(
        &self,
        template_id: &str,
        unit_id: &str,
        executor_id: &str,
    ) -> Result<Execution, EngineError>;

    /// Persist the answered questions.
    async fn save_answers(
        &self,
        execution_id: &str,
        answers: &[AnswerRecord],
    ) -> Result<(), EngineError>;

    /// Mark the execution completed.
    async fn complete_execution(
        &self,
        execution_id: &str,
        observations: &str,
        has_non_conformities: bool,
    ) -> Result<Execution, EngineError>;

    /// Upload one photo's bytes and return its remote URL.
    async fn upload_photo(
        &self,
        execution_id: &str,
        photo_id: Uuid,
        question_id: Option<&str>,
        bytes: Vec<u8>,
    ) -> Result<String, EngineError>;
}
