//! HTTP implementation of the remote gateway.

use super::{RemoteGateway, executions, templates, uploads};
use crate::config::BackendCfg;
use crate::error::EngineError;
use crate::model::{AnswerRecord, Execution, Question, Template};
use async_trait::async_trait;
use reqwest::Client;
use uuid::Uuid;

/// Gateway speaking to the backend REST API.
pub struct HttpGateway {
    /// Shared HTTP client for all API calls.
    http: Client,
    base_url: String,
    token: String,
}

impl HttpGateway {
    /// Build a gateway from backend configuration.
    pub fn new(cfg: &BackendCfg) -> Self {
        Self {
            http: Client::new(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            token: cfg.api_token.clone(),
        }
    }
}

#[async_trait]
impl RemoteGateway for HttpGateway {
    async fn fetch_opening_template_for_unit(
        &self,
        unit_id: &str,
    ) -> Result<Option<Template>, EngineError> {
        // The unit-specific binding wins over the default template.
        if let Some(template) =
            templates::fetch_unit_template(&self.http, &self.base_url, &self.token, unit_id)
                .await?
        {
            return Ok(Some(template));
        }
        templates::fetch_default_template(&self.http, &self.base_url, &self.token).await
    }

    async fn fetch_questions(&self, template_id: &str) -> Result<Vec<Question>, EngineError> {
        templates::fetch_questions(&self.http, &self.base_url, &self.token, template_id).await
    }

    async fn create_execution(
        &self,
        template_id: &str,
        unit_id: &str,
        executor_id: &str,
    ) -> Result<Execution, EngineError> {
        executions::create_execution(
            &self.http,
            &self.base_url,
            &self.token,
            template_id,
            unit_id,
            executor_id,
        )
        .await
    }

    async fn save_answers(
        &self,
        execution_id: &str,
        answers: &[AnswerRecord],
    ) -> Result<(), EngineError> {
        executions::save_answers(&self.http, &self.base_url, &self.token, execution_id, answers)
            .await
    }

    async fn complete_execution(
        &self,
        execution_id: &str,
        observations: &str,
        has_non_conformities: bool,
    ) -> Result<Execution, EngineError> {
        executions::complete_execution(
            &self.http,
            &self.base_url,
            &self.token,
            execution_id,
            observations,
            has_non_conformities,
        )
        .await
    }

    async fn upload_photo(
        &self,
        execution_id: &str,
        photo_id: Uuid,
        question_id: Option<&str>,
        bytes: Vec<u8>,
    ) -> Result<String, EngineError> {
        uploads::upload_photo(
            &self.http,
            &self.base_url,
            &self.token,
            execution_id,
            photo_id,
            question_id,
            bytes,
        )
        .await
    }
}
