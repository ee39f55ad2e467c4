//! Execution lifecycle API helpers.

use crate::error::EngineError;
use crate::model::{AnswerRecord, Execution};
use reqwest::Client;
use serde::Serialize;

/// Create request body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateExecutionReq<'a> {
    template_id: &'a str,
    unit_id: &'a str,
    executor_id: &'a str,
}

/// Create the server-side execution record and return it.
pub async fn create_execution(
    http: &Client,
    base_url: &str,
    token: &str,
    template_id: &str,
    unit_id: &str,
    executor_id: &str,
) -> Result<Execution, EngineError> {
    let url = format!("{base_url}/executions");
    let body = CreateExecutionReq {
        template_id,
        unit_id,
        executor_id,
    };
    http.post(url)
        .bearer_auth(token)
        .json(&body)
        .send()
        .await
        .map_err(EngineError::from_http)?
        .error_for_status()
        .map_err(EngineError::from_http)?
        .json::<Execution>()
        .await
        .map_err(EngineError::from_http)
}

/// Batch answer write request body.
#[derive(Debug, Serialize)]
struct SaveAnswersReq<'a> {
    answers: &'a [AnswerRecord],
}

/// Persist the answered questions in one call.
pub async fn save_answers(
    http: &Client,
    base_url: &str,
    token: &str,
    execution_id: &str,
    answers: &[AnswerRecord],
) -> Result<(), EngineError> {
    let url = format!(
        "{base_url}/executions/{}/answers",
        urlencoding::encode(execution_id)
    );
    http.post(url)
        .bearer_auth(token)
        .json(&SaveAnswersReq { answers })
        .send()
        .await
        .map_err(EngineError::from_http)?
        .error_for_status()
        .map_err(EngineError::from_http)?;
    Ok(())
}

/// Completion request body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CompleteExecutionReq<'a> {
    general_observations: &'a str,
    has_non_conformities: bool,
}

/// Mark the execution completed and return the final record.
pub async fn complete_execution(
    http: &Client,
    base_url: &str,
    token: &str,
    execution_id: &str,
    observations: &str,
    has_non_conformities: bool,
) -> Result<Execution, EngineError> {
    let url = format!(
        "{base_url}/executions/{}/complete",
        urlencoding::encode(execution_id)
    );
    let body = CompleteExecutionReq {
        general_observations: observations,
        has_non_conformities,
    };
    http.post(url)
        .bearer_auth(token)
        .json(&body)
        .send()
        .await
        .map_err(EngineError::from_http)?
        .error_for_status()
        .map_err(EngineError::from_http)?
        .json::<Execution>()
        .await
        .map_err(EngineError::from_http)
}
