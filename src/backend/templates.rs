//! Template and question API helpers.

use crate::error::EngineError;
use crate::model::{Question, Template};
use reqwest::Client;
use serde::Deserialize;

/// List response for template queries.
#[derive(Debug, Deserialize)]
struct TemplateListResp {
    templates: Vec<Template>,
}

/// List response for question queries.
#[derive(Debug, Deserialize)]
struct QuestionListResp {
    questions: Vec<Question>,
}

/// Fetch the active opening template bound to a unit, if any.
pub async fn fetch_unit_template(
    http: &Client,
    base_url: &str,
    token: &str,
    unit_id: &str,
) -> Result<Option<Template>, EngineError> {
    let url = format!(
        "{base_url}/checklist-templates?unit={}&kind=opening&active=true",
        urlencoding::encode(unit_id)
    );
    let resp = http
        .get(url)
        .bearer_auth(token)
        .send()
        .await
        .map_err(EngineError::from_http)?
        .error_for_status()
        .map_err(EngineError::from_http)?
        .json::<TemplateListResp>()
        .await
        .map_err(EngineError::from_http)?;

    Ok(resp.templates.into_iter().next())
}

/// Fetch the default-flagged active opening template, if any.
pub async fn fetch_default_template(
    http: &Client,
    base_url: &str,
    token: &str,
) -> Result<Option<Template>, EngineError> {
    let url = format!("{base_url}/checklist-templates?kind=opening&default=true&active=true");
    let resp = http
        .get(url)
        .bearer_auth(token)
        .send()
        .await
        .map_err(EngineError::from_http)?
        .error_for_status()
        .map_err(EngineError::from_http)?
        .json::<TemplateListResp>()
        .await
        .map_err(EngineError::from_http)?;

    Ok(resp.templates.into_iter().next())
}

/// Fetch a template's questions.
pub async fn fetch_questions(
    http: &Client,
    base_url: &str,
    token: &str,
    template_id: &str,
) -> Result<Vec<Question>, EngineError> {
    let url = format!(
        "{base_url}/checklist-templates/{}/questions",
        urlencoding::encode(template_id)
    );
    let resp = http
        .get(url)
        .bearer_auth(token)
        .send()
        .await
        .map_err(EngineError::from_http)?
        .error_for_status()
        .map_err(EngineError::from_http)?
        .json::<QuestionListResp>()
        .await
        .map_err(EngineError::from_http)?;

    Ok(resp.questions)
}
