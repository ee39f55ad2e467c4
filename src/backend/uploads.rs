//! Photo byte upload API helper.

use crate::error::EngineError;
use reqwest::Client;
use uuid::Uuid;

/// Upload one photo into an execution and return its remote URL.
///
/// Metadata and bytes travel in one multipart request.
pub async fn upload_photo(
    http: &Client,
    base_url: &str,
    token: &str,
    execution_id: &str,
    photo_id: Uuid,
    question_id: Option<&str>,
    bytes: Vec<u8>,
) -> Result<String, EngineError> {
    let meta = serde_json::json!({
        "photoId": photo_id,
        "questionId": question_id,
    });

    let form = reqwest::multipart::Form::new()
        .part(
            "metadata",
            reqwest::multipart::Part::text(meta.to_string())
                .mime_str("application/json; charset=UTF-8")
                .map_err(EngineError::from_http)?,
        )
        .part(
            "file",
            reqwest::multipart::Part::bytes(bytes)
                .file_name(format!("{photo_id}.jpg"))
                .mime_str("image/jpeg")
                .map_err(EngineError::from_http)?,
        );

    let url = format!(
        "{base_url}/executions/{}/photos",
        urlencoding::encode(execution_id)
    );
    let v = http
        .post(url)
        .bearer_auth(token)
        .multipart(form)
        .send()
        .await
        .map_err(EngineError::from_http)?
        .error_for_status()
        .map_err(EngineError::from_http)?
        .json::<serde_json::Value>()
        .await
        .map_err(EngineError::from_http)?;

    v["url"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| EngineError::ExecutionFailed {
            message: "no url in upload response".into(),
        })
}
