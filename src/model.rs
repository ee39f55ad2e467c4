//! Core data model for checklist executions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Kind of checklist a template defines.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateKind {
    Opening,
    Supervision,
}

/// Immutable definition of an inspection form.
///
/// Fetched read-only from the backend; the engine never mutates it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: String,
    pub name: String,
    pub kind: TemplateKind,
    pub is_default: bool,
    pub active: bool,
}

/// One question within a template, stable for the whole session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    pub template_id: String,
    /// Position within the form; the controller orders questions by it.
    pub order_index: u32,
    pub text: String,
    pub required: bool,
    /// Answering No demands a non-empty observation when set.
    pub observation_required_on_no: bool,
}

/// One answer keyed by question identity.
///
/// `value` is tri-state: `None` means unanswered, which is also what an
/// absent map entry means.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    #[serde(rename = "answer")]
    pub value: Option<bool>,
    #[serde(default)]
    pub observation: String,
}

/// Upload lifecycle state of one photo.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhotoStatus {
    Pending,
    Uploading,
    Uploaded,
    Failed,
}

/// A photo attached to the execution, optionally bound to one question.
///
/// `question_id` of `None` marks a general photo for the whole execution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    pub id: Uuid,
    pub question_id: Option<String>,
    /// Where the captured bytes live on this device.
    pub local_uri: String,
    pub status: PhotoStatus,
    /// Set once the upload is confirmed by the backend.
    pub remote_url: Option<String>,
}

impl Photo {
    /// Create a pending photo for a freshly captured or picked image.
    pub fn new(local_uri: impl Into<String>, question_id: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            question_id,
            local_uri: local_uri.into(),
            status: PhotoStatus::Pending,
            remote_url: None,
        }
    }
}

/// Serializable snapshot of one in-progress execution.
///
/// One draft exists per (template, unit) pair; it is overwritten on every
/// autosave and deleted on successful submission or explicit discard.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    pub template_id: String,
    pub unit_id: String,
    pub answers: HashMap<String, Answer>,
    #[serde(default)]
    pub general_observations: String,
    #[serde(default)]
    pub photos: Vec<Photo>,
    pub started_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
}

/// Completion state of a server-side execution record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    InProgress,
    Completed,
}

/// Server-side execution record.
///
/// The engine creates it, writes answers into it and finalizes it; it never
/// reads it back for validation purposes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Execution {
    pub id: String,
    pub template_id: String,
    pub unit_id: String,
    pub executor_id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: ExecutionStatus,
    #[serde(default)]
    pub general_observations: String,
    /// Any question answered No in the completed execution.
    pub has_non_conformities: bool,
}

/// Wire shape for one saved answer; only answered questions are ever sent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRecord {
    pub question_id: String,
    pub answer: bool,
    #[serde(default)]
    pub observation: String,
}
