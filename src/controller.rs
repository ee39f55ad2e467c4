//! Execution controller: single source of truth for one checklist session.

use crate::{
    autosave::Debouncer,
    backend::{HttpGateway, RemoteGateway},
    config::Config,
    drafts::DraftStore,
    error::EngineError,
    model::{Answer, AnswerRecord, Draft, Execution, Photo, Question, Template},
    photos::{PassthroughCompressor, PhotoEvent, PhotoManager},
    session::IdentityProvider,
    storage::FileStore,
    validation::{self, ValidationMessage, ValidationReport},
};
use chrono::{DateTime, Utc};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Notifications surfaced to the host while the session runs.
#[derive(Clone, Debug)]
pub enum EngineEvent {
    /// Photo lifecycle update.
    Photo(PhotoEvent),
    /// A background autosave completed.
    DraftSaved,
    /// A background autosave failed; the draft on disk is stale.
    DraftSaveFailed { message: String },
}

impl From<PhotoEvent> for EngineEvent {
    fn from(event: PhotoEvent) -> Self {
        Self::Photo(event)
    }
}

/// In-memory state for one checklist-filling session.
#[derive(Default)]
struct SessionState {
    unit_id: Option<String>,
    template: Option<Template>,
    questions: Vec<Question>,
    answers: HashMap<String, Answer>,
    general_observations: String,
    photos: Vec<Photo>,
    current_index: usize,
    errors: HashMap<String, ValidationMessage>,
    started_at: Option<DateTime<Utc>>,
    /// Id of the execution created by the last submit attempt.
    execution_id: Option<String>,
    draft_exists: bool,
    loading: bool,
    submitting: bool,
    last_save_error: Option<String>,
}

/// Read-only view of controller state for the presentation layer.
#[derive(Clone, Debug)]
pub struct ControllerSnapshot {
    pub loading: bool,
    pub submitting: bool,
    pub template_loaded: bool,
    pub question_count: usize,
    pub current_index: usize,
    pub draft_exists: bool,
    /// Whether the current answers would pass submission validation.
    pub is_valid: bool,
    /// Errors recorded by the last explicit `validate` call, minus those
    /// cleared by later answers.
    pub errors: HashMap<String, ValidationMessage>,
    /// Set while the latest background autosave has not succeeded.
    pub last_save_error: Option<String>,
}

/// Orchestrates template load, draft resume, answer mutations, debounced
/// autosave, validation, and submission for one active session.
///
/// All mutations are expected to arrive from one logical caller at a time;
/// the controller serializes nothing beyond the autosave debounce.
pub struct ExecutionController {
    gateway: Arc<dyn RemoteGateway>,
    drafts: Arc<DraftStore>,
    identity: Arc<dyn IdentityProvider>,
    photos: PhotoManager,
    autosave: Debouncer,
    events: mpsc::Sender<EngineEvent>,
    state: Arc<Mutex<SessionState>>,
}

impl ExecutionController {
    /// Build a controller and the event stream the host subscribes to.
    pub fn new(
        gateway: Arc<dyn RemoteGateway>,
        drafts: Arc<DraftStore>,
        identity: Arc<dyn IdentityProvider>,
        photos: PhotoManager,
        debounce_window: Duration,
    ) -> (Self, mpsc::Receiver<EngineEvent>) {
        let (tx, rx) = mpsc::channel(256);
        let controller = Self {
            gateway,
            drafts,
            identity,
            photos,
            autosave: Debouncer::new(debounce_window),
            events: tx,
            state: Arc::new(Mutex::new(SessionState::default())),
        };
        (controller, rx)
    }

    /// Build a controller wired straight from configuration: HTTP gateway,
    /// file-backed draft store, passthrough compressor.
    pub fn from_config(
        cfg: &Config,
        identity: Arc<dyn IdentityProvider>,
    ) -> (Self, mpsc::Receiver<EngineEvent>) {
        Self::new(
            Arc::new(HttpGateway::new(&cfg.backend)),
            Arc::new(DraftStore::new(Arc::new(FileStore::new(
                cfg.storage.drafts_path.clone(),
            )))),
            identity,
            PhotoManager::new(Arc::new(PassthroughCompressor)),
            Duration::from_millis(cfg.autosave.debounce_ms),
        )
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        lock_state(&self.state)
    }

    /// Resolve and load the opening checklist for `unit_id`.
    ///
    /// Replaces the whole session; any previous unit's state is gone. A
    /// template without questions is still loaded, and reported as
    /// [`EngineError::QuestionsNotFound`] so the host can show an empty
    /// state; the session stays usable.
    pub async fn load_template(&self, unit_id: &str) -> Result<(), EngineError> {
        self.lock().loading = true;
        let result = self.load_template_inner(unit_id).await;
        self.lock().loading = false;
        result
    }

    async fn load_template_inner(&self, unit_id: &str) -> Result<(), EngineError> {
        let template = self
            .gateway
            .fetch_opening_template_for_unit(unit_id)
            .await?
            .ok_or_else(|| EngineError::TemplateNotFound {
                unit_id: unit_id.to_string(),
            })?;

        let mut questions = self.gateway.fetch_questions(&template.id).await?;
        questions.sort_by_key(|q| q.order_index);

        let draft_exists = self.drafts.get(&template.id, unit_id).await.is_some();
        let template_id = template.id.clone();
        let no_questions = questions.is_empty();

        let mut s = self.lock();
        *s = SessionState {
            unit_id: Some(unit_id.to_string()),
            started_at: Some(Utc::now()),
            template: Some(template),
            questions,
            draft_exists,
            ..SessionState::default()
        };
        drop(s);

        if no_questions {
            // Soft failure: submission stays vacuously valid when nothing
            // is required.
            tracing::warn!("template {template_id} has no questions");
            return Err(EngineError::QuestionsNotFound { template_id });
        }
        Ok(())
    }

    /// Replace in-memory session data with the stored draft, if one exists.
    ///
    /// A draft load is all-or-nothing; partial merges never happen. Returns
    /// whether a draft was found.
    pub async fn load_draft(&self) -> Result<bool, EngineError> {
        let (template_id, unit_id) = self.session_key()?;

        let Some(draft) = self.drafts.get(&template_id, &unit_id).await else {
            self.lock().draft_exists = false;
            return Ok(false);
        };

        let mut s = self.lock();
        s.answers = draft.answers;
        s.general_observations = draft.general_observations;
        s.photos = draft.photos;
        s.started_at = Some(draft.started_at);
        s.errors.clear();
        s.draft_exists = true;
        Ok(true)
    }

    /// Set or overwrite a question's answer.
    ///
    /// Passing `None` for `observation` preserves the existing text. The
    /// question's recorded validation error is cleared here; the full
    /// report is re-derived on the next explicit `validate`.
    pub fn set_answer(&self, question_id: &str, value: Option<bool>, observation: Option<String>) {
        {
            let mut s = self.lock();
            if !s.questions.iter().any(|q| q.id == question_id) {
                tracing::warn!("ignoring answer for unknown question {question_id}");
                return;
            }
            let entry = s.answers.entry(question_id.to_string()).or_default();
            entry.value = value;
            if let Some(text) = observation {
                entry.observation = text;
            }
            s.errors.remove(question_id);
        }
        self.schedule_autosave();
    }

    /// Update a question's observation text, leaving its answer untouched.
    pub fn set_observation(&self, question_id: &str, text: impl Into<String>) {
        {
            let mut s = self.lock();
            if !s.questions.iter().any(|q| q.id == question_id) {
                tracing::warn!("ignoring observation for unknown question {question_id}");
                return;
            }
            s.answers.entry(question_id.to_string()).or_default().observation = text.into();
        }
        self.schedule_autosave();
    }

    /// Replace the execution-wide observations text.
    pub fn set_general_observations(&self, text: impl Into<String>) {
        self.lock().general_observations = text.into();
        self.schedule_autosave();
    }

    /// Attach a photo to the session.
    pub fn add_photo(&self, photo: Photo) {
        self.lock().photos.push(photo);
        self.schedule_autosave();
    }

    /// Detach a photo on explicit user request.
    pub fn remove_photo(&self, photo_id: Uuid) {
        self.lock().photos.retain(|p| p.id != photo_id);
        self.schedule_autosave();
    }

    /// Jump to a question; out-of-range indexes are silently ignored.
    pub fn go_to_question(&self, index: usize) {
        let mut s = self.lock();
        if index < s.questions.len() {
            s.current_index = index;
        }
    }

    /// Advance the cursor, stopping at the last question.
    pub fn next(&self) {
        let mut s = self.lock();
        if s.current_index + 1 < s.questions.len() {
            s.current_index += 1;
        }
    }

    /// Step the cursor back, stopping at the first question.
    pub fn previous(&self) {
        let mut s = self.lock();
        s.current_index = s.current_index.saturating_sub(1);
    }

    /// Re-derive the validation report and record per-question errors.
    ///
    /// Never mutates answers.
    pub fn validate(&self) -> ValidationReport {
        let mut s = self.lock();
        let report = validation::validate(&s.questions, &s.answers);
        s.errors = report.errors.clone();
        report
    }

    /// Persist the draft immediately, cancelling any pending debounce.
    pub async fn save_draft(&self) -> Result<(), EngineError> {
        self.autosave.cancel();
        let Some(mut draft) = snapshot_draft(&self.state) else {
            return Err(EngineError::Validation {
                message: "no template loaded".into(),
            });
        };
        self.drafts.save(&mut draft).await?;
        let mut s = self.lock();
        s.draft_exists = true;
        s.last_save_error = None;
        Ok(())
    }

    /// Validate and drive the full remote submission, then drop the draft.
    ///
    /// Remote failures leave the draft and in-memory answers untouched so
    /// the user can retry without losing anything.
    pub async fn submit(&self) -> Result<Execution, EngineError> {
        let (template_id, unit_id, executor_id) = {
            let mut s = self.lock();
            if s.submitting {
                return Err(EngineError::Validation {
                    message: "a submission is already in flight".into(),
                });
            }
            let template_id = s
                .template
                .as_ref()
                .ok_or_else(|| EngineError::Validation {
                    message: "no template loaded".into(),
                })?
                .id
                .clone();
            let unit_id = s.unit_id.clone().ok_or_else(|| EngineError::Validation {
                message: "no unit selected".into(),
            })?;
            let executor = self
                .identity
                .current()
                .ok_or_else(|| EngineError::Validation {
                    message: "no signed-in executor".into(),
                })?;

            let report = validation::validate(&s.questions, &s.answers);
            if !report.is_valid {
                s.errors = report.errors;
                return Err(EngineError::Validation {
                    message: "checklist has unresolved validation errors".into(),
                });
            }

            s.submitting = true;
            (template_id, unit_id, executor.executor_id)
        };

        let result = self
            .submit_inner(&template_id, &unit_id, &executor_id)
            .await;
        self.lock().submitting = false;
        result
    }

    async fn submit_inner(
        &self,
        template_id: &str,
        unit_id: &str,
        executor_id: &str,
    ) -> Result<Execution, EngineError> {
        let execution = self
            .gateway
            .create_execution(template_id, unit_id, executor_id)
            .await?;
        self.lock().execution_id = Some(execution.id.clone());

        // Unanswered questions are never sent.
        let (records, general_observations, has_non_conformities) = {
            let s = self.lock();
            let records: Vec<AnswerRecord> = s
                .answers
                .iter()
                .filter_map(|(question_id, a)| {
                    a.value.map(|answer| AnswerRecord {
                        question_id: question_id.clone(),
                        answer,
                        observation: a.observation.clone(),
                    })
                })
                .collect();
            let has_non_conformities = records.iter().any(|r| !r.answer);
            (records, s.general_observations.clone(), has_non_conformities)
        };

        self.gateway.save_answers(&execution.id, &records).await?;

        // Photos upload one by one; a failed photo stays local for a later
        // retry and never aborts the submission.
        let mut photos = std::mem::take(&mut self.lock().photos);
        let results = self
            .photos
            .upload_batch(&execution.id, &mut photos, self.gateway.as_ref(), &self.events)
            .await;
        self.lock().photos = photos;
        for r in &results {
            if let Err(e) = &r.result {
                tracing::warn!("photo {} left for retry: {e}", r.photo_id);
            }
        }

        let execution = self
            .gateway
            .complete_execution(&execution.id, &general_observations, has_non_conformities)
            .await?;

        // The remote record is complete; only now does the draft go away.
        self.autosave.cancel();
        if let Err(e) = self.drafts.delete(template_id, unit_id).await {
            tracing::warn!("draft delete after submit failed: {e}");
        }

        let mut s = self.lock();
        s.errors.clear();
        s.draft_exists = false;
        Ok(execution)
    }

    /// Retry one failed photo against the execution created on submit.
    pub async fn retry_photo_upload(&self, photo_id: Uuid) -> Result<(), EngineError> {
        let execution_id =
            self.lock()
                .execution_id
                .clone()
                .ok_or_else(|| EngineError::Validation {
                    message: "no execution to attach the photo to".into(),
                })?;

        let taken = {
            let mut s = self.lock();
            s.photos
                .iter()
                .position(|p| p.id == photo_id)
                .map(|i| (i, s.photos.remove(i)))
        };
        let Some((index, mut photo)) = taken else {
            return Err(EngineError::Validation {
                message: format!("unknown photo {photo_id}"),
            });
        };

        let result = self
            .photos
            .retry(&execution_id, &mut photo, self.gateway.as_ref(), &self.events)
            .await;

        let mut s = self.lock();
        let index = index.min(s.photos.len());
        s.photos.insert(index, photo);
        drop(s);

        result.result.map(|_| ())
    }

    /// Delete the stored draft and clear the in-progress session data.
    ///
    /// The loaded template and questions stay, ready for a fresh run.
    pub async fn discard_draft(&self) -> Result<(), EngineError> {
        self.autosave.cancel();
        let (template_id, unit_id) = self.session_key()?;
        self.drafts.delete(&template_id, &unit_id).await?;

        let mut s = self.lock();
        s.answers.clear();
        s.general_observations.clear();
        s.photos.clear();
        s.errors.clear();
        s.current_index = 0;
        s.started_at = Some(Utc::now());
        s.execution_id = None;
        s.draft_exists = false;
        Ok(())
    }

    /// Full return to the pre-load state, e.g. when the unit changes.
    pub fn reset(&self) {
        self.autosave.cancel();
        *self.lock() = SessionState::default();
    }

    /// Current state for the presentation layer.
    pub fn snapshot(&self) -> ControllerSnapshot {
        let s = self.lock();
        let report = validation::validate(&s.questions, &s.answers);
        ControllerSnapshot {
            loading: s.loading,
            submitting: s.submitting,
            template_loaded: s.template.is_some(),
            question_count: s.questions.len(),
            current_index: s.current_index,
            draft_exists: s.draft_exists,
            is_valid: report.is_valid,
            errors: s.errors.clone(),
            last_save_error: s.last_save_error.clone(),
        }
    }

    /// The question under the cursor, if any.
    pub fn current_question(&self) -> Option<Question> {
        let s = self.lock();
        s.questions.get(s.current_index).cloned()
    }

    /// The recorded answer for a question, if any.
    pub fn answer_for(&self, question_id: &str) -> Option<Answer> {
        self.lock().answers.get(question_id).cloned()
    }

    /// Photos currently attached to the session.
    pub fn photos(&self) -> Vec<Photo> {
        self.lock().photos.clone()
    }

    /// The loaded session's (template, unit) identity.
    fn session_key(&self) -> Result<(String, String), EngineError> {
        let s = self.lock();
        match (&s.template, &s.unit_id) {
            (Some(template), Some(unit_id)) => Ok((template.id.clone(), unit_id.clone())),
            _ => Err(EngineError::Validation {
                message: "no template loaded".into(),
            }),
        }
    }

    /// Schedule a debounced draft write reflecting state at flush time.
    fn schedule_autosave(&self) {
        let state = Arc::clone(&self.state);
        let drafts = Arc::clone(&self.drafts);
        let events = self.events.clone();
        self.autosave.schedule(async move {
            // Snapshot at fire time, not at schedule time.
            let Some(mut draft) = snapshot_draft(&state) else {
                return;
            };
            match drafts.save(&mut draft).await {
                Ok(()) => {
                    let mut s = lock_state(&state);
                    s.draft_exists = true;
                    s.last_save_error = None;
                    drop(s);
                    let _ = events.try_send(EngineEvent::DraftSaved);
                }
                Err(e) => {
                    tracing::error!("autosave failed: {e}");
                    lock_state(&state).last_save_error = Some(e.to_string());
                    let _ = events.try_send(EngineEvent::DraftSaveFailed {
                        message: e.to_string(),
                    });
                }
            }
        });
    }
}

/// Lock a shared session state, recovering from poisoning.
fn lock_state(state: &Mutex<SessionState>) -> MutexGuard<'_, SessionState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Build the draft for the current state, if a session is active.
fn snapshot_draft(state: &Mutex<SessionState>) -> Option<Draft> {
    let s = lock_state(state);
    let template = s.template.as_ref()?;
    let unit_id = s.unit_id.clone()?;
    let started_at = s.started_at.unwrap_or_else(Utc::now);
    Some(Draft {
        template_id: template.id.clone(),
        unit_id,
        answers: s.answers.clone(),
        general_observations: s.general_observations.clone(),
        photos: s.photos.clone(),
        started_at,
        last_updated_at: started_at,
    })
}
