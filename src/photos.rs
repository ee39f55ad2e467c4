//! Photo upload lifecycle and image capability seams.

use crate::backend::RemoteGateway;
use crate::error::EngineError;
use crate::model::{Photo, PhotoStatus};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Best-effort image shrinking before transfer.
pub trait ImageCompressor: Send + Sync {
    /// Produce a smaller encoding of `bytes`, or fail and let the caller
    /// fall back to the original.
    fn compress(&self, bytes: &[u8]) -> Result<Vec<u8>, EngineError>;
}

/// Compressor that hands bytes through untouched.
pub struct PassthroughCompressor;

impl ImageCompressor for PassthroughCompressor {
    fn compress(&self, bytes: &[u8]) -> Result<Vec<u8>, EngineError> {
        Ok(bytes.to_vec())
    }
}

/// An image produced by an [`ImageCapture`] implementation.
#[derive(Clone, Debug)]
pub struct CapturedImage {
    /// Where the platform wrote the captured bytes.
    pub local_uri: String,
}

/// Platform capability for capturing or picking an image.
#[async_trait]
pub trait ImageCapture: Send + Sync {
    /// Capture one image; `None` when the user cancels or no camera exists.
    async fn capture(&self) -> Result<Option<CapturedImage>, EngineError>;
}

/// Capture capability for hosts without camera access.
pub struct NoCamera;

#[async_trait]
impl ImageCapture for NoCamera {
    async fn capture(&self) -> Result<Option<CapturedImage>, EngineError> {
        Ok(None)
    }
}

/// Build a pending photo from a captured image.
pub fn photo_from_capture(image: CapturedImage, question_id: Option<String>) -> Photo {
    Photo::new(image.local_uri, question_id)
}

/// Status and progress notifications emitted while uploading.
#[derive(Clone, Debug)]
pub enum PhotoEvent {
    /// A photo moved to a new lifecycle state.
    StatusChanged { photo_id: Uuid, status: PhotoStatus },
    /// Coarse upload checkpoint: 50 once the transfer starts, 100 when the
    /// backend confirms. Not true transfer progress.
    Progress { photo_id: Uuid, percent: u8 },
}

/// Outcome of one photo's upload attempt.
#[derive(Debug)]
pub struct PhotoUploadResult {
    pub photo_id: Uuid,
    /// Remote URL on success.
    pub result: Result<String, EngineError>,
}

/// Owns every status transition in the photo lifecycle.
///
/// Membership of photos in an execution (add/remove) belongs to the
/// controller; this component only moves photos between states.
pub struct PhotoManager {
    compressor: Arc<dyn ImageCompressor>,
}

impl PhotoManager {
    pub fn new(compressor: Arc<dyn ImageCompressor>) -> Self {
        Self { compressor }
    }

    /// Apply a lifecycle transition, refusing edges the state machine does
    /// not define. Returns whether the transition was applied.
    pub fn transition(photo: &mut Photo, to: PhotoStatus) -> bool {
        let allowed = matches!(
            (photo.status, to),
            (PhotoStatus::Pending, PhotoStatus::Uploading)
                | (PhotoStatus::Uploading, PhotoStatus::Uploaded)
                | (PhotoStatus::Uploading, PhotoStatus::Failed)
                | (PhotoStatus::Failed, PhotoStatus::Uploading)
        );
        if allowed {
            photo.status = to;
        } else {
            tracing::warn!(
                "refusing photo {} transition {:?} -> {:?}",
                photo.id,
                photo.status,
                to
            );
        }
        allowed
    }

    /// Upload every pending photo, one at a time.
    ///
    /// Each photo reports its own outcome: a failure marks that photo
    /// `Failed` and the batch moves on, so earlier uploads stand and later
    /// ones are still attempted. The batch itself never errors.
    pub async fn upload_batch<E>(
        &self,
        execution_id: &str,
        photos: &mut [Photo],
        gateway: &dyn RemoteGateway,
        events: &mpsc::Sender<E>,
    ) -> Vec<PhotoUploadResult>
    where
        E: From<PhotoEvent>,
    {
        let mut results = Vec::new();
        for photo in photos
            .iter_mut()
            .filter(|p| p.status == PhotoStatus::Pending)
        {
            let result = self.upload_one(execution_id, photo, gateway, events).await;
            results.push(PhotoUploadResult {
                photo_id: photo.id,
                result,
            });
        }
        results
    }

    /// Retry one failed photo on explicit user request.
    pub async fn retry<E>(
        &self,
        execution_id: &str,
        photo: &mut Photo,
        gateway: &dyn RemoteGateway,
        events: &mpsc::Sender<E>,
    ) -> PhotoUploadResult
    where
        E: From<PhotoEvent>,
    {
        if photo.status != PhotoStatus::Failed {
            return PhotoUploadResult {
                photo_id: photo.id,
                result: Err(EngineError::Validation {
                    message: format!("photo {} is not in a failed state", photo.id),
                }),
            };
        }
        let result = self.upload_one(execution_id, photo, gateway, events).await;
        PhotoUploadResult {
            photo_id: photo.id,
            result,
        }
    }

    /// Drive one photo through uploading and into uploaded or failed.
    async fn upload_one<E>(
        &self,
        execution_id: &str,
        photo: &mut Photo,
        gateway: &dyn RemoteGateway,
        events: &mpsc::Sender<E>,
    ) -> Result<String, EngineError>
    where
        E: From<PhotoEvent>,
    {
        Self::transition(photo, PhotoStatus::Uploading);
        send_event(
            events,
            PhotoEvent::StatusChanged {
                photo_id: photo.id,
                status: photo.status,
            },
        );

        match self.transfer(execution_id, photo, gateway, events).await {
            Ok(url) => {
                Self::transition(photo, PhotoStatus::Uploaded);
                photo.remote_url = Some(url.clone());
                send_event(
                    events,
                    PhotoEvent::StatusChanged {
                        photo_id: photo.id,
                        status: photo.status,
                    },
                );
                Ok(url)
            }
            Err(e) => {
                tracing::warn!("photo {} upload failed: {e}", photo.id);
                Self::transition(photo, PhotoStatus::Failed);
                send_event(
                    events,
                    PhotoEvent::StatusChanged {
                        photo_id: photo.id,
                        status: photo.status,
                    },
                );
                Err(e)
            }
        }
    }

    /// Read, compress (best effort) and ship one photo's bytes.
    async fn transfer<E>(
        &self,
        execution_id: &str,
        photo: &Photo,
        gateway: &dyn RemoteGateway,
        events: &mpsc::Sender<E>,
    ) -> Result<String, EngineError>
    where
        E: From<PhotoEvent>,
    {
        let bytes = tokio::fs::read(&photo.local_uri)
            .await
            .map_err(|e| EngineError::ExecutionFailed {
                message: format!("could not read {}: {e}", photo.local_uri),
            })?;

        // Compression is an optimization, never a hard dependency.
        let payload = match self.compressor.compress(&bytes) {
            Ok(smaller) => smaller,
            Err(e) => {
                tracing::warn!("compression failed, uploading original bytes: {e}");
                bytes
            }
        };

        send_event(
            events,
            PhotoEvent::Progress {
                photo_id: photo.id,
                percent: 50,
            },
        );

        let url = gateway
            .upload_photo(execution_id, photo.id, photo.question_id.as_deref(), payload)
            .await?;

        send_event(
            events,
            PhotoEvent::Progress {
                photo_id: photo.id,
                percent: 100,
            },
        );
        Ok(url)
    }
}

/// Deliver an event; a dropped receiver or full buffer never blocks an
/// upload.
fn send_event<E: From<PhotoEvent>>(events: &mpsc::Sender<E>, event: PhotoEvent) {
    let _ = events.try_send(event.into());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AnswerRecord, Execution, Question, Template};
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// Gateway stub whose photo endpoint fails for selected photos.
    struct FlakyUploadGateway {
        fail_for: Vec<Uuid>,
        uploaded: Mutex<Vec<Uuid>>,
    }

    impl FlakyUploadGateway {
        fn new(fail_for: Vec<Uuid>) -> Self {
            Self {
                fail_for,
                uploaded: Mutex::new(vec![]),
            }
        }
    }

    #[async_trait]
    impl RemoteGateway for FlakyUploadGateway {
        async fn fetch_opening_template_for_unit(
            &self,
            _unit_id: &str,
        ) -> Result<Option<Template>, EngineError> {
            unimplemented!("not used by photo tests")
        }

        async fn fetch_questions(
            &self,
            _template_id: &str,
        ) -> Result<Vec<Question>, EngineError> {
            unimplemented!("not used by photo tests")
        }

        async fn create_execution(
            &self,
            _template_id: &str,
            _unit_id: &str,
            _executor_id: &str,
        ) -> Result<Execution, EngineError> {
            unimplemented!("not used by photo tests")
        }

        async fn save_answers(
            &self,
            _execution_id: &str,
            _answers: &[AnswerRecord],
        ) -> Result<(), EngineError> {
            unimplemented!("not used by photo tests")
        }

        async fn complete_execution(
            &self,
            _execution_id: &str,
            _observations: &str,
            _has_non_conformities: bool,
        ) -> Result<Execution, EngineError> {
            unimplemented!("not used by photo tests")
        }

        async fn upload_photo(
            &self,
            _execution_id: &str,
            photo_id: Uuid,
            _question_id: Option<&str>,
            _bytes: Vec<u8>,
        ) -> Result<String, EngineError> {
            if self.fail_for.contains(&photo_id) {
                return Err(EngineError::ExecutionFailed {
                    message: "upload rejected".into(),
                });
            }
            self.uploaded.lock().unwrap().push(photo_id);
            Ok(format!("https://cdn.example.test/photos/{photo_id}"))
        }
    }

    fn temp_image(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("checklist-photo-{}-{name}", Uuid::new_v4()));
        std::fs::write(&path, b"jpeg bytes").unwrap();
        path
    }

    fn pending_photo(name: &str) -> Photo {
        Photo::new(temp_image(name).to_string_lossy().into_owned(), None)
    }

    #[test]
    fn test_transition_table() {
        let mut photo = Photo::new("/tmp/x.jpg", None);
        assert_eq!(photo.status, PhotoStatus::Pending);

        // Legal path pending -> uploading -> failed -> uploading -> uploaded.
        assert!(PhotoManager::transition(&mut photo, PhotoStatus::Uploading));
        assert!(PhotoManager::transition(&mut photo, PhotoStatus::Failed));
        assert!(PhotoManager::transition(&mut photo, PhotoStatus::Uploading));
        assert!(PhotoManager::transition(&mut photo, PhotoStatus::Uploaded));

        // No edge leaves uploaded.
        assert!(!PhotoManager::transition(&mut photo, PhotoStatus::Uploading));
        assert!(!PhotoManager::transition(&mut photo, PhotoStatus::Pending));
        assert_eq!(photo.status, PhotoStatus::Uploaded);
    }

    #[test]
    fn test_pending_cannot_skip_to_uploaded() {
        let mut photo = Photo::new("/tmp/x.jpg", None);
        assert!(!PhotoManager::transition(&mut photo, PhotoStatus::Uploaded));
        assert_eq!(photo.status, PhotoStatus::Pending);
    }

    #[tokio::test]
    async fn test_batch_isolates_one_failure() {
        let mut photos = vec![
            pending_photo("p1"),
            pending_photo("p2"),
            pending_photo("p3"),
        ];
        let gateway = FlakyUploadGateway::new(vec![photos[1].id]);
        let manager = PhotoManager::new(Arc::new(PassthroughCompressor));
        let (tx, _rx) = mpsc::channel::<PhotoEvent>(64);

        let results = manager
            .upload_batch("exec-1", &mut photos, &gateway, &tx)
            .await;

        // All three report individually; the middle failure aborts nothing.
        assert_eq!(results.len(), 3);
        assert!(results[0].result.is_ok());
        assert!(results[1].result.is_err());
        assert!(results[2].result.is_ok());

        assert_eq!(photos[0].status, PhotoStatus::Uploaded);
        assert_eq!(photos[1].status, PhotoStatus::Failed);
        assert_eq!(photos[2].status, PhotoStatus::Uploaded);
        assert!(photos[0].remote_url.is_some());
        assert!(photos[1].remote_url.is_none());
    }

    #[tokio::test]
    async fn test_batch_skips_already_uploaded_photos() {
        let mut photos = vec![pending_photo("p1")];
        photos[0].status = PhotoStatus::Uploaded;
        let gateway = FlakyUploadGateway::new(vec![]);
        let manager = PhotoManager::new(Arc::new(PassthroughCompressor));
        let (tx, _rx) = mpsc::channel::<PhotoEvent>(64);

        let results = manager
            .upload_batch("exec-1", &mut photos, &gateway, &tx)
            .await;
        assert!(results.is_empty());
        assert!(gateway.uploaded.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_retry_only_applies_to_failed_photos() {
        let manager = PhotoManager::new(Arc::new(PassthroughCompressor));
        let gateway = FlakyUploadGateway::new(vec![]);
        let (tx, _rx) = mpsc::channel::<PhotoEvent>(64);

        let mut photo = pending_photo("p1");
        let refused = manager.retry("exec-1", &mut photo, &gateway, &tx).await;
        assert!(refused.result.is_err());
        assert_eq!(photo.status, PhotoStatus::Pending);

        photo.status = PhotoStatus::Failed;
        let retried = manager.retry("exec-1", &mut photo, &gateway, &tx).await;
        assert!(retried.result.is_ok());
        assert_eq!(photo.status, PhotoStatus::Uploaded);
    }

    #[tokio::test]
    async fn test_upload_emits_coarse_progress_checkpoints() {
        let mut photos = vec![pending_photo("p1")];
        let gateway = FlakyUploadGateway::new(vec![]);
        let manager = PhotoManager::new(Arc::new(PassthroughCompressor));
        let (tx, mut rx) = mpsc::channel::<PhotoEvent>(64);

        manager
            .upload_batch("exec-1", &mut photos, &gateway, &tx)
            .await;
        drop(tx);

        let mut percents = vec![];
        while let Some(ev) = rx.recv().await {
            if let PhotoEvent::Progress { percent, .. } = ev {
                percents.push(percent);
            }
        }
        assert_eq!(percents, vec![50, 100]);
    }

    #[tokio::test]
    async fn test_unreadable_local_uri_marks_photo_failed() {
        let mut photos = vec![Photo::new("/nonexistent/path/photo.jpg", None)];
        let gateway = FlakyUploadGateway::new(vec![]);
        let manager = PhotoManager::new(Arc::new(PassthroughCompressor));
        let (tx, _rx) = mpsc::channel::<PhotoEvent>(64);

        let results = manager
            .upload_batch("exec-1", &mut photos, &gateway, &tx)
            .await;
        assert!(results[0].result.is_err());
        assert_eq!(photos[0].status, PhotoStatus::Failed);
    }

    /// Compressor that always fails, to exercise the fallback.
    struct BrokenCompressor;

    impl ImageCompressor for BrokenCompressor {
        fn compress(&self, _bytes: &[u8]) -> Result<Vec<u8>, EngineError> {
            Err(EngineError::ExecutionFailed {
                message: "codec unavailable".into(),
            })
        }
    }

    #[tokio::test]
    async fn test_compression_failure_falls_back_to_original_bytes() {
        let mut photos = vec![pending_photo("p1")];
        let gateway = FlakyUploadGateway::new(vec![]);
        let manager = PhotoManager::new(Arc::new(BrokenCompressor));
        let (tx, _rx) = mpsc::channel::<PhotoEvent>(64);

        let results = manager
            .upload_batch("exec-1", &mut photos, &gateway, &tx)
            .await;
        assert!(results[0].result.is_ok());
        assert_eq!(photos[0].status, PhotoStatus::Uploaded);
    }

    #[tokio::test]
    async fn test_no_camera_capture_returns_none() {
        let captured = NoCamera.capture().await.unwrap();
        assert!(captured.is_none());
    }
}
