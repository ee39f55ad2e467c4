//! Local draft persistence keyed by (template, unit).

use crate::{error::EngineError, model::Draft, storage::KeyValueStore};
use chrono::Utc;
use std::sync::Arc;

/// Composite storage key for one (template, unit) draft.
pub fn draft_key(template_id: &str, unit_id: &str) -> String {
    format!("{template_id}_{unit_id}")
}

/// Typed draft persistence over a byte store.
///
/// Pure storage; business rules about when drafts are written or dropped
/// live in the execution controller.
pub struct DraftStore {
    store: Arc<dyn KeyValueStore>,
}

impl DraftStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Look up the draft for a (template, unit) pair.
    ///
    /// Read and decode failures are treated as "no draft": a corrupted or
    /// unavailable record must never block starting a fresh execution.
    pub async fn get(&self, template_id: &str, unit_id: &str) -> Option<Draft> {
        let key = draft_key(template_id, unit_id);
        let bytes = match self.store.get(&key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("draft read failed for {key}: {e}");
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(draft) => Some(draft),
            Err(e) => {
                tracing::warn!("draft decode failed for {key}: {e}");
                None
            }
        }
    }

    /// Upsert the draft, stamping `last_updated_at` before the write.
    ///
    /// The caller's previous stamp is kept as a floor so the sequence of
    /// stamps for one key never decreases, even across clock adjustments.
    pub async fn save(&self, draft: &mut Draft) -> Result<(), EngineError> {
        draft.last_updated_at = Utc::now().max(draft.last_updated_at);
        let key = draft_key(&draft.template_id, &draft.unit_id);
        let bytes = serde_json::to_vec(draft).map_err(|e| EngineError::DraftStore {
            message: e.to_string(),
        })?;
        self.store.set(&key, bytes).await
    }

    /// Remove the draft; removing an absent draft is not an error.
    pub async fn delete(&self, template_id: &str, unit_id: &str) -> Result<(), EngineError> {
        self.store.delete(&draft_key(template_id, unit_id)).await
    }

    /// Every saved-and-not-deleted draft, for pending-work summaries.
    ///
    /// Undecodable entries are skipped with a warning rather than failing
    /// the whole listing.
    pub async fn list_all(&self) -> Vec<Draft> {
        let keys = match self.store.keys().await {
            Ok(keys) => keys,
            Err(e) => {
                tracing::warn!("draft listing failed: {e}");
                return vec![];
            }
        };

        let mut drafts = Vec::new();
        for key in keys {
            match self.store.get(&key).await {
                Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                    Ok(draft) => drafts.push(draft),
                    Err(e) => tracing::warn!("skipping undecodable draft {key}: {e}"),
                },
                Ok(None) => {}
                Err(e) => tracing::warn!("skipping unreadable draft {key}: {e}"),
            }
        }
        drafts
    }
}
