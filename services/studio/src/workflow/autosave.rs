//! services/studio/src/workflow/autosave.rs
//!
//! Best-effort local snapshots of the lesson being edited, so a restarted
//! client can pick up where it left off. Nothing here ever fails the workflow:
//! every storage problem is logged and reported as `false` or `None`.

use chrono::{DateTime, Utc};
use lesson_pipeline_core::domain::{LessonContent, SessionId};
use lesson_pipeline_core::ports::KeyValueStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A stored copy of one session's lesson.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutosaveSnapshot {
    pub session_id: SessionId,
    pub lesson_content: LessonContent,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl AutosaveSnapshot {
    pub fn saved_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp)
    }
}

/// The store key for a session's snapshot.
pub fn snapshot_key(session_id: &SessionId) -> String {
    format!("session_{}", session_id)
}

struct PendingSave {
    token: CancellationToken,
    handle: JoinHandle<bool>,
}

/// Saves and restores snapshots, and owns at most one deferred save.
pub struct Autosave {
    store: Arc<dyn KeyValueStore>,
    pending: Option<PendingSave>,
}

impl Autosave {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            pending: None,
        }
    }

    /// Writes a timestamped snapshot now. Returns whether it was stored.
    pub async fn save(&self, session_id: &SessionId, content: &LessonContent) -> bool {
        write_snapshot(self.store.as_ref(), session_id, content).await
    }

    /// Reads the last snapshot for `session_id`, if one exists and is readable.
    pub async fn restore(&self, session_id: &SessionId) -> Option<AutosaveSnapshot> {
        let key = snapshot_key(session_id);
        let raw = match self.store.get(&key).await {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(%session_id, error = %e, "Could not read autosave snapshot");
                return None;
            }
        };
        match serde_json::from_str::<AutosaveSnapshot>(&raw) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(%session_id, error = %e, "Ignoring unreadable autosave snapshot");
                None
            }
        }
    }

    /// Arms a one-shot save after `delay`, replacing any save already armed.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule(&mut self, session_id: SessionId, content: LessonContent, delay: Duration) {
        self.cancel();

        let token = CancellationToken::new();
        let cancelled = token.clone();
        let store = self.store.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = cancelled.cancelled() => {
                    debug!(%session_id, "Deferred autosave cancelled");
                    false
                }
                _ = tokio::time::sleep(delay) => {
                    write_snapshot(store.as_ref(), &session_id, &content).await
                }
            }
        });

        self.pending = Some(PendingSave { token, handle });
    }

    /// Disarms the deferred save. Returns `true` if one was still waiting.
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(pending) => {
                let waiting = !pending.handle.is_finished();
                pending.token.cancel();
                waiting
            }
            None => false,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|pending| !pending.handle.is_finished())
    }

    /// Waits for the armed save to run. `None` if nothing was armed.
    pub async fn flush(&mut self) -> Option<bool> {
        let pending = self.pending.take()?;
        match pending.handle.await {
            Ok(saved) => Some(saved),
            Err(e) => {
                warn!(error = %e, "Deferred autosave task failed");
                Some(false)
            }
        }
    }

    /// Removes the snapshot for `session_id`.
    pub async fn discard(&self, session_id: &SessionId) -> bool {
        match self.store.remove(&snapshot_key(session_id)).await {
            Ok(()) => true,
            Err(e) => {
                warn!(%session_id, error = %e, "Could not remove autosave snapshot");
                false
            }
        }
    }

    /// Removes every entry in the store.
    pub async fn clear(&self) -> bool {
        let keys = match self.store.keys().await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "Could not list autosave entries");
                return false;
            }
        };
        let mut cleared = true;
        for key in keys {
            if let Err(e) = self.store.remove(&key).await {
                warn!(%key, error = %e, "Could not remove autosave entry");
                cleared = false;
            }
        }
        cleared
    }
}

impl Drop for Autosave {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn write_snapshot(
    store: &dyn KeyValueStore,
    session_id: &SessionId,
    content: &LessonContent,
) -> bool {
    let snapshot = AutosaveSnapshot {
        session_id: session_id.clone(),
        lesson_content: content.clone(),
        timestamp: Utc::now().timestamp_millis(),
    };
    let raw = match serde_json::to_string(&snapshot) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(%session_id, error = %e, "Could not serialize autosave snapshot");
            return false;
        }
    };
    match store.set(&snapshot_key(session_id), &raw).await {
        Ok(()) => {
            info!(%session_id, slides = content.slide_count(), "Lesson autosaved");
            true
        }
        Err(e) => {
            warn!(%session_id, error = %e, "Autosave failed");
            false
        }
    }
}
