//! Pending journal recordings, one draft per user.
//!
//! A draft owns its audio file until the entry is saved. Replacing or
//! discarding a draft deletes the file it owned.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::journal::{AudioFormat, SIMULATED_TRANSCRIPT};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingDraft {
    pub id: Uuid,
    /// Storage key under the upload directory, kept on the saved entry.
    pub audio_url: String,
    pub format: AudioFormat,
    pub size: usize,
    pub transcript: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct RecordingStore {
    dir: PathBuf,
    drafts: Arc<RwLock<HashMap<Uuid, RecordingDraft>>>,
}

impl RecordingStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            drafts: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_of(&self, draft: &RecordingDraft) -> PathBuf {
        self.dir.join(&draft.audio_url)
    }

    /// Stores `bytes` as the user's draft, deleting any previous draft's audio.
    pub async fn replace(
        &self,
        user_id: Uuid,
        bytes: &[u8],
        format: AudioFormat,
    ) -> std::io::Result<RecordingDraft> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let id = Uuid::new_v4();
        let draft = RecordingDraft {
            id,
            audio_url: format!("{}-{}.{}", user_id, id, format.extension()),
            format,
            size: bytes.len(),
            transcript: SIMULATED_TRANSCRIPT.to_string(),
            created_at: Utc::now(),
        };
        tokio::fs::write(self.path_of(&draft), bytes).await?;

        let previous = self.drafts.write().await.insert(user_id, draft.clone());
        if let Some(old) = previous {
            self.remove_file(&old).await;
        }

        tracing::info!(
            user_id = %user_id,
            draft_id = %draft.id,
            size = draft.size,
            format = format.extension(),
            "Recording draft stored"
        );
        Ok(draft)
    }

    /// Drops the draft and its audio. Returns false when there was none.
    pub async fn discard(&self, user_id: Uuid) -> bool {
        let removed = self.drafts.write().await.remove(&user_id);
        match removed {
            Some(draft) => {
                self.remove_file(&draft).await;
                tracing::info!(user_id = %user_id, draft_id = %draft.id, "Recording draft discarded");
                true
            }
            None => false,
        }
    }

    pub async fn get(&self, user_id: Uuid) -> Option<RecordingDraft> {
        self.drafts.read().await.get(&user_id).cloned()
    }

    /// Hands the draft over to a saved entry. The audio file stays.
    pub async fn consume(&self, user_id: Uuid) -> Option<RecordingDraft> {
        self.drafts.write().await.remove(&user_id)
    }

    /// Puts a consumed draft back when saving the entry failed.
    pub async fn restore(&self, user_id: Uuid, draft: RecordingDraft) {
        let mut drafts = self.drafts.write().await;
        if drafts.contains_key(&user_id) {
            drop(drafts);
            self.remove_file(&draft).await;
        } else {
            drafts.insert(user_id, draft);
        }
    }

    async fn remove_file(&self, draft: &RecordingDraft) {
        let path = self.path_of(draft);
        if let Err(e) = tokio::fs::remove_file(&path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %path.display(), error = %e, "Failed to delete recording");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WAV: &[u8] = b"RIFF\x24\x00\x00\x00WAVEfmt ";

    #[tokio::test]
    async fn test_replace_deletes_previous_audio() {
        let tmp = tempfile::tempdir().unwrap();
        let store = RecordingStore::new(tmp.path());
        let user = Uuid::new_v4();

        let first = store.replace(user, WAV, AudioFormat::Wav).await.unwrap();
        assert!(tmp.path().join(&first.audio_url).exists());
        assert_eq!(first.transcript, SIMULATED_TRANSCRIPT);

        let second = store.replace(user, WAV, AudioFormat::Wav).await.unwrap();
        assert!(!tmp.path().join(&first.audio_url).exists());
        assert!(tmp.path().join(&second.audio_url).exists());
        assert_eq!(store.get(user).await.unwrap().id, second.id);
    }

    #[tokio::test]
    async fn test_discard_removes_draft_and_file() {
        let tmp = tempfile::tempdir().unwrap();
        let store = RecordingStore::new(tmp.path());
        let user = Uuid::new_v4();

        let draft = store.replace(user, WAV, AudioFormat::Wav).await.unwrap();
        assert!(store.discard(user).await);
        assert!(!tmp.path().join(&draft.audio_url).exists());
        assert!(store.get(user).await.is_none());
        assert!(!store.discard(user).await);
    }

    #[tokio::test]
    async fn test_consume_keeps_file() {
        let tmp = tempfile::tempdir().unwrap();
        let store = RecordingStore::new(tmp.path());
        let user = Uuid::new_v4();

        let draft = store.replace(user, WAV, AudioFormat::Wav).await.unwrap();
        let consumed = store.consume(user).await.unwrap();
        assert_eq!(consumed.id, draft.id);
        assert!(tmp.path().join(&draft.audio_url).exists());
        assert!(store.consume(user).await.is_none());
    }

    #[tokio::test]
    async fn test_drafts_are_per_user() {
        let tmp = tempfile::tempdir().unwrap();
        let store = RecordingStore::new(tmp.path());
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        let draft_a = store.replace(a, WAV, AudioFormat::Wav).await.unwrap();
        store.replace(b, WAV, AudioFormat::Wav).await.unwrap();
        assert!(tmp.path().join(&draft_a.audio_url).exists());
        assert_eq!(store.get(a).await.unwrap().id, draft_a.id);
    }
}
