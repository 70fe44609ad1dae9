//! File-based session storage

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::application::errors::StorageError;
use crate::domain::entities::{Session, SessionId};
use crate::domain::traits::SessionStore;

/// Session store kept in memory and mirrored to one JSON file.
///
/// Without a path it never touches the disk.
pub struct JsonSessionStore {
    path: Option<PathBuf>,
    sessions: Arc<RwLock<BTreeMap<SessionId, Session>>>,
}

impl JsonSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            sessions: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            path: None,
            sessions: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Create the parent directory and load sessions saved by a previous run
    pub async fn init(&self) -> Result<usize, StorageError> {
        let Some(path) = &self.path else {
            return Ok(0);
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        if !tokio::fs::try_exists(path).await? {
            return Ok(0);
        }

        let content = tokio::fs::read_to_string(path).await?;
        let stored: Vec<Session> = if content.trim().is_empty() {
            Vec::new()
        } else {
            serde_json::from_str(&content)?
        };
        let mut sessions = self.sessions.write().await;
        sessions.clear();
        sessions.extend(stored.into_iter().map(|s| (s.session_id.clone(), s)));
        tracing::info!(count = sessions.len(), path = %path.display(), "Loaded stored sessions");
        Ok(sessions.len())
    }

    async fn persist(&self, sessions: &BTreeMap<SessionId, Session>) -> Result<(), StorageError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let all: Vec<&Session> = sessions.values().collect();
        let json = serde_json::to_string_pretty(&all)?;
        write_atomically(path, json.as_bytes()).await
    }
}

async fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[async_trait]
impl SessionStore for JsonSessionStore {
    async fn find_session(&self, id: &SessionId) -> Result<Option<Session>, StorageError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(id).cloned())
    }

    async fn save_session(&self, session: &Session) -> Result<(), StorageError> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.session_id.clone(), session.clone());
        self.persist(&sessions).await
    }

    async fn delete_session(&self, id: &SessionId) -> Result<(), StorageError> {
        let mut sessions = self.sessions.write().await;
        if sessions.remove(id).is_some() {
            self.persist(&sessions).await?;
        }
        Ok(())
    }

    async fn list_sessions(&self) -> Result<Vec<Session>, StorageError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::Item;

    fn scratch_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("cadence-bot-{}", uuid::Uuid::new_v4()))
            .join("sessions.json")
    }

    #[tokio::test]
    async fn test_sessions_survive_reload() {
        let path = scratch_path();
        let store = JsonSessionStore::new(&path);
        store.init().await.unwrap();

        let session = Session::new("guild", "channel").with_items([Item::new("first")]);
        store.save_session(&session).await.unwrap();
        store.save_session(&Session::new("other", "channel")).await.unwrap();
        store.delete_session(&SessionId::new("other")).await.unwrap();

        let reloaded = JsonSessionStore::new(&path);
        assert_eq!(reloaded.init().await.unwrap(), 1);
        let found = reloaded.find_session(&SessionId::new("guild")).await.unwrap();
        assert_eq!(found, Some(session));

        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }

    #[tokio::test]
    async fn test_in_memory_store_lists_sessions() {
        let store = JsonSessionStore::in_memory();
        assert_eq!(store.init().await.unwrap(), 0);
        store.save_session(&Session::new("b", "c")).await.unwrap();
        store.save_session(&Session::new("a", "c")).await.unwrap();

        let ids: Vec<String> = store
            .list_sessions()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.session_id.to_string())
            .collect();
        assert_eq!(ids, ["a", "b"]);
        assert!(store.find_session(&SessionId::new("missing")).await.unwrap().is_none());
    }
}
