use async_trait::async_trait;
use crate::application::errors::StorageError;
use crate::domain::entities::{Session, SessionId};

/// SessionStore trait - abstraction for session persistence
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn find_session(&self, id: &SessionId) -> Result<Option<Session>, StorageError>;
    async fn save_session(&self, session: &Session) -> Result<(), StorageError>;
    async fn delete_session(&self, id: &SessionId) -> Result<(), StorageError>;
    async fn list_sessions(&self) -> Result<Vec<Session>, StorageError>;
}
