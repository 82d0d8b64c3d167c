// Refresh-token persistence seam

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::ApiError;

/// Capability interface for persisting the refresh token between runs.
///
/// The storage mechanism belongs to the host application (keychain, file,
/// browser storage behind a bridge); the manager only reads, writes, and
/// deletes through this trait.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn get_refresh_token(&self) -> Result<Option<String>, ApiError>;

    async fn set_refresh_token(&self, token: &str) -> Result<(), ApiError>;

    async fn delete_refresh_token(&self) -> Result<(), ApiError>;
}

/// In-memory store for tests and sessions that should not outlive the
/// process.
#[derive(Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn get_refresh_token(&self) -> Result<Option<String>, ApiError> {
        Ok(self.token.lock().await.clone())
    }

    async fn set_refresh_token(&self, token: &str) -> Result<(), ApiError> {
        *self.token.lock().await = Some(token.to_string());
        Ok(())
    }

    async fn delete_refresh_token(&self) -> Result<(), ApiError> {
        *self.token.lock().await = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = MemoryTokenStore::new();
        assert_eq!(store.get_refresh_token().await.unwrap(), None);

        store.set_refresh_token("refresh-1").await.unwrap();
        assert_eq!(
            store.get_refresh_token().await.unwrap().as_deref(),
            Some("refresh-1")
        );

        store.set_refresh_token("refresh-2").await.unwrap();
        assert_eq!(
            store.get_refresh_token().await.unwrap().as_deref(),
            Some("refresh-2")
        );

        store.delete_refresh_token().await.unwrap();
        assert_eq!(store.get_refresh_token().await.unwrap(), None);
    }
}
