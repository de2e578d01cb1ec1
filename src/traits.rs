use async_trait::async_trait;
use std::fmt::Debug;

use crate::error::Result;
use crate::error::StoreError;
use crate::types::NoticeKind;

/// The key-value storage the stores mirror their state into. Think of it as the browser's local storage: string keys,
/// string values, last write wins.
#[async_trait]
pub trait StorageBackend: Debug + Send + Sync + 'static {
    async fn get_item(&self, key: &str) -> Result<Option<String>>;
    async fn set_item(&self, key: &str, value: String) -> Result<()>;
    async fn remove_item(&self, key: &str) -> Result<()>;
}

// Receives what the stores have to say to the user. None of the methods may fail: stores call them from their error
// paths.
#[async_trait]
pub trait StoreObserver: Send + Sync + 'static {
    async fn on_notice(&self, _kind: NoticeKind, _message: &str) {}
    async fn on_error(&self, _error: &StoreError) {}
}
