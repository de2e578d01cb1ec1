use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::traits::StorageBackend;

pub const CART_KEY: &str = "cart";
pub const WISHLIST_KEY: &str = "wishlist";

/// Read a JSON array stored under `key`. A missing key is an empty list.
pub(crate) async fn load_list<T>(storage: &dyn StorageBackend, key: &str) -> Result<Vec<T>>
where
    T: DeserializeOwned,
{
    let Some(raw) = storage.get_item(key).await?
    else {
        debug!("No '{key}' record in storage");
        return Ok(Vec::new());
    };

    Ok(serde_json::from_str(&raw)?)
}

pub(crate) async fn save_list<T>(storage: &dyn StorageBackend, key: &str, items: &[T]) -> Result<()>
where
    T: Serialize,
{
    let raw = serde_json::to_string(items)?;
    storage.set_item(key, raw).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::storage::MemoryStorage;

    #[tokio::test]
    async fn missing_key_is_empty() {
        let storage = MemoryStorage::new();
        let items: Vec<u32> = load_list(&storage, CART_KEY).await.unwrap();
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn garbage_is_a_json_error() {
        let storage = MemoryStorage::new();
        storage.set_item(CART_KEY, "{not json".into()).await.unwrap();
        let outcome: Result<Vec<u32>> = load_list(&storage, CART_KEY).await;
        assert!(matches!(outcome, Err(StoreError::Json(_))));
    }

    #[tokio::test]
    async fn saves_json_array() {
        let storage = MemoryStorage::new();
        save_list(&storage, WISHLIST_KEY, &[3u32, 1, 2]).await.unwrap();
        assert_eq!(storage.get_item(WISHLIST_KEY).await.unwrap().as_deref(), Some("[3,1,2]"));
    }
}
