use fieldx::fxstruct;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;
use tracing::error;
use tracing::instrument;

use crate::error::StoreError;
use crate::persist;
use crate::persist::WISHLIST_KEY;
use crate::traits::StorageBackend;
use crate::traits::StoreObserver;
use crate::types::NoticeKind;
use crate::types::Product;
use crate::types::ProductId;

/// Saved products. Membership is by product id; there are no quantities.
///
/// Like the [`Cart`](crate::cart::Cart), the list is mirrored into the storage, this time under the `wishlist` key.
/// Changes are announced to the observer as notices.
#[fxstruct(sync, rc, no_new, builder, default(off), get(off))]
pub struct Wishlist {
    #[fieldx(get(clone), builder(required))]
    storage: Arc<dyn StorageBackend>,

    #[fieldx(optional, get(clone))]
    observer: Arc<dyn StoreObserver>,

    #[fieldx(inner_mut, private, get, get_mut, builder(off), default(Vec::new()))]
    entries: Vec<Product>,

    // Held from snapshot to the end of the storage write so that writes land in mutation order.
    #[fieldx(builder(off), default(Mutex::new(())))]
    write_lock: Mutex<()>,
}

impl Wishlist {
    #[instrument(level = "debug", skip(self))]
    pub async fn load(&self) {
        let storage = self.storage();
        let mut products = match persist::load_list::<Product>(storage.as_ref(), WISHLIST_KEY).await {
            Ok(products) => products,
            Err(err) => {
                self.report(err, "Failed to load wishlist from storage").await;
                Vec::new()
            }
        };

        let mut seen = Vec::with_capacity(products.len());
        products.retain(|p| {
            if seen.contains(&p.id) {
                false
            }
            else {
                seen.push(p.id);
                true
            }
        });

        debug!("Wishlist loaded with {} products", products.len());
        *self.entries_mut() = products;
    }

    /// Returns `false` if the product was already saved.
    #[instrument(level = "debug", skip(self, product), fields(product_id = product.id))]
    pub async fn add(&self, product: &Product) -> bool {
        let added = {
            let mut entries = self.entries_mut();
            if entries.iter().any(|p| p.id == product.id) {
                false
            }
            else {
                entries.push(product.clone());
                true
            }
        };

        if added {
            self.persist().await;
            self.notify(NoticeKind::Success, format!("{} added to wishlist", product.name))
                .await;
        }
        added
    }

    /// Returns `false` if there was nothing to remove.
    #[instrument(level = "debug", skip(self))]
    pub async fn remove(&self, product_id: ProductId) -> bool {
        let removed = {
            let mut entries = self.entries_mut();
            let position = entries.iter().position(|p| p.id == product_id);
            position.map(|idx| entries.remove(idx))
        };

        if let Some(product) = removed {
            self.persist().await;
            self.notify(NoticeKind::Info, format!("{} removed from wishlist", product.name))
                .await;
            true
        }
        else {
            false
        }
    }

    /// Flip membership. Returns whether the product is saved afterwards.
    pub async fn toggle(&self, product: &Product) -> bool {
        if self.contains(product.id) {
            self.remove(product.id).await;
            false
        }
        else {
            self.add(product).await;
            true
        }
    }

    #[instrument(level = "debug", skip(self))]
    pub async fn clear(&self) {
        self.entries_mut().clear();
        self.persist().await;
        self.notify(NoticeKind::Info, "Wishlist cleared").await;
    }

    pub fn contains(&self, product_id: ProductId) -> bool {
        self.entries().iter().any(|p| p.id == product_id)
    }

    pub fn get(&self, product_id: ProductId) -> Option<Product> {
        self.entries().iter().find(|p| p.id == product_id).cloned()
    }

    pub fn items(&self) -> Vec<Product> {
        self.entries().clone()
    }

    pub fn count(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    async fn persist(&self) {
        let _write_guard = self.write_lock.lock().await;
        let snapshot = self.items();
        let storage = self.storage();
        if let Err(err) = persist::save_list(storage.as_ref(), WISHLIST_KEY, &snapshot).await {
            self.report(err, "Failed to save wishlist to storage").await;
        }
    }

    async fn notify<S: AsRef<str>>(&self, kind: NoticeKind, message: S) {
        if let Some(observer) = self.observer() {
            observer.on_notice(kind, message.as_ref()).await;
        }
    }

    async fn report(&self, err: StoreError, context: &str) {
        error!("{context}: {err}");
        if let Some(observer) = self.observer() {
            observer.on_error(&err).await;
        }
    }
}
