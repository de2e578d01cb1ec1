use fieldx::fxstruct;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;
use tracing::error;
use tracing::instrument;

use crate::catalog::Catalog;
use crate::error::StoreError;
use crate::persist;
use crate::persist::CART_KEY;
use crate::traits::StorageBackend;
use crate::traits::StoreObserver;
use crate::types::CartItem;
use crate::types::OrderSummary;
use crate::types::Product;
use crate::types::ProductId;

/// The shopping cart.
///
/// Every entry holds a positive quantity of a single product; a product never appears twice. Each state change is
/// mirrored into the storage under the `cart` key as a JSON array. Storage failures never reach the caller: they are
/// logged and passed on to the observer while the in-memory state remains the source of truth.
///
/// ```ignore
/// let cart = Cart::builder().storage(storage).build()?;
/// cart.load().await;
/// cart.add(&product, 2).await;
/// cart.update_quantity(product.id, 0).await; // gone
/// ```
#[fxstruct(sync, rc, no_new, builder, default(off), get(off))]
pub struct Cart {
    #[fieldx(get(clone), builder(required))]
    storage: Arc<dyn StorageBackend>,

    #[fieldx(optional, get(clone))]
    observer: Arc<dyn StoreObserver>,

    #[fieldx(inner_mut, private, get, get_mut, builder(off), default(Vec::new()))]
    entries: Vec<CartItem>,

    // Held from snapshot to the end of the storage write so that writes land in mutation order.
    #[fieldx(builder(off), default(Mutex::new(())))]
    write_lock: Mutex<()>,
}

impl Cart {
    /// Replace the in-memory state with what the storage has. Unreadable or corrupt data results in an empty cart.
    #[instrument(level = "debug", skip(self))]
    pub async fn load(&self) {
        let storage = self.storage();
        let items = match persist::load_list::<CartItem>(storage.as_ref(), CART_KEY).await {
            Ok(items) => normalize(items),
            Err(err) => {
                self.report(err, "Failed to load cart from storage").await;
                Vec::new()
            }
        };
        debug!("Cart loaded with {} entries", items.len());
        *self.entries_mut() = items;
    }

    /// Add `quantity` units of `product`. An existing entry accumulates the quantity and takes the fresh product
    /// snapshot. Adding nothing is a no-op.
    #[instrument(level = "debug", skip(self, product), fields(product_id = product.id))]
    pub async fn add(&self, product: &Product, quantity: u32) {
        if quantity == 0 {
            return;
        }

        {
            let mut entries = self.entries_mut();
            if let Some(item) = entries.iter_mut().find(|i| i.product_id == product.id) {
                item.quantity = item.quantity.saturating_add(quantity);
                item.product = Some(product.clone());
            }
            else {
                entries.push(CartItem::new(product, quantity));
            }
        }

        self.persist().await;
    }

    /// Overwrite the quantity of an entry. Zero or less removes it. Unknown products are ignored.
    #[instrument(level = "debug", skip(self))]
    pub async fn update_quantity(&self, product_id: ProductId, quantity: i64) {
        if quantity <= 0 {
            self.remove(product_id).await;
            return;
        }

        let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
        let updated = {
            let mut entries = self.entries_mut();
            match entries.iter_mut().find(|i| i.product_id == product_id) {
                Some(item) => {
                    item.quantity = quantity;
                    true
                }
                None => false,
            }
        };

        if updated {
            self.persist().await;
        }
    }

    #[instrument(level = "debug", skip(self))]
    pub async fn remove(&self, product_id: ProductId) {
        let removed = {
            let mut entries = self.entries_mut();
            let before = entries.len();
            entries.retain(|i| i.product_id != product_id);
            entries.len() != before
        };

        if removed {
            self.persist().await;
        }
    }

    #[instrument(level = "debug", skip(self))]
    pub async fn clear(&self) {
        self.entries_mut().clear();
        self.persist().await;
    }

    /// Refresh product snapshots from the catalog. Entries whose product is gone from the catalog keep their last
    /// snapshot.
    pub async fn reconcile(&self, catalog: &Catalog) {
        let refreshed = {
            let mut entries = self.entries_mut();
            let mut refreshed = false;
            for item in entries.iter_mut() {
                if let Some(product) = catalog.find(item.product_id) {
                    if item.product.as_ref() != Some(product) {
                        item.product = Some(product.clone());
                        refreshed = true;
                    }
                }
            }
            refreshed
        };

        if refreshed {
            self.persist().await;
        }
    }

    pub fn items(&self) -> Vec<CartItem> {
        self.entries().clone()
    }

    /// Number of distinct products.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    pub fn contains(&self, product_id: ProductId) -> bool {
        self.entries().iter().any(|i| i.product_id == product_id)
    }

    pub fn quantity_of(&self, product_id: ProductId) -> u32 {
        self.entries()
            .iter()
            .find(|i| i.product_id == product_id)
            .map_or(0, |i| i.quantity)
    }

    /// Total number of units across all entries.
    pub fn item_count(&self) -> u64 {
        self.entries().iter().map(|i| i.quantity as u64).sum()
    }

    /// Sum of discounted line totals.
    pub fn total(&self) -> f64 {
        self.entries().iter().map(CartItem::line_total).sum()
    }

    pub fn summary(&self, tax_rate: f64) -> OrderSummary {
        OrderSummary::new(self.total(), tax_rate)
    }

    async fn persist(&self) {
        let _write_guard = self.write_lock.lock().await;
        let snapshot = self.items();
        let storage = self.storage();
        if let Err(err) = persist::save_list(storage.as_ref(), CART_KEY, &snapshot).await {
            self.report(err, "Failed to save cart to storage").await;
        }
    }

    async fn report(&self, err: StoreError, context: &str) {
        error!("{context}: {err}");
        if let Some(observer) = self.observer() {
            observer.on_error(&err).await;
        }
    }
}

// Stored data may predate the invariants or have been edited by hand.
fn normalize(items: Vec<CartItem>) -> Vec<CartItem> {
    let mut normalized: Vec<CartItem> = Vec::with_capacity(items.len());
    for item in items.into_iter().filter(|i| i.quantity > 0) {
        if let Some(existing) = normalized.iter_mut().find(|i| i.product_id == item.product_id) {
            existing.quantity = existing.quantity.saturating_add(item.quantity);
            if item.product.is_some() {
                existing.product = item.product;
            }
        }
        else {
            normalized.push(item);
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use crate::test::product;
    use crate::test::sample_catalog;
    use crate::test::ReadOnlyStorage;
    use crate::test::RecordingObserver;
    use crate::test::SlowFirstStorage;

    fn cart_on(storage: Arc<dyn StorageBackend>) -> Arc<Cart> {
        Cart::builder().storage(storage).build().unwrap()
    }

    async fn stored(storage: &MemoryStorage) -> Vec<CartItem> {
        persist::load_list(storage, CART_KEY).await.unwrap()
    }

    #[tokio::test]
    async fn adding_twice_accumulates() {
        let storage = Arc::new(MemoryStorage::new());
        let cart = cart_on(storage.clone());
        let sofa = product(1, 100.0, 0.0);

        cart.add(&sofa, 1).await;
        cart.add(&sofa, 2).await;

        assert_eq!(cart.len(), 1);
        assert_eq!(cart.quantity_of(1), 3);
        assert_eq!(cart.item_count(), 3);

        let persisted = stored(&storage).await;
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].quantity, 3);
    }

    #[tokio::test]
    async fn adding_zero_does_nothing() {
        let storage = Arc::new(MemoryStorage::new());
        let cart = cart_on(storage.clone());

        cart.add(&product(1, 10.0, 0.0), 0).await;

        assert!(cart.is_empty());
        assert!(storage.is_empty(), "nothing changed, nothing written");
    }

    #[tokio::test]
    async fn update_to_zero_removes_entry() {
        let storage = Arc::new(MemoryStorage::new());
        let cart = cart_on(storage.clone());
        cart.add(&product(1, 10.0, 0.0), 2).await;
        cart.add(&product(2, 20.0, 0.0), 1).await;

        cart.update_quantity(1, 5).await;
        assert_eq!(cart.quantity_of(1), 5);

        cart.update_quantity(1, 0).await;
        assert!(!cart.contains(1));

        cart.update_quantity(2, -3).await;
        assert!(cart.is_empty());
        assert!(stored(&storage).await.is_empty());
    }

    #[tokio::test]
    async fn unknown_ids_are_noops() {
        let cart = cart_on(Arc::new(MemoryStorage::new()));
        cart.add(&product(1, 10.0, 0.0), 1).await;

        cart.update_quantity(99, 4).await;
        cart.remove(99).await;

        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.quantity_of(99), 0);
    }

    #[tokio::test]
    async fn total_is_sum_of_discounted_lines() {
        let cart = cart_on(Arc::new(MemoryStorage::new()));
        cart.add(&product(1, 100.0, 0.0), 2).await;
        cart.add(&product(2, 50.0, 10.0), 3).await;

        let expected: f64 = cart.items().iter().map(CartItem::line_total).sum();
        assert!((cart.total() - expected).abs() < 1e-9);
        assert!((cart.total() - (200.0 + 135.0)).abs() < 1e-9);

        let summary = cart.summary(0.1);
        assert!((summary.tax - 33.5).abs() < 1e-9);
        assert!((summary.total - 368.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn clear_empties_storage_too() {
        let storage = Arc::new(MemoryStorage::new());
        let cart = cart_on(storage.clone());
        cart.add(&product(1, 10.0, 0.0), 1).await;

        cart.clear().await;

        assert!(cart.is_empty());
        assert_eq!(storage.get_item(CART_KEY).await.unwrap().as_deref(), Some("[]"));
    }

    #[tokio::test]
    async fn load_restores_and_normalizes() {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .set_item(
                CART_KEY,
                r#"[{"productId": 1, "quantity": 2},
                    {"productId": 2, "quantity": 0},
                    {"productId": 1, "quantity": 1}]"#
                    .into(),
            )
            .await
            .unwrap();

        let cart = cart_on(storage);
        cart.load().await;

        assert_eq!(cart.len(), 1);
        assert_eq!(cart.quantity_of(1), 3);
        // No snapshot, no money.
        assert_eq!(cart.total(), 0.0);

        cart.reconcile(&sample_catalog()).await;
        assert!((cart.total() - 3.0 * 899.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn corrupt_storage_falls_back_to_empty() {
        let observer = Arc::new(RecordingObserver::default());
        let cart = Cart::builder()
            .storage(Arc::new(ReadOnlyStorage::with("{oops")))
            .observer(observer.clone())
            .build()
            .unwrap();

        cart.load().await;

        assert!(cart.is_empty());
        assert_eq!(observer.errors.lock().len(), 1);
    }

    #[tokio::test]
    async fn write_failure_keeps_memory_state() {
        let observer = Arc::new(RecordingObserver::default());
        let cart = Cart::builder()
            .storage(Arc::new(ReadOnlyStorage::default()))
            .observer(observer.clone())
            .build()
            .unwrap();

        cart.add(&product(1, 10.0, 0.0), 2).await;

        assert_eq!(cart.quantity_of(1), 2);
        let errors = observer.errors.lock();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("read-only"), "unexpected error: {}", errors[0]);
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_writes_keep_mutation_order() {
        let storage = Arc::new(SlowFirstStorage::default());
        let cart = cart_on(storage.clone());

        let first = tokio::spawn({
            let cart = cart.clone();
            async move { cart.add(&product(1, 10.0, 0.0), 1).await }
        });
        // Let the first add reach its delayed write.
        tokio::task::yield_now().await;
        cart.add(&product(2, 20.0, 0.0), 1).await;
        first.await.unwrap();

        assert_eq!(cart.len(), 2);
        let persisted = stored(&storage.inner).await;
        assert_eq!(persisted.iter().map(|i| i.product_id).collect::<Vec<_>>(), vec![1, 2]);
    }
}
