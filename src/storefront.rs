use chrono::Utc;
use fieldx::fxstruct;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing::instrument;

use crate::cart::Cart;
use crate::catalog::Catalog;
use crate::catalog::CatalogFilter;
use crate::error::Result;
use crate::error::StoreError;
use crate::notice::NoticeBoard;
use crate::traits::StorageBackend;
use crate::traits::StoreObserver;
use crate::types::NoticeKind;
use crate::types::OrderSummary;
use crate::types::Product;
use crate::types::ProductId;
use crate::types::Receipt;
use crate::wishlist::Wishlist;

/// The storefront facade: one catalog, one storage, and the stores built on top of them.
///
/// ```ignore
/// let shop = Storefront::builder()
///     .catalog(Catalog::load("catalog.json").await?)
///     .storage(Arc::new(FileStorage::new(".b-ec")))
///     .checkout_delay(Duration::from_secs(2))
///     .build()?;
/// shop.load().await;
///
/// for product in shop.browse_query("?mainCategory=INTERIOR&category=Kitchen") {
///     shop.add_to_cart(product.id, 1).await;
/// }
/// let receipt = shop.checkout().await?;
/// ```
#[fxstruct(sync, rc, no_new, builder, default(off), get(off))]
pub struct Storefront {
    #[fieldx(get(clone), builder(required, into))]
    catalog: Arc<Catalog>,

    #[fieldx(get(clone), builder(required))]
    storage: Arc<dyn StorageBackend>,

    /// How long the simulated checkout takes.
    #[fieldx(get(copy), default(Duration::from_secs(2)))]
    checkout_delay: Duration,

    #[fieldx(get(copy), default(0.1))]
    tax_rate: f64,

    #[fieldx(get(copy), default(Duration::from_millis(3000)))]
    notice_ttl: Duration,

    #[fieldx(lazy, get(clone), builder(off))]
    notices: Arc<NoticeBoard>,

    #[fieldx(lazy, get(clone), builder(off))]
    cart: Arc<Cart>,

    #[fieldx(lazy, get(clone), builder(off))]
    wishlist: Arc<Wishlist>,

    #[fieldx(builder(off), default(AtomicBool::new(false)))]
    checking_out: AtomicBool,
}

// Resets the checkout flag even if the checkout future is dropped midway.
struct CheckoutGuard<'a>(&'a AtomicBool);

impl Drop for CheckoutGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Storefront {
    fn build_notices(&self) -> Arc<NoticeBoard> {
        Arc::new(NoticeBoard::builder().ttl(self.notice_ttl()).build().unwrap())
    }

    fn build_cart(&self) -> Arc<Cart> {
        Cart::builder()
            .storage(self.storage())
            .observer(self.observer())
            .build()
            .unwrap()
    }

    fn build_wishlist(&self) -> Arc<Wishlist> {
        Wishlist::builder()
            .storage(self.storage())
            .observer(self.observer())
            .build()
            .unwrap()
    }

    fn observer(&self) -> Arc<dyn StoreObserver> {
        self.notices()
    }

    /// Restore both stores from the storage and bring cart snapshots up to date with the catalog.
    #[instrument(level = "debug", skip(self))]
    pub async fn load(&self) {
        let cart = self.cart();
        cart.load().await;
        cart.reconcile(&self.catalog).await;
        self.wishlist().load().await;
        info!(
            "Storefront ready: {} products, {} cart entries, {} saved",
            self.catalog.len(),
            cart.len(),
            self.wishlist().count()
        );
    }

    pub fn product(&self, id: ProductId) -> Option<Product> {
        self.catalog.find(id).cloned()
    }

    pub fn browse(&self, filter: &CatalogFilter) -> Vec<Product> {
        self.catalog.filter(filter).cloned().collect()
    }

    /// Same as [`browse`](Self::browse) with the filter taken from a listing URL query string.
    pub fn browse_query(&self, query: &str) -> Vec<Product> {
        self.browse(&CatalogFilter::from_query(query))
    }

    /// Add a catalog product to the cart. The quantity is bounded by the stock the way the product page bounds it.
    /// Returns the number of units actually added, or `None` if the product is unknown or out of stock.
    #[instrument(level = "debug", skip(self))]
    pub async fn add_to_cart(&self, product_id: ProductId, quantity: i64) -> Option<u32> {
        let product = self.catalog.find(product_id)?;
        let quantity = product.clamp_quantity(quantity);
        if quantity == 0 {
            self.notices()
                .show(NoticeKind::Error, format!("{} is out of stock", product.name));
            return None;
        }

        self.cart().add(product, quantity).await;
        self.notices()
            .show(NoticeKind::Success, format!("Added {} to cart", product.name));
        Some(quantity)
    }

    /// Put one unit of a saved product into the cart. The product stays in the wishlist.
    #[instrument(level = "debug", skip(self))]
    pub async fn move_to_cart(&self, product_id: ProductId) -> bool {
        let Some(product) = self.wishlist().get(product_id)
        else {
            return false;
        };

        self.cart().add(&product, 1).await;
        self.notices()
            .show(NoticeKind::Success, format!("{} added to cart", product.name));
        true
    }

    /// Toggle a catalog product in the wishlist. `None` if there is no such product.
    pub async fn toggle_wishlist(&self, product_id: ProductId) -> Option<bool> {
        let product = self.catalog.find(product_id)?;
        Some(self.wishlist().toggle(product).await)
    }

    pub async fn add_to_wishlist(&self, product_id: ProductId) -> Result<bool> {
        let product = self
            .catalog
            .find(product_id)
            .ok_or(StoreError::ProductNotFound(product_id))?;
        Ok(self.wishlist().add(product).await)
    }

    pub fn order_summary(&self) -> OrderSummary {
        self.cart().summary(self.tax_rate())
    }

    pub fn is_checking_out(&self) -> bool {
        self.checking_out.load(Ordering::Acquire)
    }

    /// Simulate order placement: wait for the checkout delay, then empty the cart.
    #[instrument(level = "debug", skip(self))]
    pub async fn checkout(&self) -> Result<Receipt> {
        let cart = self.cart();
        if cart.is_empty() {
            return Err(StoreError::EmptyCart);
        }

        if self
            .checking_out
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(StoreError::CheckoutInProgress);
        }
        let _guard = CheckoutGuard(&self.checking_out);

        info!("Checking out {} items", cart.item_count());
        tokio::time::sleep(self.checkout_delay()).await;

        // The cart may have been emptied while waiting.
        if cart.is_empty() {
            return Err(StoreError::EmptyCart);
        }

        let items = cart.items();
        let summary = cart.summary(self.tax_rate());
        cart.clear().await;

        self.notices()
            .show(NoticeKind::Success, "Checkout completed successfully!");
        info!("Checkout completed, total {:.2}", summary.total);

        Ok(Receipt {
            items,
            summary,
            placed_at: Utc::now(),
        })
    }
}
