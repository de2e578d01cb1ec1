//! # b-ec-store
//!
//! Client-side state for the B-EC storefront: a read-only product catalog with URL-driven category filtering, a
//! shopping cart and a wishlist. Nothing here talks to a server. The stores keep their state in memory and mirror it
//! into a key-value [`StorageBackend`], the way a browser application mirrors its state into local storage.
//!
//! # The Basics
//!
//! - The [`Catalog`](catalog::Catalog) is static. It is loaded once from a JSON array of products and never changes.
//! - [`CatalogFilter`](catalog::CatalogFilter) reads `mainCategory` and `category` from a listing URL query string.
//!   Both are optional and combine with AND semantics.
//! - The [`Cart`](cart::Cart) keeps `(product, quantity)` entries. Adding an existing product accumulates its quantity,
//!   driving a quantity to zero removes the entry. Item count and total are always derived, never stored.
//! - The [`Wishlist`](wishlist::Wishlist) is a set of saved products with add, remove and toggle.
//! - Both stores persist every change under the `cart` and `wishlist` keys as JSON arrays. A failed read leaves the
//!   store empty, a failed write leaves the in-memory state intact. Either way the error is logged and handed over to
//!   the [`StoreObserver`] rather than returned.
//! - The [`Storefront`] ties it all together and adds what the pages of the shop do on top of the stores: stock-bound
//!   quantity selection, moving saved products to the cart, order summary and a simulated checkout.
//!
//! ```ignore
//! let shop = Storefront::builder()
//!     .catalog(Catalog::load("catalog.json").await?)
//!     .storage(Arc::new(MemoryStorage::new()))
//!     .build()?;
//! shop.load().await;
//!
//! shop.add_to_cart(3, 2).await;
//! shop.toggle_wishlist(5).await;
//! println!("Total: {:.2}", shop.order_summary().total);
//! ```

#[cfg(feature = "cli")]
pub mod app;
pub mod cart;
pub mod catalog;
pub mod error;
pub mod notice;
pub(crate) mod persist;
pub mod storage;
pub mod storefront;
pub mod traits;
pub mod types;
pub mod wishlist;

#[doc(inline)]
pub use persist::CART_KEY;
#[doc(inline)]
pub use persist::WISHLIST_KEY;
#[doc(inline)]
pub use storefront::Storefront;
#[doc(inline)]
pub use traits::StorageBackend;
#[doc(inline)]
pub use traits::StoreObserver;

pub mod prelude {
    pub use crate::cart::Cart;
    pub use crate::catalog::Catalog;
    pub use crate::catalog::CatalogFilter;
    pub use crate::error::Result;
    pub use crate::error::StoreError;
    pub use crate::notice::Notice;
    pub use crate::notice::NoticeBoard;
    pub use crate::storage::FileStorage;
    pub use crate::storage::MemoryStorage;
    pub use crate::storefront::Storefront;
    pub use crate::traits::StorageBackend;
    pub use crate::traits::StoreObserver;
    pub use crate::types::*;
    pub use crate::wishlist::Wishlist;
}
