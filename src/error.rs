use thiserror::Error;

use crate::types::ProductId;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid storage key '{0}'")]
    InvalidKey(String),

    #[error("Product {0} not found")]
    ProductNotFound(ProductId),

    #[error("Product id {0} appears more than once in the catalog")]
    DuplicateProduct(ProductId),

    #[error("Product {0} has an invalid price")]
    InvalidPrice(ProductId),

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Checkout is already in progress")]
    CheckoutInProgress,
}

pub type Result<T, E = StoreError> = std::result::Result<T, E>;
