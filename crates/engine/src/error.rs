use atelier_core::CoreError;
use atelier_storage::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("order not found: {0}")]
    OrderNotFound(String),

    #[error("product not found: {0}")]
    ProductNotFound(String),
}
