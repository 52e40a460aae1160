pub type Result<T> = std::result::Result<T, CacheError>;

/// Errors produced by cache construction and capacity changes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    #[error("cache capacity must be non-negative, got {capacity}")]
    NegativeCapacity { capacity: i64 },
}
