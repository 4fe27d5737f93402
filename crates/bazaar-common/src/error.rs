use thiserror::Error;

/// Errors from the replica store. All variants are transient from the
/// indexer's point of view: callers retry the same event later and rely on
/// the idempotency guard to absorb the replay.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt stored value: {0}")]
    Corrupt(String),
}
