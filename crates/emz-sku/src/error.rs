/// A result type defaulting to the crate's [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// All errors `emz-sku` can produce.
///
/// Code derivation and item number formatting are total and never fail. Only
/// the sequence and item stores can, and their failures are surfaced to the
/// caller unchanged; no variant is ever recovered by fabricating a sequence
/// number.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The caller supplied missing or malformed input (empty brand/model,
    /// empty item id, unparsable prefix). Not retryable.
    #[error("validation failed: {reason}")]
    Validation { reason: String },

    /// The durable store could not be reached or rejected the operation.
    ///
    /// When raised by `allocate`, no value was consumed unless the store
    /// committed before failing to acknowledge; retrying may leave a gap but
    /// never issues a duplicate.
    #[error("storage unavailable: {context}")]
    StorageUnavailable { context: String },

    /// Persisted state is corrupt (a counter that is negative, zero after an
    /// increment, or not an integer; an item number that does not parse).
    ///
    /// Fatal for `key`. The value is never auto-repaired.
    #[error("invariant violated for `{key}`: {detail}")]
    InvariantViolation { key: String, detail: String },

    /// The allocation did not complete within the configured bound.
    ///
    /// The outcome is unknown: the counter may or may not have advanced.
    #[error("allocation for prefix `{prefix}` timed out; outcome unknown")]
    AllocationTimedOut { prefix: String },

    /// No item exists with the given id.
    #[error("item `{id}` not found")]
    ItemNotFound { id: String },
}

impl Error {
    pub(crate) fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    #[cfg_attr(not(any(feature = "redb", feature = "postgres")), allow(dead_code))]
    pub(crate) fn storage(context: impl core::fmt::Display) -> Self {
        Self::StorageUnavailable {
            context: context.to_string(),
        }
    }

    pub(crate) fn invariant(key: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::InvariantViolation {
            key: key.into(),
            detail: detail.into(),
        }
    }

    /// Whether retrying the same call later may succeed.
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::StorageUnavailable { .. } | Self::AllocationTimedOut { .. }
        )
    }
}
