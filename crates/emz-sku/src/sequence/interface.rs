use core::future::Future;

use serde::{Deserialize, Serialize};

use crate::{Prefix, Result};

/// A persisted per-prefix counter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceCounter {
    pub prefix: Prefix,
    pub last_value: u64,
}

/// Durable, linearizable per-prefix counters.
///
/// Every mutation is a single atomic operation in the backing store; callers
/// never read a value and write it back themselves.
pub trait SequenceStore: Send + Sync {
    /// Allocates the next sequence number for `prefix`.
    ///
    /// The first call for a prefix returns `1`. Each later call returns the
    /// previous value plus one. Concurrent callers for the same prefix never
    /// observe the same value.
    ///
    /// # Errors
    ///
    /// - [`Error::StorageUnavailable`] if the store cannot be reached. No
    ///   value is consumed unless the store committed before failing.
    /// - [`Error::InvariantViolation`] if the stored value is corrupt. The
    ///   corrupt value is left untouched.
    ///
    /// [`Error::StorageUnavailable`]: crate::Error::StorageUnavailable
    /// [`Error::InvariantViolation`]: crate::Error::InvariantViolation
    fn allocate(&self, prefix: &Prefix) -> impl Future<Output = Result<u64>> + Send;

    /// Returns the last allocated value for `prefix` without changing it.
    ///
    /// # Errors
    ///
    /// Same as [`SequenceStore::allocate`].
    fn current(&self, prefix: &Prefix) -> impl Future<Output = Result<Option<u64>>> + Send;

    /// Raises the counter for `prefix` to at least `floor` and returns the
    /// resulting value. Never lowers a counter.
    ///
    /// Used to seed counters from item numbers issued before the store
    /// existed.
    ///
    /// # Errors
    ///
    /// Same as [`SequenceStore::allocate`].
    fn advance_to(&self, prefix: &Prefix, floor: u64)
    -> impl Future<Output = Result<u64>> + Send;

    /// Lists every counter, ordered by prefix.
    ///
    /// # Errors
    ///
    /// Same as [`SequenceStore::allocate`].
    fn counters(&self) -> impl Future<Output = Result<Vec<SequenceCounter>>> + Send;
}
