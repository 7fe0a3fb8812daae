use core::time::Duration;
use std::sync::Arc;

use serde::Serialize;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{CodeDeriver, Error, ItemNumber, Prefix, Result, SequenceStore};

/// The outcome of a successful allocation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Allocation {
    pub item_number: ItemNumber,
    pub brand_code: String,
    pub model_code: String,
    pub sequence: u64,
}

impl From<ItemNumber> for Allocation {
    fn from(item_number: ItemNumber) -> Self {
        Self {
            brand_code: item_number.brand_code().to_string(),
            model_code: item_number.model_code().to_string(),
            sequence: item_number.sequence(),
            item_number,
        }
    }
}

/// Derives codes, allocates a sequence number and formats the item number.
///
/// This is the only path through which sequence numbers are issued. It holds
/// no counter state of its own; the [`SequenceStore`] is the sole source of
/// truth.
///
/// # Example
/// ```
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// use emz_sku::{SkuAllocator, backend::MemoryBackend};
///
/// let allocator = SkuAllocator::new(MemoryBackend::new());
/// let first = allocator.allocate("Louis Vuitton", "Speedy 30").await.unwrap();
/// assert_eq!(first.item_number.to_string(), "LV-SPD-EMZ-001");
/// # }
/// ```
pub struct SkuAllocator<S> {
    deriver: Arc<CodeDeriver>,
    store: S,
    timeout: Option<Duration>,
}

impl<S: Clone> Clone for SkuAllocator<S> {
    fn clone(&self) -> Self {
        Self {
            deriver: Arc::clone(&self.deriver),
            store: self.store.clone(),
            timeout: self.timeout,
        }
    }
}

impl<S> SkuAllocator<S>
where
    S: SequenceStore,
{
    /// Creates an allocator with the built-in code tables and no timeout.
    pub fn new(store: S) -> Self {
        Self {
            deriver: Arc::new(CodeDeriver::default()),
            store,
            timeout: None,
        }
    }

    #[must_use]
    pub fn with_deriver(mut self, deriver: CodeDeriver) -> Self {
        self.deriver = Arc::new(deriver);
        self
    }

    /// Bounds every store call. An expired call yields
    /// [`Error::AllocationTimedOut`] and its outcome is unknown.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn deriver(&self) -> &CodeDeriver {
        &self.deriver
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Derives the prefix without allocating anything.
    pub fn derive(&self, brand: &str, model: &str) -> Prefix {
        self.deriver.prefix(brand, model)
    }

    /// Allocates a new item number for `brand`/`model`.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] if `brand` or `model` is blank.
    /// - Any error of [`SequenceStore::allocate`], unchanged.
    /// - [`Error::AllocationTimedOut`] if a timeout is configured and expires.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self), err))]
    pub async fn allocate(&self, brand: &str, model: &str) -> Result<Allocation> {
        require_text("brand", brand)?;
        require_text("model", model)?;

        let prefix = self.derive(brand, model);
        let sequence = self.allocate_prefix(&prefix).await?;
        Ok(ItemNumber::new(prefix, sequence).into())
    }

    /// Allocates the next sequence number for an already-derived prefix.
    ///
    /// # Errors
    ///
    /// See [`SkuAllocator::allocate`].
    pub async fn allocate_prefix(&self, prefix: &Prefix) -> Result<u64> {
        let pending = self.store.allocate(prefix);
        let sequence = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, pending)
                .await
                .map_err(|_| Error::AllocationTimedOut {
                    prefix: prefix.to_string(),
                })??,
            None => pending.await?,
        };

        if sequence == 0 {
            return Err(Error::InvariantViolation {
                key: prefix.to_string(),
                detail: "store allocated 0".to_string(),
            });
        }
        Ok(sequence)
    }
}

pub(crate) fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::validation(format!("`{field}` must not be empty")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::sequence::tests::StalledStore;

    #[tokio::test]
    async fn allocates_formatted_item_numbers() {
        let allocator = SkuAllocator::new(MemoryBackend::new());

        let first = allocator.allocate("Louis Vuitton", "Speedy 30").await.unwrap();
        let second = allocator.allocate("LV", "speedy bandouliere").await.unwrap();

        assert_eq!(first.item_number.to_string(), "LV-SPD-EMZ-001");
        assert_eq!(first.brand_code, "LV");
        assert_eq!(first.model_code, "SPD");
        assert_eq!(first.sequence, 1);
        assert_eq!(second.item_number.to_string(), "LV-SPD-EMZ-002");
    }

    #[tokio::test]
    async fn unknown_inputs_share_the_generic_prefix() {
        let allocator = SkuAllocator::new(MemoryBackend::new());
        let allocation = allocator.allocate("No Name", "???").await.unwrap();
        assert_eq!(allocation.item_number.to_string(), "BR-GEN-GEN-EMZ-001");
    }

    #[tokio::test]
    async fn blank_input_is_rejected_before_allocating() {
        let store = MemoryBackend::new();
        let allocator = SkuAllocator::new(store.clone());

        let err = allocator.allocate("  ", "Speedy").await.unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
        let err = allocator.allocate("Chanel", "").await.unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));

        assert!(store.counters().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn timeout_reports_unknown_outcome() {
        let allocator = SkuAllocator::new(StalledStore).with_timeout(Duration::from_millis(10));
        let err = allocator.allocate("Chanel", "Boy").await.unwrap_err();
        assert_eq!(
            err,
            Error::AllocationTimedOut {
                prefix: "CH-BOY".to_string()
            }
        );
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn custom_deriver_is_used() {
        let rules = crate::RuleSet::from_json(
            r#"{ "inherit": true, "brands": [{ "code": "TB", "keywords": ["tory"] }] }"#,
        )
        .unwrap();
        let allocator =
            SkuAllocator::new(MemoryBackend::new()).with_deriver(CodeDeriver::new(rules));
        let allocation = allocator.allocate("Tory Burch", "Fleming Tote").await.unwrap();
        assert_eq!(allocation.item_number.to_string(), "TB-TOT-EMZ-001");
    }
}
