#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    Error, Item, ItemDetails, ItemStore, Result, SequenceStore, SkuAllocator,
    allocator::require_text,
};

/// Saves intake items and assigns their item number exactly once.
///
/// The first save of an item allocates and locks its item number. Later saves
/// update brand, model and title but leave the number alone, even when the
/// brand or model text changes. [`Intake::reassign`] is the only way to issue
/// a new number for a locked item.
pub struct Intake<S, I> {
    allocator: SkuAllocator<S>,
    items: I,
}

impl<S: Clone, I: Clone> Clone for Intake<S, I> {
    fn clone(&self) -> Self {
        Self {
            allocator: self.allocator.clone(),
            items: self.items.clone(),
        }
    }
}

impl<S, I> Intake<S, I>
where
    S: SequenceStore,
    I: ItemStore,
{
    pub const fn new(allocator: SkuAllocator<S>, items: I) -> Self {
        Self { allocator, items }
    }

    pub const fn allocator(&self) -> &SkuAllocator<S> {
        &self.allocator
    }

    pub const fn items(&self) -> &I {
        &self.items
    }

    /// # Errors
    ///
    /// [`Error::ItemNotFound`] if no item has this id, or a store error.
    pub async fn get(&self, id: &str) -> Result<Item> {
        self.items
            .get(id)
            .await?
            .ok_or_else(|| Error::ItemNotFound { id: id.to_string() })
    }

    /// Persists `details` and, on first save, assigns the item number.
    ///
    /// If two first saves of the same item race, both may allocate but only
    /// one number is locked; the other sequence value is left unused.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] if `id`, brand or model is blank.
    /// - Any store error, unchanged. The item is then saved but still
    ///   unlocked, and a later save retries the allocation.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self, details), err))]
    pub async fn save(&self, id: &str, details: ItemDetails) -> Result<Item> {
        require_text("id", id)?;
        require_text("brand", &details.brand)?;
        require_text("model", &details.model)?;

        let item = self.items.save_details(id, &details).await?;
        if item.item_number_locked {
            return Ok(item);
        }

        let allocation = self
            .allocator
            .allocate(&item.details.brand, &item.details.model)
            .await?;
        let item = self
            .items
            .lock_item_number(id, &allocation.item_number)
            .await?;

        if item.item_number.as_ref() != Some(&allocation.item_number) {
            #[cfg(feature = "tracing")]
            tracing::warn!(
                unused = %allocation.item_number,
                "item was locked concurrently; allocated number left unused"
            );
        }
        Ok(item)
    }

    /// Explicitly resets the item number: re-derives codes from the current
    /// brand and model, allocates a new number and replaces the locked one.
    ///
    /// # Errors
    ///
    /// [`Error::ItemNotFound`] if the item does not exist, or any allocation
    /// error. On error the previous number stays in place.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self), err))]
    pub async fn reassign(&self, id: &str) -> Result<Item> {
        let item = self.get(id).await?;
        let allocation = self
            .allocator
            .allocate(&item.details.brand, &item.details.model)
            .await?;
        self.items
            .replace_item_number(id, &allocation.item_number)
            .await
    }
}
