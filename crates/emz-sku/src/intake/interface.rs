use core::future::Future;

use crate::{Item, ItemDetails, ItemNumber, Result};

/// Persistence for intake items.
///
/// The store owns the lock transition: [`ItemStore::lock_item_number`] must
/// be a conditional write that only succeeds while the item is unlocked, so
/// two concurrent first saves can never both assign a number.
pub trait ItemStore: Send + Sync {
    fn get(&self, id: &str) -> impl Future<Output = Result<Option<Item>>> + Send;

    /// Creates the item, or updates its details if it exists.
    ///
    /// Never touches `item_number` or `item_number_locked`.
    fn save_details(
        &self,
        id: &str,
        details: &ItemDetails,
    ) -> impl Future<Output = Result<Item>> + Send;

    /// Sets `number` and locks the item, unless it is already locked.
    ///
    /// Returns the item as stored afterwards, which carries the previously
    /// locked number if this call lost.
    ///
    /// # Errors
    ///
    /// [`Error::ItemNotFound`](crate::Error::ItemNotFound) if the item does
    /// not exist.
    fn lock_item_number(
        &self,
        id: &str,
        number: &ItemNumber,
    ) -> impl Future<Output = Result<Item>> + Send;

    /// Sets `number` and locks the item, replacing any previous number.
    ///
    /// # Errors
    ///
    /// [`Error::ItemNotFound`](crate::Error::ItemNotFound) if the item does
    /// not exist.
    fn replace_item_number(
        &self,
        id: &str,
        number: &ItemNumber,
    ) -> impl Future<Output = Result<Item>> + Send;
}
