use serde::{Deserialize, Serialize};

use crate::ItemNumber;

/// The editable identity fields of an intake item.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDetails {
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl ItemDetails {
    pub fn new(brand: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            brand: brand.into(),
            model: model.into(),
            title: None,
        }
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// An intake item as persisted.
///
/// `item_number_locked` implies `item_number` is set. Once locked, saves
/// never re-derive the item number; only an explicit reassignment replaces
/// it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    #[serde(flatten)]
    pub details: ItemDetails,
    pub item_number: Option<ItemNumber>,
    pub item_number_locked: bool,
}

impl Item {
    /// A new, unlocked item without an item number.
    pub fn new(id: impl Into<String>, details: ItemDetails) -> Self {
        Self {
            id: id.into(),
            details,
            item_number: None,
            item_number_locked: false,
        }
    }

    /// Sets and locks the item number if the item is still unlocked.
    ///
    /// Returns whether the number was applied.
    pub fn lock_item_number(&mut self, number: &ItemNumber) -> bool {
        if self.item_number_locked {
            return false;
        }
        self.item_number = Some(number.clone());
        self.item_number_locked = true;
        true
    }

    /// Sets and locks the item number unconditionally.
    pub fn replace_item_number(&mut self, number: &ItemNumber) {
        self.item_number = Some(number.clone());
        self.item_number_locked = true;
    }
}
