//! Storage backends implementing both [`SequenceStore`] and [`ItemStore`].
//!
//! | Backend          | Feature    | Durable | Shared across processes |
//! |------------------|------------|---------|-------------------------|
//! | [`MemoryBackend`] | -         | no      | no                      |
//! | `RedbBackend`     | `redb`    | yes     | no                      |
//! | `PgBackend`       | `postgres`| yes     | yes                     |

mod memory;
#[cfg(feature = "postgres")]
mod postgres;
#[cfg(feature = "redb")]
mod redb;

pub use memory::*;
#[cfg(feature = "postgres")]
pub use postgres::*;
#[cfg(feature = "redb")]
pub use redb::*;

use crate::{
    Item, ItemDetails, ItemNumber, ItemStore, Prefix, Result, SequenceCounter, SequenceStore,
};

/// A backend chosen at runtime, e.g. from configuration.
#[derive(Clone)]
pub enum Backend {
    Memory(MemoryBackend),
    #[cfg(feature = "redb")]
    Redb(RedbBackend),
    #[cfg(feature = "postgres")]
    Postgres(PgBackend),
}

macro_rules! dispatch {
    ($self:ident, $backend:ident => $call:expr) => {
        match $self {
            Backend::Memory($backend) => $call,
            #[cfg(feature = "redb")]
            Backend::Redb($backend) => $call,
            #[cfg(feature = "postgres")]
            Backend::Postgres($backend) => $call,
        }
    };
}

impl Backend {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            #[cfg(feature = "redb")]
            Self::Redb(_) => "redb",
            #[cfg(feature = "postgres")]
            Self::Postgres(_) => "postgres",
        }
    }
}

impl From<MemoryBackend> for Backend {
    fn from(backend: MemoryBackend) -> Self {
        Self::Memory(backend)
    }
}

#[cfg(feature = "redb")]
impl From<RedbBackend> for Backend {
    fn from(backend: RedbBackend) -> Self {
        Self::Redb(backend)
    }
}

#[cfg(feature = "postgres")]
impl From<PgBackend> for Backend {
    fn from(backend: PgBackend) -> Self {
        Self::Postgres(backend)
    }
}

impl SequenceStore for Backend {
    async fn allocate(&self, prefix: &Prefix) -> Result<u64> {
        dispatch!(self, backend => backend.allocate(prefix).await)
    }

    async fn current(&self, prefix: &Prefix) -> Result<Option<u64>> {
        dispatch!(self, backend => backend.current(prefix).await)
    }

    async fn advance_to(&self, prefix: &Prefix, floor: u64) -> Result<u64> {
        dispatch!(self, backend => backend.advance_to(prefix, floor).await)
    }

    async fn counters(&self) -> Result<Vec<SequenceCounter>> {
        dispatch!(self, backend => backend.counters().await)
    }
}

impl ItemStore for Backend {
    async fn get(&self, id: &str) -> Result<Option<Item>> {
        dispatch!(self, backend => backend.get(id).await)
    }

    async fn save_details(&self, id: &str, details: &ItemDetails) -> Result<Item> {
        dispatch!(self, backend => backend.save_details(id, details).await)
    }

    async fn lock_item_number(&self, id: &str, number: &ItemNumber) -> Result<Item> {
        dispatch!(self, backend => backend.lock_item_number(id, number).await)
    }

    async fn replace_item_number(&self, id: &str, number: &ItemNumber) -> Result<Item> {
        dispatch!(self, backend => backend.replace_item_number(id, number).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dispatches_to_the_wrapped_backend() {
        let inner = MemoryBackend::new();
        let backend = Backend::from(inner.clone());
        let prefix = Prefix::new("LV", "SPD");

        assert_eq!(backend.name(), "memory");
        assert_eq!(backend.allocate(&prefix).await.unwrap(), 1);
        assert_eq!(inner.current(&prefix).await.unwrap(), Some(1));
    }
}
