//! Item number allocation for luxury-goods intake.
//!
//! An item number has the shape `{brand_code}-{model_code}-EMZ-{sequence}`,
//! e.g. `LV-SPD-EMZ-007`:
//!
//! - [`CodeDeriver`] maps free-text brand and model names to short codes
//!   using ordered keyword tables ([`RuleSet`]). Derivation is pure and
//!   never fails.
//! - A [`SequenceStore`] owns one counter per `{brand_code}-{model_code}`
//!   [`Prefix`] and increments it atomically. See [`backend`] for the
//!   in-memory, redb and Postgres implementations.
//! - [`SkuAllocator`] ties both together and formats the [`ItemNumber`].
//! - [`Intake`] assigns an item number on an item's first save and locks it
//!   so later edits never renumber the item.
//!
//! ## Features
//!
//! - `redb`: embedded single-file [`backend::RedbBackend`].
//! - `postgres`: [`backend::PgBackend`] on `sqlx`.
//! - `tracing`: spans and events via `tracing`.

mod allocator;
pub mod backend;
mod code;
mod error;
mod intake;
mod item_number;
pub mod schema;
mod sequence;

pub use crate::allocator::*;
pub use crate::code::*;
pub use crate::error::*;
pub use crate::intake::*;
pub use crate::item_number::*;
pub use crate::sequence::*;
