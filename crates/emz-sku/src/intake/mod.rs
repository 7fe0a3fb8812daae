mod interface;
mod item;
mod service;
#[cfg(test)]
pub(crate) mod tests;

pub use interface::*;
pub use item::*;
pub use service::*;
