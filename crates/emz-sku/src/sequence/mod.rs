mod interface;
#[cfg(test)]
pub(crate) mod tests;

pub use interface::*;
