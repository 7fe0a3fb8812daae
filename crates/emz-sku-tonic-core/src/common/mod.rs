mod convert;
mod error;

pub use error::*;
