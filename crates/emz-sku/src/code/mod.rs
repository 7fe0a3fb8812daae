mod deriver;
mod rules;

pub use deriver::*;
pub use rules::*;
