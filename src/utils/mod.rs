mod hash;
mod validation;

pub use hash::*;
pub use validation::*;
