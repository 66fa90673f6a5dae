pub mod order;
pub mod quote;

pub use order::*;
pub use quote::*;
