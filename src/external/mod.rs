pub mod haravan;

pub use haravan::*;
