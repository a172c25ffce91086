pub mod balance;
pub mod common;
pub mod gacha;
pub mod history;
pub mod inventory;
pub mod webhook;

pub use balance::*;
pub use common::*;
pub use gacha::*;
pub use history::*;
pub use inventory::*;
pub use webhook::*;
