pub mod balance_service;
pub mod credit_service;
pub mod draw_service;
pub mod fulfillment_service;
pub mod history_service;
pub mod inventory_service;
pub mod pool_service;
pub mod weighted_selector;

pub use balance_service::*;
pub use credit_service::*;
pub use draw_service::*;
pub use fulfillment_service::*;
pub use history_service::*;
pub use inventory_service::*;
pub use pool_service::*;
