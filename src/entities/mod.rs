pub mod currency_balances;
pub mod draw_history;
pub mod fulfillment_orders;
pub mod inventory_entries;
pub mod pool_items;
pub mod processed_payments;

pub use currency_balances as currency_balance_entity;
pub use draw_history as draw_history_entity;
pub use fulfillment_orders as fulfillment_order_entity;
pub use inventory_entries as inventory_entry_entity;
pub use pool_items as pool_item_entity;
pub use processed_payments as processed_payment_entity;

pub use draw_history::OutcomeStatus;
pub use fulfillment_orders::FulfillmentStatus;
pub use inventory_entries::InventoryStatus;
pub use pool_items::Rank;
