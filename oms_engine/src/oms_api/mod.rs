pub mod catalog_api;
pub mod inventory_api;
pub mod order_flow_api;
pub mod order_objects;
pub mod payment_api;
pub mod reconciliation_api;
