mod order_number;

pub use order_number::{extract_order_numbers_from_description, generate_order_number, ORDER_NUMBER_PREFIX};
