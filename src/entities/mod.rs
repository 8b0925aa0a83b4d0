pub mod cart_item;
pub mod content_block;
pub mod discount_code;
pub mod order;
pub mod payment_method;
pub mod product;
