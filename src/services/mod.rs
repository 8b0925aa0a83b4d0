// Storefront stores
pub mod cart;
pub mod catalog;
pub mod content;
pub mod discounts;
pub mod payment_methods;

// Order lifecycle
pub mod confirmation;
pub mod orders;
