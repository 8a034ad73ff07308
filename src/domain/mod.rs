pub mod cart;
pub mod catalog;
pub mod country;
pub mod errors;
pub mod money;
pub mod order;
pub mod payment;
pub mod ports;
pub mod pricing;
pub mod shipping;
