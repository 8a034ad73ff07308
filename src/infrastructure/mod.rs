pub mod cart_repo;
pub mod mailer;
pub mod memory;
pub mod models;
pub mod order_store;
pub mod payment;

#[cfg(test)]
mod test_db;
