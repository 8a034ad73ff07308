pub mod cart_store;
pub mod cart_sync;
pub mod cart_writer;
pub mod checkout;
pub mod confirmation;
pub mod contact;
pub mod reconciler;
pub mod webhook;
