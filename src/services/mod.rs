pub mod deletion_index;
pub mod reconciler;
pub mod session;
pub mod settings_store;
pub mod store_client;
pub mod transfer_service;

#[cfg(test)]
pub(crate) mod memory_store;
