//! Client-side manager for a bucket reached through a single pre-authenticated
//! request URL, with a soft-delete layer kept as a JSON index in the bucket.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod paths;
pub mod services;

pub use errors::{IndexError, SessionError, SettingsError, StoreError, TransferError};
pub use services::{
    deletion_index::{Confirmed, DeletionIndex},
    session::{ManagerEvent, Session},
    store_client::{HttpObjectStore, ObjectStore},
};
