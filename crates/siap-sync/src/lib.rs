//! Sync layer: the remote data service client and boundary decoding of its records.

pub mod http;
pub mod wire;

pub use http::{DataServiceClient, SyncError};
pub use wire::{decode_school, decode_schools, decode_visit, decode_visits};
