mod api;
mod config;
mod error;

mod data_objects;

pub use api::PaystackApi;
pub use config::PaystackConfig;
pub use data_objects::{TransactionData, TransactionMetadata, VerifyResponse};
pub use error::PaystackApiError;
