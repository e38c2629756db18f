mod data_objects;
mod gateway;
mod settlement_database;

pub use data_objects::{MaterializedOrders, OrderFieldSet, ServiceSettlement};
pub use gateway::{GatewayClient, GatewayError, VerifiedMetadata, VerifiedTransaction};
pub use settlement_database::{SettlementDatabase, SettlementError};
