pub mod notifier;
pub mod reconciliation_api;
pub mod settlement_objects;

pub use reconciliation_api::ReconciliationApi;
pub use settlement_objects::{Disposition, SettlementOutcome, StagedCheckout};
