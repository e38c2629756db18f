//! Marketplace Payment Engine
//!
//! The payment engine owns the one genuinely hard corner of the marketplace: taking an opaque payment
//! reference, verifying it against the external card gateway, and — exactly once, no matter how many times or
//! in what order verification is triggered — converting the staged checkout into durable orders, splitting
//! the money between vendor and platform, and notifying the affected vendors.
//!
//! The library is divided into two main sections:
//! 1. Storage management ([`mod@sqlite`]). SQLite is the supported backend. You should never need to touch
//!    the database directly; use the public API instead. The exception is the data types, which are defined
//!    in [`mod@db_types`] and are public.
//! 2. The public settlement API ([`mod@settlement_api`]). [`ReconciliationApi`] is the single entry point
//!    shared by the client-redirect and gateway-webhook triggers. Backends implement the traits in
//!    [`mod@traits`] to drive it.
//!
//! The engine also emits a `PaymentSettled` event after each successful settlement. A simple hook framework
//! in [`mod@events`] lets deployments attach async side effects without touching the pipeline.

pub mod db_types;
pub mod events;
pub mod helpers;
pub mod settlement_api;
pub mod traits;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(feature = "test_utils")]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use settlement_api::{Disposition, ReconciliationApi, SettlementOutcome, StagedCheckout};
pub use traits::{GatewayClient, GatewayError, SettlementDatabase, SettlementError};
