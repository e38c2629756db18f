use mps_common::Kobo;
use serde::{Deserialize, Serialize};

/// Published after a verification run settles a payment (first-time or duplicate alike). Subscribers get a
/// read-only fact; the store-backed notification guard, not this channel, is what keeps side effects
/// exactly-once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSettledEvent {
    pub reference: String,
    pub amount: Kobo,
    pub orders_created: usize,
}
