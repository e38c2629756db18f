use mps_common::Kobo;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{DeliveryDetails, StagedLineItem},
    helpers::CommissionSplit,
};

/// The checkout payload a trigger may carry inline (the redirect flow posts the cart back alongside the
/// reference). When absent, the pipeline falls back to the staged intent in the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StagedCheckout {
    pub lines: Vec<StagedLineItem>,
    pub delivery: Option<DeliveryDetails>,
}

/// What the pipeline did for a confirmed payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Disposition {
    OrdersCreated {
        count: usize,
        /// True when a previous or concurrent invocation had already materialized the rows.
        already_existed: bool,
    },
    ServiceRequestSettled {
        service_request_id: i64,
        already_paid: bool,
    },
    /// The charge is confirmed but order creation failed; money is accounted for, fulfillment needs a human.
    Degraded {
        reason: String,
    },
}

/// Returned for every invocation in which the gateway confirmed the charge, including degraded ones. Gateway
/// rejections and unreachable gateways surface as errors instead; those are the only paths on which the
/// caller may tell the customer the payment did not go through.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementOutcome {
    pub reference: String,
    pub amount: Kobo,
    pub split: CommissionSplit,
    pub disposition: Disposition,
}

impl SettlementOutcome {
    pub fn is_degraded(&self) -> bool {
        matches!(self.disposition, Disposition::Degraded { .. })
    }

    pub fn orders_created(&self) -> Option<usize> {
        match &self.disposition {
            Disposition::OrdersCreated { count, .. } => Some(*count),
            _ => None,
        }
    }

    pub fn service_request_id(&self) -> Option<i64> {
        match &self.disposition {
            Disposition::ServiceRequestSettled { service_request_id, .. } => Some(*service_request_id),
            _ => None,
        }
    }
}
