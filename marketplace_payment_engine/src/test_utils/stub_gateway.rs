use std::{collections::HashMap, sync::Arc};

use mps_common::Kobo;

use crate::traits::{GatewayClient, GatewayError, VerifiedMetadata, VerifiedTransaction};

/// A canned gateway for tests: responds to known references with a fixed transaction, declines references
/// registered as failures, and reports everything else as unreachable.
#[derive(Clone, Default)]
pub struct StubGateway {
    transactions: Arc<HashMap<String, VerifiedTransaction>>,
    declined: Arc<HashMap<String, String>>,
}

impl StubGateway {
    pub fn new(transactions: Vec<VerifiedTransaction>, declined: Vec<(String, String)>) -> Self {
        let transactions = transactions.into_iter().map(|t| (t.reference.clone(), t)).collect();
        let declined = declined.into_iter().collect();
        Self { transactions: Arc::new(transactions), declined: Arc::new(declined) }
    }

    pub fn single(txn: VerifiedTransaction) -> Self {
        Self::new(vec![txn], Vec::new())
    }
}

impl GatewayClient for StubGateway {
    async fn verify(&self, reference: &str) -> Result<VerifiedTransaction, GatewayError> {
        if let Some(txn) = self.transactions.get(reference) {
            return Ok(txn.clone());
        }
        if let Some(status) = self.declined.get(reference) {
            return Err(GatewayError::Declined {
                status: status.clone(),
                raw: format!("{{\"status\":\"{status}\"}}"),
            });
        }
        Err(GatewayError::Unreachable(format!("no stubbed response for {reference}")))
    }
}

/// A successful transaction with the given amounts and no metadata; tests fill in what they need.
pub fn successful_txn(reference: &str, amount: i64) -> VerifiedTransaction {
    VerifiedTransaction {
        reference: reference.to_string(),
        amount: Kobo::from(amount),
        currency: mps_common::NAIRA_CURRENCY_CODE.to_string(),
        fees: Kobo::from(0),
        paid_at: None,
        gateway_status: "success".to_string(),
        metadata: VerifiedMetadata::default(),
    }
}
