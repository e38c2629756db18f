//! Adapter between the engine's gateway boundary and the concrete Paystack client.
//!
//! The engine never sees raw gateway JSON: everything crossing this boundary is converted into the strongly
//! typed [`VerifiedTransaction`], with minor-unit amounts wrapped in [`Kobo`] and loose metadata already
//! validated. A lookup that succeeds but reports a non-success charge becomes a typed decline here, so the
//! pipeline's `Ok` path always means "money received".

use log::debug;
use marketplace_payment_engine::traits::{GatewayClient, GatewayError, VerifiedMetadata, VerifiedTransaction};
use mps_common::Kobo;
use paystack_tools::{PaystackApi, PaystackApiError, PaystackConfig, TransactionData};

use crate::errors::ServerError;

const GATEWAY_SUCCESS: &str = "success";

#[derive(Clone)]
pub struct PaystackGateway {
    api: PaystackApi,
}

impl PaystackGateway {
    pub fn new(config: PaystackConfig) -> Result<Self, ServerError> {
        let api = PaystackApi::new(config).map_err(|e| ServerError::InitializeError(e.to_string()))?;
        Ok(Self { api })
    }
}

impl GatewayClient for PaystackGateway {
    async fn verify(&self, reference: &str) -> Result<VerifiedTransaction, GatewayError> {
        let data = self.api.verify_transaction(reference).await.map_err(classify_api_error)?;
        if data.status != GATEWAY_SUCCESS {
            let raw = serde_json::to_string(&data).unwrap_or_else(|_| data.status.clone());
            return Err(GatewayError::Declined { status: data.status, raw });
        }
        Ok(verified_from_transaction(data))
    }
}

/// 5xx and transport problems are retryable; everything else the gateway said on purpose.
fn classify_api_error(e: PaystackApiError) -> GatewayError {
    match e {
        PaystackApiError::TransportError(m) => GatewayError::Unreachable(m),
        PaystackApiError::Initialization(m) => GatewayError::Unreachable(m),
        PaystackApiError::JsonError(m) => GatewayError::InvalidResponse(m),
        PaystackApiError::QueryError { status, message } if status >= 500 => {
            GatewayError::Unreachable(format!("gateway returned {status}: {message}"))
        },
        PaystackApiError::QueryError { status, message } => {
            GatewayError::Declined { status: status.to_string(), raw: message }
        },
    }
}

fn verified_from_transaction(data: TransactionData) -> VerifiedTransaction {
    let metadata = data
        .metadata
        .map(|m| VerifiedMetadata {
            vendor_id: m.vendor_id,
            food_amount: m.food_amount.map(Kobo::from),
            delivery_fee: m.delivery_fee.map(Kobo::from),
            vat_amount: m.vat_amount.map(Kobo::from),
            service_request_id: m.service_request_id,
            order_id: m.order_id,
            payment_id: m.payment_id,
        })
        .unwrap_or_default();
    debug!("💳️ [{}] verified: {} kobo, fees {:?}", data.reference, data.amount, data.fees);
    VerifiedTransaction {
        reference: data.reference,
        amount: Kobo::from(data.amount),
        currency: data.currency,
        fees: Kobo::from(data.fees.unwrap_or_default()),
        paid_at: data.paid_at,
        gateway_status: data.status,
        metadata,
    }
}

#[cfg(test)]
mod test {
    use mps_common::Kobo;
    use paystack_tools::VerifyResponse;

    use super::verified_from_transaction;

    #[test]
    fn conversion_carries_amounts_and_metadata() {
        let body = r#"{
            "status": true,
            "message": "Verification successful",
            "data": {
                "reference": "MPS-555",
                "status": "success",
                "amount": 11000,
                "currency": "NGN",
                "fees": 165,
                "metadata": {
                    "vendor_id": "vendor-7",
                    "food_amount": 10000,
                    "delivery_fee": "500",
                    "vat_amount": 500,
                    "service_request_id": "31"
                }
            }
        }"#;
        let resp: VerifyResponse = serde_json::from_str(body).unwrap();
        let verified = verified_from_transaction(resp.data.unwrap());
        assert_eq!(verified.reference, "MPS-555");
        assert_eq!(verified.amount, Kobo::from(11_000));
        assert_eq!(verified.fees, Kobo::from(165));
        assert_eq!(verified.gateway_status, "success");
        assert_eq!(verified.metadata.vendor_id.as_deref(), Some("vendor-7"));
        assert_eq!(verified.metadata.food_amount, Some(Kobo::from(10_000)));
        assert_eq!(verified.metadata.delivery_fee, Some(Kobo::from(500)));
        assert_eq!(verified.metadata.service_request_id, Some(31));
    }
}
