//----------------------------------------------   Webhook  ----------------------------------------------------

use actix_web::{web, HttpRequest, HttpResponse};
use log::{debug, info, trace, warn};
use marketplace_payment_engine::{
    db_types::TriggerSource,
    traits::{GatewayClient, SettlementDatabase},
    GatewayError,
    ReconciliationApi,
    SettlementError,
};

use crate::{data_objects::{JsonResponse, WebhookEvent}, route};

const CHARGE_SUCCESS_EVENT: &str = "charge.success";

route!(paystack_webhook => Post "/webhook" impl SettlementDatabase, GatewayClient);
/// Trigger B: the gateway's asynchronous callback. The HMAC middleware has already authenticated the payload
/// by the time this runs. Delegates into the same reconciliation entry point as the redirect flow, so
/// whichever trigger fires first materializes and the other observes.
///
/// Response codes drive the gateway's redelivery: anything in the 2xx range is final, a 5xx is redelivered.
/// A transient verification failure therefore answers 500 on purpose, and everything else answers 200 — the
/// pipeline is idempotent, so redelivering a settled reference is harmless but pointless.
pub async fn paystack_webhook<B, G>(
    req: HttpRequest,
    body: web::Json<WebhookEvent>,
    api: web::Data<ReconciliationApi<B, G>>,
) -> HttpResponse
where
    B: SettlementDatabase,
    G: GatewayClient,
{
    trace!("💳️ Received webhook request: {}", req.uri());
    let event = body.into_inner();
    if event.event != CHARGE_SUCCESS_EVENT {
        debug!("💳️ Ignoring webhook event '{}'", event.event);
        return HttpResponse::Ok().json(JsonResponse::success("Event ignored."));
    }
    let reference = event.data.reference;
    match api.verify_and_settle(&reference, TriggerSource::Webhook, None).await {
        Ok(outcome) if outcome.is_degraded() => {
            // The charge is confirmed; redelivery cannot help a degraded materialization, a human can.
            warn!("💳️ [{reference}] settled degraded; manual reconciliation required");
            HttpResponse::Ok().json(JsonResponse::failure("Payment received; orders pending manual review."))
        },
        Ok(outcome) => {
            info!(
                "💳️ [{reference}] processed successfully ({} orders)",
                outcome.orders_created().unwrap_or_default()
            );
            HttpResponse::Ok().json(JsonResponse::success("Payment processed successfully."))
        },
        Err(SettlementError::Gateway(GatewayError::Declined { status, .. })) => {
            info!("💳️ [{reference}] declined by gateway ({status}); acknowledging webhook");
            HttpResponse::Ok().json(JsonResponse::failure(format!("Payment failed: {status}")))
        },
        Err(SettlementError::Gateway(e)) => {
            warn!("💳️ [{reference}] could not be verified ({e}); asking the gateway to redeliver");
            HttpResponse::InternalServerError().json(JsonResponse::failure("Verification temporarily unavailable."))
        },
        Err(e) => {
            warn!("💳️ Unexpected error while handling webhook for [{reference}]: {e}");
            HttpResponse::InternalServerError().json(JsonResponse::failure("Unexpected error handling webhook."))
        },
    }
}
