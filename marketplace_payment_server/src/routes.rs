//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! Every long operation in these handlers is a future (the gateway call, the store writes); nothing here may
//! block a worker thread.

use actix_web::{get, web, HttpResponse, Responder};
use log::*;
use marketplace_payment_engine::{
    db_types::{NewPaymentIntent, TriggerSource},
    settlement_api::StagedCheckout,
    traits::{GatewayClient, SettlementDatabase},
    GatewayError,
    ReconciliationApi,
    SettlementError,
};

use crate::{
    data_objects::{InitCheckoutRequest, InitCheckoutResponse, SettlementResponse, VerifyPaymentRequest},
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ident),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Checkout  ----------------------------------------------------
route!(init_checkout => Post "/checkout/init" impl SettlementDatabase, GatewayClient);
/// Stages a checkout intent ahead of the gateway charge and returns the commission split, which the client
/// passes to the gateway as the platform-share directive. Idempotent on the reference.
pub async fn init_checkout<B, G>(
    body: web::Json<InitCheckoutRequest>,
    api: web::Data<ReconciliationApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: SettlementDatabase,
    G: GatewayClient,
{
    let req = body.into_inner();
    debug!("💻️ POST checkout/init for [{}]", req.reference);
    let mut intent = NewPaymentIntent::new(req.reference, req.user_id, req.gross_amount);
    intent.vendor_id = req.vendor_id;
    intent.food_amount = req.food_amount.unwrap_or_default();
    intent.delivery_fee = req.delivery_fee.unwrap_or_default();
    intent.tax_amount = req.tax_amount.unwrap_or_default();
    if let Some(currency) = req.currency {
        intent.currency = currency;
    }
    intent.pending_orders = req.pending_orders;
    intent.delivery = req.delivery_details;
    intent.service_request_id = req.service_request_id;
    let (staged, split) = api.stage_checkout(intent).await.map_err(|e| {
        warn!("💻️ Could not stage checkout: {e}");
        ServerError::BackendError(e.to_string())
    })?;
    Ok(HttpResponse::Ok().json(InitCheckoutResponse { success: true, reference: staged.reference, split }))
}

//----------------------------------------------   Verification  ----------------------------------------------------
route!(verify_payment => Post "/payment/verify" impl SettlementDatabase, GatewayClient);
/// Trigger A: the customer's browser posts the reference (and optionally the cart) after the gateway
/// redirects back to the marketplace.
pub async fn verify_payment<B, G>(
    body: web::Json<VerifyPaymentRequest>,
    api: web::Data<ReconciliationApi<B, G>>,
) -> HttpResponse
where
    B: SettlementDatabase,
    G: GatewayClient,
{
    let req = body.into_inner();
    debug!("💻️ POST payment/verify for [{}]", req.reference);
    let staged = req.pending_orders.map(|lines| StagedCheckout { lines, delivery: req.delivery_details });
    settle_and_respond(&req.reference, staged, api.as_ref()).await
}

route!(verify_payment_by_reference => Get "/payment/verify/{reference}" impl SettlementDatabase, GatewayClient);
/// Redirect variant with no body: the staged intent supplies the cart.
pub async fn verify_payment_by_reference<B, G>(
    path: web::Path<String>,
    api: web::Data<ReconciliationApi<B, G>>,
) -> HttpResponse
where
    B: SettlementDatabase,
    G: GatewayClient,
{
    let reference = path.into_inner();
    debug!("💻️ GET payment/verify for [{reference}]");
    settle_and_respond(&reference, None, api.as_ref()).await
}

/// Shared by both redirect handlers. The customer-facing rule: once the gateway confirms the charge, the
/// response must read as "payment received", whatever happened downstream.
async fn settle_and_respond<B, G>(
    reference: &str,
    staged: Option<StagedCheckout>,
    api: &ReconciliationApi<B, G>,
) -> HttpResponse
where
    B: SettlementDatabase,
    G: GatewayClient,
{
    match api.verify_and_settle(reference, TriggerSource::Redirect, staged).await {
        Ok(outcome) => HttpResponse::Ok().json(SettlementResponse::from_outcome(&outcome)),
        Err(SettlementError::Gateway(GatewayError::Declined { status, .. })) => {
            info!("💻️ [{reference}] was declined by the gateway ({status})");
            HttpResponse::Ok().json(SettlementResponse::failure(reference, format!("Payment failed: {status}")))
        },
        Err(SettlementError::Gateway(e)) => {
            warn!("💻️ [{reference}] could not be verified: {e}");
            HttpResponse::BadGateway().json(SettlementResponse::failure(reference, e))
        },
        Err(e) => {
            warn!("💻️ Unexpected error verifying [{reference}]: {e}");
            HttpResponse::InternalServerError().json(SettlementResponse::failure(reference, e))
        },
    }
}
