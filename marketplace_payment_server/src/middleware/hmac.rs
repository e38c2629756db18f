//! HMAC middleware for Actix Web.
//!
//! The card gateway signs every webhook delivery with an HMAC-SHA512 over the raw request body, keyed with
//! the account's secret key, and sends the hex digest in the `x-paystack-signature` header.
//!
//! This middleware verifies that signature before the payload reaches any handler. A missing or wrong
//! signature is rejected with 403 and causes no side effects of any kind; in particular the store is never
//! touched. Wrap the webhook scope with it.

use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_http::h1;
use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    error::{ErrorBadRequest, ErrorForbidden},
    web,
    Error,
};
use futures::future::LocalBoxFuture;
use log::{trace, warn};
use mps_common::Secret;

use crate::helpers::calculate_hmac;

pub struct HmacMiddlewareFactory {
    hmac_header: String,
    key: Secret<String>,
    // If false, then the middleware will not check the HMAC signature and always allow the call
    enabled: bool,
}

impl HmacMiddlewareFactory {
    pub fn new(hmac_header: &str, key: Secret<String>, enabled: bool) -> Self {
        HmacMiddlewareFactory { hmac_header: hmac_header.into(), key, enabled }
    }
}

impl<S, B> Transform<S, ServiceRequest> for HmacMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = HmacMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(HmacMiddlewareService {
            hmac_header: self.hmac_header.clone(),
            key: self.key.clone(),
            enabled: self.enabled,
            service: Rc::new(service),
        }))
    }
}

pub struct HmacMiddlewareService<S> {
    hmac_header: String,
    key: Secret<String>,
    enabled: bool,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for HmacMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let secret = self.key.reveal().clone();
        let hmac_header = self.hmac_header.clone();
        let enabled = self.enabled;
        Box::pin(async move {
            trace!("🔐️ Checking HMAC for request");
            if !enabled {
                trace!("🔐️ HMAC checks are disabled. Allowing request.");
                return service.call(req).await;
            }
            let data = req.extract::<web::Bytes>().await.map_err(|e| {
                warn!("🔐️ Failed to extract request data: {:?}", e);
                ErrorBadRequest("Failed to extract request data.")
            })?;
            let hmac_calc = calculate_hmac(&secret, data.as_ref());
            let hmac = req.headers().get(&hmac_header).ok_or_else(|| {
                warn!("🔐️ No HMAC signature found in request. Denying access.");
                ErrorForbidden("No HMAC signature found.")
            })?;
            // The gateway sends lowercase hex, but some SDKs uppercase it.
            let validated = hmac.to_str().map(|h| h.eq_ignore_ascii_case(&hmac_calc)).unwrap_or(false);
            if validated {
                trace!("🔐️ HMAC check for request ✅️");
                req.set_payload(bytes_to_payload(data));
                service.call(req).await
            } else {
                warn!("🔐️ Invalid HMAC signature found in request. Denying access.");
                Err(ErrorForbidden("Invalid HMAC signature."))
            }
        })
    }
}

fn bytes_to_payload(buf: web::Bytes) -> Payload {
    let (_, mut pl) = h1::Payload::create(true);
    pl.unread_data(buf);
    Payload::from(pl)
}

#[cfg(test)]
mod test {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use actix_web::{http::StatusCode, test, web, App, HttpResponse};
    use mps_common::Secret;

    use super::HmacMiddlewareFactory;
    use crate::helpers::calculate_hmac;

    const SECRET: &str = "sk_test_webhook_secret";
    const BODY: &str = r#"{"event":"charge.success","data":{"reference":"ref-1"}}"#;

    async fn spawn_app(
        hits: Arc<AtomicUsize>,
        enabled: bool,
    ) -> impl actix_web::dev::Service<
        actix_http::Request,
        Response = actix_web::dev::ServiceResponse,
        Error = actix_web::Error,
    > {
        test::init_service(
            App::new().service(
                web::scope("/paystack")
                    .wrap(HmacMiddlewareFactory::new("x-paystack-signature", Secret::new(SECRET.to_string()), enabled))
                    .route(
                        "/webhook",
                        web::post().to(move || {
                            // Stands in for the real handler; the counter proves whether processing was reached.
                            hits.fetch_add(1, Ordering::SeqCst);
                            async { HttpResponse::Ok().finish() }
                        }),
                    ),
            ),
        )
        .await
    }

    #[actix_web::test]
    async fn valid_signature_is_accepted() {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = spawn_app(hits.clone(), true).await;
        let sig = calculate_hmac(SECRET, BODY.as_bytes());
        let req = test::TestRequest::post()
            .uri("/paystack/webhook")
            .insert_header(("x-paystack-signature", sig))
            .set_payload(BODY)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[actix_web::test]
    async fn invalid_signature_is_rejected_before_any_processing() {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = spawn_app(hits.clone(), true).await;
        let req = test::TestRequest::post()
            .uri("/paystack/webhook")
            .insert_header(("x-paystack-signature", "deadbeef".repeat(16)))
            .set_payload(BODY)
            .to_request();
        let resp = test::try_call_service(&app, req).await;
        let err = resp.expect_err("a forged signature must be an error");
        assert_eq!(err.as_response_error().status_code(), StatusCode::FORBIDDEN);
        assert_eq!(hits.load(Ordering::SeqCst), 0, "the handler must never run");
    }

    #[actix_web::test]
    async fn missing_signature_is_rejected() {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = spawn_app(hits.clone(), true).await;
        let req = test::TestRequest::post().uri("/paystack/webhook").set_payload(BODY).to_request();
        let resp = test::try_call_service(&app, req).await;
        let err = resp.expect_err("an unsigned payload must be an error");
        assert_eq!(err.as_response_error().status_code(), StatusCode::FORBIDDEN);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[actix_web::test]
    async fn disabled_checks_allow_unsigned_calls() {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = spawn_app(hits.clone(), false).await;
        let req = test::TestRequest::post().uri("/paystack/webhook").set_payload(BODY).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
