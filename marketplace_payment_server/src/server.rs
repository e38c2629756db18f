use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use marketplace_payment_engine::{events::EventProducers, ReconciliationApi, SqliteDatabase};

use crate::{
    config::ServerConfig,
    errors::ServerError,
    integrations::PaystackGateway,
    middleware::HmacMiddlewareFactory,
    paystack_routes::PaystackWebhookRoute,
    routes::{health, InitCheckoutRoute, VerifyPaymentByReferenceRoute, VerifyPaymentRoute},
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let srv = create_server_instance(config, db)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(config: ServerConfig, db: SqliteDatabase) -> Result<Server, ServerError> {
    let gateway = PaystackGateway::new(config.paystack.api.clone())?;
    let host = config.host.clone();
    let port = config.port;
    let srv = HttpServer::new(move || {
        let api = ReconciliationApi::new(db.clone(), gateway.clone(), EventProducers::default())
            .with_commission_rate(config.commission_rate);
        let hmac = HmacMiddlewareFactory::new(
            "x-paystack-signature",
            config.paystack.api.secret_key.clone(),
            config.paystack.hmac_checks,
        );
        // The webhook lives in its own scope so the HMAC check runs for it and nothing else.
        let webhook_scope = web::scope("/paystack")
            .wrap(hmac)
            .service(PaystackWebhookRoute::<SqliteDatabase, PaystackGateway>::new());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("mps::access_log"))
            .app_data(web::Data::new(api))
            .service(health)
            .service(InitCheckoutRoute::<SqliteDatabase, PaystackGateway>::new())
            .service(VerifyPaymentRoute::<SqliteDatabase, PaystackGateway>::new())
            .service(VerifyPaymentByReferenceRoute::<SqliteDatabase, PaystackGateway>::new())
            .service(webhook_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((host.as_str(), port))?
    .run();
    Ok(srv)
}
