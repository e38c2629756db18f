//! Verifies that settlement publishes a `PaymentSettled` event to subscribed hooks.

use marketplace_payment_engine::{
    db_types::{NewPaymentIntent, StagedLineItem, TriggerSource},
    events::{EventHandlers, EventHooks, PaymentSettledEvent},
    test_utils::{
        prepare_env::prepare_test_env,
        stub_gateway::{successful_txn, StubGateway},
    },
    ReconciliationApi,
    SqliteDatabase,
};
use mps_common::Kobo;
use tokio::sync::mpsc;

#[tokio::test]
async fn payment_settled_hook_fires() {
    let reference = "ref-hook-001";
    let url = "sqlite://../data/test_hooks.db";
    prepare_test_env(url).await;
    let db = SqliteDatabase::new_with_url(url, 5).await.expect("Error creating database");

    let (tx, mut rx) = mpsc::channel::<PaymentSettledEvent>(5);
    let mut hooks = EventHooks::default();
    hooks.on_payment_settled(move |event| {
        let tx = tx.clone();
        Box::pin(async move {
            tx.send(event).await.ok();
        })
    });
    let handlers = EventHandlers::new(10, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;

    let mut txn = successful_txn(reference, 5_000);
    txn.metadata.food_amount = Some(Kobo::from(5_000));
    let gateway = StubGateway::single(txn);
    let api = ReconciliationApi::new(db.clone(), gateway, producers);

    let mut intent = NewPaymentIntent::new(reference.to_string(), "user-h".to_string(), Kobo::from(5_000));
    intent.food_amount = Kobo::from(5_000);
    intent.pending_orders = Some(vec![StagedLineItem {
        vendor_id: Some("vendor-h".to_string()),
        product_id: Some("prod-h".to_string()),
        quantity: 1,
        total_price: Kobo::from(5_000),
    }]);
    api.stage_checkout(intent).await.expect("Error staging checkout");
    api.verify_and_settle(reference, TriggerSource::Webhook, None).await.expect("Settlement failed");

    let event = tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv())
        .await
        .expect("Timed out waiting for the payment-settled event")
        .expect("Hook channel closed without an event");
    assert_eq!(event.reference, reference);
    assert_eq!(event.amount, Kobo::from(5_000));
    assert_eq!(event.orders_created, 1);
}
