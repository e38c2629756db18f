//! End-to-end settlement pipeline tests over a real SQLite store.
//!
//! Each test gets its own database file so they can run in parallel.

use marketplace_payment_engine::{
    db_types::{AuditStage, IntentStatus, NewPaymentIntent, NewServiceRequest, StagedLineItem, TriggerSource},
    events::EventProducers,
    test_utils::{
        prepare_env::prepare_test_env,
        stub_gateway::{successful_txn, StubGateway},
    },
    Disposition,
    GatewayError,
    ReconciliationApi,
    SettlementDatabase,
    SettlementError,
    SqliteDatabase,
};
use mps_common::Kobo;

async fn new_db(name: &str) -> SqliteDatabase {
    let url = format!("sqlite://../data/test_{name}.db");
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database")
}

fn cart_intent(reference: &str) -> NewPaymentIntent {
    let mut intent = NewPaymentIntent::new(reference.to_string(), "user-77".to_string(), Kobo::from(11_000));
    intent.food_amount = Kobo::from(10_000);
    intent.delivery_fee = Kobo::from(500);
    intent.tax_amount = Kobo::from(500);
    intent.pending_orders = Some(vec![
        StagedLineItem {
            vendor_id: Some("vendor-a".to_string()),
            product_id: Some("prod-1".to_string()),
            quantity: 1,
            total_price: Kobo::from(3_000),
        },
        StagedLineItem {
            vendor_id: Some("vendor-b".to_string()),
            product_id: Some("prod-2".to_string()),
            quantity: 2,
            total_price: Kobo::from(7_000),
        },
    ]);
    intent
}

fn cart_txn(reference: &str) -> marketplace_payment_engine::traits::VerifiedTransaction {
    let mut txn = successful_txn(reference, 11_000);
    txn.metadata.food_amount = Some(Kobo::from(10_000));
    txn.metadata.delivery_fee = Some(Kobo::from(500));
    txn.metadata.vat_amount = Some(Kobo::from(500));
    txn
}

#[tokio::test]
async fn settlement_is_idempotent() {
    let reference = "ref-idem-001";
    let db = new_db("idempotent").await;
    let gateway = StubGateway::single(cart_txn(reference));
    let api = ReconciliationApi::new(db.clone(), gateway, EventProducers::default());
    api.stage_checkout(cart_intent(reference)).await.expect("Error staging checkout");

    let first = api.verify_and_settle(reference, TriggerSource::Redirect, None).await.expect("First settlement failed");
    match first.disposition {
        Disposition::OrdersCreated { count, already_existed } => {
            assert_eq!(count, 2);
            assert!(!already_existed);
        },
        other => panic!("Expected orders, got {other:?}"),
    }

    // The webhook lands second and must observe, not re-create.
    let second = api.verify_and_settle(reference, TriggerSource::Webhook, None).await.expect("Second settlement failed");
    match second.disposition {
        Disposition::OrdersCreated { count, already_existed } => {
            assert_eq!(count, 2);
            assert!(already_existed);
        },
        other => panic!("Expected orders, got {other:?}"),
    }

    let orders = db.fetch_orders_for_reference(reference).await.unwrap();
    assert_eq!(orders.len(), 2);
    // Tax split is proportional to each line's share of the food total.
    assert_eq!(orders[0].tax_share, Kobo::from(150));
    assert_eq!(orders[1].tax_share, Kobo::from(350));

    // Exactly one notification per vendor, despite two runs.
    for vendor in ["vendor-a", "vendor-b"] {
        let inbox = db.fetch_notifications_for_vendor(vendor).await.unwrap();
        assert_eq!(inbox.len(), 1, "vendor {vendor} should have exactly one notification");
    }

    let intent = db.fetch_payment_intent(reference).await.unwrap().unwrap();
    assert_eq!(intent.status, IntentStatus::Settled);
}

#[tokio::test]
async fn concurrent_duplicate_invocations_are_safe() {
    let reference = "ref-race-001";
    let db = new_db("race").await;
    let gateway = StubGateway::single(cart_txn(reference));
    let api_a = ReconciliationApi::new(db.clone(), gateway.clone(), EventProducers::default());
    let api_b = ReconciliationApi::new(db.clone(), gateway, EventProducers::default());
    api_a.stage_checkout(cart_intent(reference)).await.expect("Error staging checkout");

    // The customer's redirect and the gateway's webhook race each other.
    let (left, right) = futures_util::future::join(
        api_a.verify_and_settle(reference, TriggerSource::Redirect, None),
        api_b.verify_and_settle(reference, TriggerSource::Webhook, None),
    )
    .await;
    let left = left.expect("Redirect invocation failed");
    let right = right.expect("Webhook invocation failed");
    assert_eq!(left.orders_created(), Some(2));
    assert_eq!(right.orders_created(), Some(2));

    let orders = db.fetch_orders_for_reference(reference).await.unwrap();
    assert_eq!(orders.len(), 2, "the race must not produce duplicate rows");
    for vendor in ["vendor-a", "vendor-b"] {
        let inbox = db.fetch_notifications_for_vendor(vendor).await.unwrap();
        assert_eq!(inbox.len(), 1);
    }
}

#[tokio::test]
async fn allocation_mismatch_is_logged_but_settlement_completes() {
    let reference = "ref-mismatch-001";
    let db = new_db("mismatch").await;
    let mut txn = cart_txn(reference);
    // Parts sum to 10 990 against a gross of 11 000.
    txn.metadata.delivery_fee = Some(Kobo::from(490));
    let gateway = StubGateway::single(txn);
    let api = ReconciliationApi::new(db.clone(), gateway, EventProducers::default());
    api.stage_checkout(cart_intent(reference)).await.expect("Error staging checkout");

    let outcome = api.verify_and_settle(reference, TriggerSource::Redirect, None).await.expect("Settlement failed");
    assert!(!outcome.is_degraded());
    assert_eq!(outcome.orders_created(), Some(2));

    let trail = db.fetch_audit_trail(reference).await.unwrap();
    let stages: Vec<AuditStage> = trail.iter().map(|e| e.stage).collect();
    assert!(stages.contains(&AuditStage::AllocationMismatch));
    assert!(stages.contains(&AuditStage::Done));
}

#[tokio::test]
async fn invalid_lines_are_dropped_without_sinking_the_batch() {
    let reference = "ref-dropline-001";
    let db = new_db("dropline").await;
    let gateway = StubGateway::single(cart_txn(reference));
    let api = ReconciliationApi::new(db.clone(), gateway, EventProducers::default());
    let mut intent = cart_intent(reference);
    intent.pending_orders = Some(vec![
        StagedLineItem {
            vendor_id: None, // no vendor: this line cannot be fulfilled by anyone
            product_id: Some("prod-1".to_string()),
            quantity: 1,
            total_price: Kobo::from(3_000),
        },
        StagedLineItem {
            vendor_id: Some("vendor-b".to_string()),
            product_id: Some("prod-2".to_string()),
            quantity: 1,
            total_price: Kobo::from(7_000),
        },
    ]);
    api.stage_checkout(intent).await.expect("Error staging checkout");

    let outcome = api.verify_and_settle(reference, TriggerSource::Redirect, None).await.expect("Settlement failed");
    assert_eq!(outcome.orders_created(), Some(1));
    let orders = db.fetch_orders_for_reference(reference).await.unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].vendor_id, "vendor-b");

    let trail = db.fetch_audit_trail(reference).await.unwrap();
    assert!(trail.iter().any(|e| e.stage == AuditStage::LineDropped));
}

#[tokio::test]
async fn service_request_settles_exactly_once() {
    let reference = "ref-service-001";
    let db = new_db("service").await;
    let request = db
        .insert_service_request(NewServiceRequest {
            user_id: "user-9".to_string(),
            vendor_id: "vendor-s".to_string(),
            description: Some("generator repair".to_string()),
        })
        .await
        .expect("Error creating service request");

    let mut txn = successful_txn(reference, 25_000);
    txn.metadata.service_request_id = Some(request.id);
    txn.metadata.vendor_id = Some("vendor-s".to_string());
    let gateway = StubGateway::single(txn);
    let api = ReconciliationApi::new(db.clone(), gateway, EventProducers::default());

    let first = api.verify_and_settle(reference, TriggerSource::Webhook, None).await.expect("First settlement failed");
    match first.disposition {
        Disposition::ServiceRequestSettled { service_request_id, already_paid } => {
            assert_eq!(service_request_id, request.id);
            assert!(!already_paid);
        },
        other => panic!("Expected a service settlement, got {other:?}"),
    }

    let second =
        api.verify_and_settle(reference, TriggerSource::Redirect, None).await.expect("Second settlement failed");
    match second.disposition {
        Disposition::ServiceRequestSettled { already_paid, .. } => assert!(already_paid),
        other => panic!("Expected a service settlement, got {other:?}"),
    }

    let settled = db.fetch_service_request(request.id).await.unwrap().unwrap();
    assert_eq!(settled.payment_status, "paid");
    assert_eq!(settled.amount_paid, Some(Kobo::from(25_000)));
    assert_eq!(settled.payment_reference.as_deref(), Some(reference));
    // No settlement orders are created for service payments, and the vendor hears about it once.
    assert!(db.fetch_orders_for_reference(reference).await.unwrap().is_empty());
    let inbox = db.fetch_notifications_for_vendor("vendor-s").await.unwrap();
    assert_eq!(inbox.len(), 1);
}

#[tokio::test]
async fn gateway_decline_fails_the_intent_and_creates_nothing() {
    let reference = "ref-declined-001";
    let db = new_db("declined").await;
    let gateway = StubGateway::new(Vec::new(), vec![(reference.to_string(), "failed".to_string())]);
    let api = ReconciliationApi::new(db.clone(), gateway, EventProducers::default());
    api.stage_checkout(cart_intent(reference)).await.expect("Error staging checkout");

    let result = api.verify_and_settle(reference, TriggerSource::Redirect, None).await;
    match result {
        Err(SettlementError::Gateway(GatewayError::Declined { status, .. })) => assert_eq!(status, "failed"),
        other => panic!("Expected a gateway decline, got {other:?}"),
    }

    assert!(db.fetch_orders_for_reference(reference).await.unwrap().is_empty());
    let intent = db.fetch_payment_intent(reference).await.unwrap().unwrap();
    assert_eq!(intent.status, IntentStatus::Failed);
    let trail = db.fetch_audit_trail(reference).await.unwrap();
    assert!(trail.iter().any(|e| e.stage == AuditStage::GatewayRejected));
}

#[tokio::test]
async fn inline_payload_settles_without_a_staged_cart() {
    // Trigger A may carry the cart inline. The intent exists (it holds the paying user) but was staged
    // without pending orders.
    let reference = "ref-inline-001";
    let db = new_db("inline").await;
    let gateway = StubGateway::single(cart_txn(reference));
    let api = ReconciliationApi::new(db.clone(), gateway, EventProducers::default());
    let mut intent = cart_intent(reference);
    intent.pending_orders = None;
    api.stage_checkout(intent).await.expect("Error staging checkout");

    let staged = marketplace_payment_engine::StagedCheckout {
        lines: vec![StagedLineItem {
            vendor_id: Some("vendor-a".to_string()),
            product_id: Some("prod-9".to_string()),
            quantity: 1,
            total_price: Kobo::from(10_000),
        }],
        delivery: None,
    };
    let outcome =
        api.verify_and_settle(reference, TriggerSource::Redirect, Some(staged)).await.expect("Settlement failed");
    assert_eq!(outcome.orders_created(), Some(1));
}

#[tokio::test]
async fn orders_for_one_vendor_group_into_one_notification() {
    let reference = "ref-group-001";
    let db = new_db("group").await;
    let gateway = StubGateway::single(cart_txn(reference));
    let api = ReconciliationApi::new(db.clone(), gateway, EventProducers::default());
    let mut intent = cart_intent(reference);
    intent.pending_orders = Some(vec![
        StagedLineItem {
            vendor_id: Some("vendor-a".to_string()),
            product_id: Some("prod-1".to_string()),
            quantity: 1,
            total_price: Kobo::from(3_000),
        },
        StagedLineItem {
            vendor_id: Some("vendor-a".to_string()),
            product_id: Some("prod-2".to_string()),
            quantity: 1,
            total_price: Kobo::from(7_000),
        },
    ]);
    api.stage_checkout(intent).await.expect("Error staging checkout");

    let outcome = api.verify_and_settle(reference, TriggerSource::Redirect, None).await.expect("Settlement failed");
    assert_eq!(outcome.orders_created(), Some(2));
    let inbox = db.fetch_notifications_for_vendor("vendor-a").await.unwrap();
    assert_eq!(inbox.len(), 1, "both lines belong to one vendor, so one notification");
    assert!(inbox[0].message.contains("2 new paid orders"), "message was: {}", inbox[0].message);
}

#[tokio::test]
async fn commission_split_matches_at_both_computation_points() {
    let reference = "ref-split-001";
    let db = new_db("split").await;
    let mut txn = successful_txn(reference, 10_000);
    txn.metadata.food_amount = Some(Kobo::from(9_000));
    txn.metadata.delivery_fee = Some(Kobo::from(500));
    txn.metadata.vat_amount = Some(Kobo::from(500));
    let gateway = StubGateway::single(txn);
    let api = ReconciliationApi::new(db.clone(), gateway, EventProducers::default());

    let mut intent = NewPaymentIntent::new(reference.to_string(), "user-1".to_string(), Kobo::from(10_000));
    intent.food_amount = Kobo::from(9_000);
    intent.delivery_fee = Kobo::from(500);
    intent.tax_amount = Kobo::from(500);
    intent.pending_orders = Some(vec![StagedLineItem {
        vendor_id: Some("vendor-a".to_string()),
        product_id: Some("prod-1".to_string()),
        quantity: 1,
        total_price: Kobo::from(9_000),
    }]);
    let (_, staged_split) = api.stage_checkout(intent).await.expect("Error staging checkout");
    assert_eq!(staged_split.commission, Kobo::from(900));
    assert_eq!(staged_split.platform_share, Kobo::from(1_900));
    assert_eq!(staged_split.vendor_payout, Kobo::from(8_100));

    let outcome = api.verify_and_settle(reference, TriggerSource::Redirect, None).await.expect("Settlement failed");
    assert_eq!(outcome.split, staged_split);
}
