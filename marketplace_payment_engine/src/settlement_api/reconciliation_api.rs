use std::fmt::Debug;

use log::*;
use mps_common::Kobo;
use serde_json::json;

use crate::{
    db_types::{
        AuditStage,
        DeliveryDetails,
        IntentStatus,
        NewAuditEntry,
        NewOrder,
        NewPaymentIntent,
        Order,
        PaymentIntent,
        StagedLineItem,
        TriggerSource,
    },
    events::{EventProducers, PaymentSettledEvent},
    helpers::{allocate, proportional_tax, CommissionSplit, DEFAULT_COMMISSION_RATE},
    settlement_api::{
        notifier,
        settlement_objects::{Disposition, SettlementOutcome, StagedCheckout},
    },
    traits::{
        GatewayClient,
        GatewayError,
        MaterializedOrders,
        OrderFieldSet,
        SettlementDatabase,
        SettlementError,
        VerifiedTransaction,
    },
};

fn supplied(amount: Kobo) -> Option<Kobo> {
    if amount.is_zero() {
        None
    } else {
        Some(amount)
    }
}

/// `ReconciliationApi` is the single entry point for payment verification and order materialization. The
/// client-redirect handler and the gateway-webhook handler both call [`ReconciliationApi::verify_and_settle`]
/// with identical semantics: whichever invocation runs first materializes, and every later (or concurrent)
/// one observes the existing rows and settles into a no-op.
///
/// The pipeline is a pure state-transition function over store-visible facts. No state is held between
/// invocations; webhook redelivery simply re-runs the whole thing.
pub struct ReconciliationApi<B, G> {
    db: B,
    gateway: G,
    producers: EventProducers,
    commission_rate: f64,
}

impl<B, G> Debug for ReconciliationApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReconciliationApi")
    }
}

impl<B, G> ReconciliationApi<B, G> {
    pub fn new(db: B, gateway: G, producers: EventProducers) -> Self {
        Self { db, gateway, producers, commission_rate: DEFAULT_COMMISSION_RATE }
    }

    pub fn with_commission_rate(mut self, rate: f64) -> Self {
        self.commission_rate = rate;
        self
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B, G> ReconciliationApi<B, G>
where
    B: SettlementDatabase,
    G: GatewayClient,
{
    /// Stage a checkout intent and compute the commission split that parameterizes the gateway charge (the
    /// platform-share directive). The same split is recomputed at verification time; the two must agree.
    pub async fn stage_checkout(
        &self,
        intent: NewPaymentIntent,
    ) -> Result<(PaymentIntent, CommissionSplit), SettlementError> {
        // A zero food or tax amount means "not staged"; the allocator derives those from the gross.
        let split = allocate(
            intent.gross_amount,
            supplied(intent.food_amount),
            Some(intent.delivery_fee),
            supplied(intent.tax_amount),
            self.commission_rate,
        );
        if let Some(diff) = split.mismatch(intent.gross_amount) {
            warn!("🔄️💰️ Staged amounts for [{}] are off by {diff} against the gross", intent.reference);
        }
        let staged = self.db.insert_payment_intent(intent).await?;
        debug!("🔄️💰️ Checkout [{}] staged for user {}", staged.reference, staged.user_id);
        Ok((staged, split))
    }

    /// Verify the reference against the gateway and, exactly once across all invocations, convert the staged
    /// intent into durable orders (or the service-request `paid` transition), then notify the vendors.
    ///
    /// Returns `Err` only when the gateway rejected the charge or could not be reached — the two cases where
    /// "your payment did not go through" is a safe thing to tell the customer. Every failure after the
    /// gateway confirms success degrades into an `Ok` outcome carrying [`Disposition::Degraded`].
    pub async fn verify_and_settle(
        &self,
        reference: &str,
        trigger: TriggerSource,
        staged: Option<StagedCheckout>,
    ) -> Result<SettlementOutcome, SettlementError> {
        trace!("🔄️💳️ [{reference}] verification triggered via {trigger}");
        self.audit(reference, AuditStage::Received, trigger, json!({
            "inline_lines": staged.as_ref().map(|s| s.lines.len()),
        }))
        .await;

        // RECEIVED -> GATEWAY_VERIFIED | FAILED
        let txn = match self.gateway.verify(reference).await {
            Ok(txn) => txn,
            Err(e) => return Err(self.handle_gateway_failure(reference, trigger, e).await),
        };
        info!("🔄️💳️ [{reference}] confirmed by gateway: {} {}", txn.amount, txn.currency);
        self.audit(reference, AuditStage::GatewayVerified, trigger, json!({
            "amount": txn.amount,
            "currency": txn.currency,
            "fees": txn.fees,
            "gateway_status": txn.gateway_status,
        }))
        .await;
        if let Err(e) = self.db.update_intent_status(reference, IntentStatus::Verifying).await {
            warn!("🔄️💳️ Could not mark intent [{reference}] as verifying: {e}");
        }

        let intent = match self.db.fetch_payment_intent(reference).await {
            Ok(i) => i,
            Err(e) => {
                warn!("🔄️💳️ Could not load staged intent for [{reference}]: {e}");
                None
            },
        };

        // GATEWAY_VERIFIED -> ALLOCATED. Pure computation; cannot fail, only disagree.
        let split = self.recompute_split(reference, trigger, &txn, intent.as_ref()).await;

        // ALLOCATED -> MATERIALIZED | DEGRADED
        let disposition = match self.materialize(reference, trigger, &txn, intent.as_ref(), staged).await {
            Ok(d) => d,
            Err(e) => {
                // Money has been confirmed; from here on nothing is allowed to look like "payment failed".
                error!("🔄️💳️ [{reference}] payment is confirmed but materialization failed: {e}");
                self.audit(reference, AuditStage::MaterializationFailed, trigger, json!({
                    "error": e.to_string(),
                }))
                .await;
                let outcome = SettlementOutcome {
                    reference: reference.to_string(),
                    amount: txn.amount,
                    split,
                    disposition: Disposition::Degraded { reason: e.to_string() },
                };
                return Ok(outcome);
            },
        };
        if let Err(e) = self.db.update_intent_status(reference, IntentStatus::Settled).await {
            warn!("🔄️💳️ Could not mark intent [{reference}] as settled: {e}");
        }

        // MATERIALIZED -> NOTIFIED -> DONE. Best effort; never blocks, never reverses anything.
        let notified = self.notify(reference, &txn, &disposition).await;
        self.audit(reference, AuditStage::Notified, trigger, json!({ "notifications": notified })).await;

        let outcome = SettlementOutcome {
            reference: reference.to_string(),
            amount: txn.amount,
            split,
            disposition,
        };
        self.publish_settled(&outcome).await;
        self.audit(reference, AuditStage::Done, trigger, json!({
            "orders_created": outcome.orders_created(),
            "service_request_id": outcome.service_request_id(),
        }))
        .await;
        debug!("🔄️💳️ [{reference}] settlement complete");
        Ok(outcome)
    }

    async fn handle_gateway_failure(
        &self,
        reference: &str,
        trigger: TriggerSource,
        e: GatewayError,
    ) -> SettlementError {
        match &e {
            GatewayError::Declined { status, raw } => {
                info!("🔄️💳️ [{reference}] declined by gateway (status '{status}')");
                self.audit(reference, AuditStage::GatewayRejected, trigger, json!({
                    "status": status,
                    "raw": raw,
                }))
                .await;
                if let Err(e) = self.db.update_intent_status(reference, IntentStatus::Failed).await {
                    warn!("🔄️💳️ Could not mark intent [{reference}] as failed: {e}");
                }
            },
            GatewayError::Unreachable(reason) | GatewayError::InvalidResponse(reason) => {
                // Transient; the intent stays as-is so a retry of the whole pipeline can still settle it.
                warn!("🔄️💳️ [{reference}] could not be verified: {reason}");
                self.audit(reference, AuditStage::GatewayUnreachable, trigger, json!({ "reason": reason })).await;
            },
        }
        SettlementError::Gateway(e)
    }

    /// Recomputes the commission split from gateway-echoed metadata and checks it against both the charged
    /// amount and the amounts staged at initialization. Disagreement is recorded and the pipeline proceeds.
    async fn recompute_split(
        &self,
        reference: &str,
        trigger: TriggerSource,
        txn: &VerifiedTransaction,
        intent: Option<&PaymentIntent>,
    ) -> CommissionSplit {
        let meta = &txn.metadata;
        let food = meta.food_amount.or_else(|| intent.and_then(|i| supplied(i.food_amount)));
        let delivery = meta.delivery_fee.or_else(|| intent.map(|i| i.delivery_fee));
        let tax = meta.vat_amount.or_else(|| intent.and_then(|i| supplied(i.tax_amount)));
        let split = allocate(txn.amount, food, delivery, tax, self.commission_rate);
        self.audit(reference, AuditStage::Allocated, trigger, json!({
            "food_amount": split.food_amount,
            "delivery_fee": split.delivery_fee,
            "tax_amount": split.tax_amount,
            "commission": split.commission,
            "platform_share": split.platform_share,
            "vendor_payout": split.vendor_payout,
        }))
        .await;
        if let Some(diff) = split.mismatch(txn.amount) {
            warn!("🔄️💳️ [{reference}] allocation mismatch: parts differ from gross by {diff}");
            self.audit(reference, AuditStage::AllocationMismatch, trigger, json!({
                "gross": txn.amount,
                "difference": diff,
            }))
            .await;
        }
        if let Some(intent) = intent {
            if intent.gross_amount != txn.amount {
                warn!(
                    "🔄️💳️ [{reference}] staged gross {} differs from charged amount {}",
                    intent.gross_amount, txn.amount
                );
                self.audit(reference, AuditStage::AllocationMismatch, trigger, json!({
                    "staged_gross": intent.gross_amount,
                    "charged": txn.amount,
                }))
                .await;
            }
        }
        split
    }

    async fn materialize(
        &self,
        reference: &str,
        trigger: TriggerSource,
        txn: &VerifiedTransaction,
        intent: Option<&PaymentIntent>,
        staged: Option<StagedCheckout>,
    ) -> Result<Disposition, SettlementError> {
        // A service-request payment is identified by its metadata carrying a service request id rather than
        // per-vendor line items.
        let service_request_id = txn.metadata.service_request_id.or_else(|| intent.and_then(|i| i.service_request_id));
        if let Some(id) = service_request_id {
            let settlement = self.db.settle_service_request(id, reference, txn.amount).await?;
            self.audit(reference, AuditStage::Materialized, trigger, json!({
                "service_request_id": id,
                "already_paid": settlement.already_paid,
            }))
            .await;
            return Ok(Disposition::ServiceRequestSettled {
                service_request_id: id,
                already_paid: settlement.already_paid,
            });
        }
        let materialized = self.materialize_orders(reference, trigger, txn, intent, staged).await?;
        self.audit(reference, AuditStage::Materialized, trigger, json!({
            "orders": materialized.orders.len(),
            "already_existed": materialized.already_existed,
        }))
        .await;
        Ok(Disposition::OrdersCreated {
            count: materialized.orders.len(),
            already_existed: materialized.already_existed,
        })
    }

    async fn materialize_orders(
        &self,
        reference: &str,
        trigger: TriggerSource,
        txn: &VerifiedTransaction,
        intent: Option<&PaymentIntent>,
        staged: Option<StagedCheckout>,
    ) -> Result<MaterializedOrders, SettlementError> {
        // Primary idempotency guard: a previous invocation's rows end the story here.
        let existing = self.db.fetch_orders_for_reference(reference).await?;
        if !existing.is_empty() {
            debug!("🔄️📦️ [{reference}] orders already exist ({} rows); nothing to materialize", existing.len());
            return Ok(MaterializedOrders { orders: existing, already_existed: true });
        }

        let (lines, delivery) = self.resolve_staged_payload(reference, intent, staged)?;
        let user_id = intent.map(|i| i.user_id.clone()).unwrap_or_default();
        if user_id.is_empty() {
            return Err(SettlementError::MaterializationFailure(format!(
                "no staged intent holds the paying user for reference {reference}"
            )));
        }

        let mut rows = Vec::with_capacity(lines.len());
        for (idx, line) in lines.iter().enumerate() {
            match self.build_order_line(reference, &user_id, idx, line, &delivery) {
                Some(row) => rows.push(row),
                None => {
                    self.audit(reference, AuditStage::LineDropped, trigger, json!({
                        "line_no": idx,
                        "vendor_id": line.vendor_id,
                        "product_id": line.product_id,
                    }))
                    .await;
                },
            }
        }
        if rows.is_empty() {
            return Err(SettlementError::EmptyMaterialization(reference.to_string()));
        }

        // Tax is allocated per line, proportional to the line's share of the food total.
        let total_food: Kobo = rows.iter().map(|r| r.total_price).sum();
        let total_tax = txn.metadata.vat_amount.or_else(|| intent.map(|i| i.tax_amount)).unwrap_or_default();
        for row in &mut rows {
            row.tax_share = proportional_tax(row.total_price, total_food, total_tax);
        }

        match self.insert_with_retries(reference, &rows).await {
            Ok(orders) => Ok(MaterializedOrders { orders, already_existed: false }),
            Err(SettlementError::DuplicateMaterialization) => {
                // Lost the race against a concurrent invocation; its rows are just as good as ours.
                info!("🔄️📦️ [{reference}] was materialized concurrently; re-reading existing orders");
                let orders = self.db.fetch_orders_for_reference(reference).await?;
                Ok(MaterializedOrders { orders, already_existed: true })
            },
            Err(e) => Err(e),
        }
    }

    /// Inline payload wins over the staged intent; an unparseable staged payload is a materialization
    /// failure, not a panic or a silent empty cart.
    fn resolve_staged_payload(
        &self,
        reference: &str,
        intent: Option<&PaymentIntent>,
        staged: Option<StagedCheckout>,
    ) -> Result<(Vec<StagedLineItem>, DeliveryDetails), SettlementError> {
        if let Some(staged) = staged {
            if !staged.lines.is_empty() {
                let delivery = staged.delivery.unwrap_or_default();
                return Ok((staged.lines, delivery));
            }
        }
        let intent = intent.ok_or_else(|| {
            SettlementError::MaterializationFailure(format!("no staged payload found for reference {reference}"))
        })?;
        let lines = intent
            .staged_lines()
            .map_err(|e| SettlementError::CorruptStagedPayload(reference.to_string(), e.to_string()))?;
        let delivery = intent
            .delivery_details()
            .map_err(|e| SettlementError::CorruptStagedPayload(reference.to_string(), e.to_string()))?
            .unwrap_or_default();
        Ok((lines, delivery))
    }

    /// A single bad line never aborts the batch; it is dropped with a logged reason.
    fn build_order_line(
        &self,
        reference: &str,
        user_id: &str,
        idx: usize,
        line: &StagedLineItem,
        delivery: &DeliveryDetails,
    ) -> Option<NewOrder> {
        let vendor_id = match line.vendor_id.as_deref() {
            Some(v) if !v.is_empty() => v.to_string(),
            _ => {
                warn!("🔄️📦️ [{reference}] line {idx} has no vendor id; dropping it");
                return None;
            },
        };
        let product_id = match line.product_id.as_deref() {
            Some(p) if !p.is_empty() => p.to_string(),
            _ => {
                warn!("🔄️📦️ [{reference}] line {idx} has no product id; dropping it");
                return None;
            },
        };
        Some(NewOrder {
            payment_reference: reference.to_string(),
            line_no: idx as i64,
            user_id: user_id.to_string(),
            vendor_id,
            product_id: Some(product_id),
            quantity: line.quantity.max(1),
            total_price: line.total_price.clamped(),
            tax_share: Kobo::default(),
            delivery: delivery.clone(),
        })
    }

    /// First attempt writes the full rows. A schema-shape error gets one retry with the mandatory columns
    /// only; a second failure is a hard materialization failure.
    async fn insert_with_retries(
        &self,
        reference: &str,
        rows: &[NewOrder],
    ) -> Result<Vec<Order>, SettlementError> {
        match self.db.insert_orders(rows, OrderFieldSet::Full).await {
            Ok(orders) => Ok(orders),
            Err(SettlementError::SchemaMismatch(detail)) => {
                warn!("🔄️📦️ [{reference}] full insert hit a schema mismatch ({detail}); retrying with mandatory fields");
                match self.db.insert_orders(rows, OrderFieldSet::Mandatory).await {
                    Ok(orders) => Ok(orders),
                    Err(SettlementError::DuplicateMaterialization) => Err(SettlementError::DuplicateMaterialization),
                    Err(e) => Err(SettlementError::MaterializationFailure(format!(
                        "reduced-field insert failed too: {e}"
                    ))),
                }
            },
            Err(e) => Err(e),
        }
    }

    async fn notify(&self, reference: &str, txn: &VerifiedTransaction, disposition: &Disposition) -> usize {
        match disposition {
            Disposition::OrdersCreated { .. } => {
                let orders = match self.db.fetch_orders_for_reference(reference).await {
                    Ok(orders) => orders,
                    Err(e) => {
                        warn!("🔔️ Could not load orders for notification dispatch [{reference}]: {e}");
                        return 0;
                    },
                };
                notifier::notify_order_vendors(&self.db, reference, &orders).await
            },
            Disposition::ServiceRequestSettled { service_request_id, .. } => {
                match self.db.fetch_service_request(*service_request_id).await {
                    Ok(Some(request)) => {
                        notifier::notify_service_vendor(&self.db, reference, &request, txn.amount).await
                    },
                    Ok(None) => {
                        warn!("🔔️ Service request #{service_request_id} vanished before notification [{reference}]");
                        0
                    },
                    Err(e) => {
                        warn!("🔔️ Could not load service request #{service_request_id} [{reference}]: {e}");
                        0
                    },
                }
            },
            Disposition::Degraded { .. } => 0,
        }
    }

    async fn publish_settled(&self, outcome: &SettlementOutcome) {
        for emitter in &self.producers.payment_settled_producer {
            trace!("🔄️💳️ Notifying payment-settled hook subscribers");
            let event = PaymentSettledEvent {
                reference: outcome.reference.clone(),
                amount: outcome.amount,
                orders_created: outcome.orders_created().unwrap_or_default(),
            };
            emitter.publish_event(event).await;
        }
    }

    /// The audit log is written at every stage, failure paths included. A failed audit write is itself only
    /// logged; forensics must never take the pipeline down.
    async fn audit(&self, reference: &str, stage: AuditStage, trigger: TriggerSource, payload: serde_json::Value) {
        let entry = NewAuditEntry::new(reference, stage, trigger, payload);
        if let Err(e) = self.db.insert_audit_entry(entry).await {
            error!("🧾️ Could not write audit entry {stage} for [{reference}]: {e}");
        }
    }
}
