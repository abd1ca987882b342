//! `SqliteDatabase` is the SQLite backend for the order lifecycle engine.
//!
//! It implements every trait in [`crate::traits`]. Each mutating method runs in exactly one database transaction,
//! and the first statement of that transaction is always a write, so that SQLite serialises competing writers
//! rather than letting one of them act on a stale read.
use std::fmt::Debug;

use chrono::Utc;
use log::*;
use oms_common::{Money, DEFAULT_CURRENCY_CODE};
use sqlx::{SqliteConnection, SqlitePool};

use super::db::{
    bank::{self, ReconciliationRecord},
    coupons,
    db_url,
    inventory,
    new_pool,
    orders,
    payments,
    products,
};
use crate::{
    config::EngineConfig,
    coupons::validate_coupon,
    db_types::{
        BankReconciliation,
        BankTransaction,
        BankTransactionStatus,
        Coupon,
        DiscountType,
        InventoryChangeType,
        InventoryTransaction,
        NewBankTransaction,
        NewCoupon,
        NewInventoryTransaction,
        NewOrder,
        NewPayment,
        NewProduct,
        Order,
        OrderNumber,
        OrderStatusType,
        Payment,
        PaymentStatus,
        Product,
        ReconciliationOutcome,
        ReturnRequest,
    },
    helpers::generate_order_number,
    matcher::{self, CandidateSelection},
    order_objects::{OrderChanged, OrderQueryFilter, OrderTotals},
    payments::{authoritative_payment, check_gateway_transition},
    state_machine::OrderOperation,
    traits::{
        BankReconciliationManagement,
        CatalogManagement,
        InventoryManagement,
        ManualResolution,
        MatchOutcome,
        OrderAggregate,
        OrderEngineError,
        OrderManagement,
        OrderTransition,
        PaymentManagement,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object, using the URL in `OMS_DATABASE_URL`
    pub async fn new(max_connections: u32) -> Result<Self, OrderEngineError> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, OrderEngineError> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Connects to the database named in `config`.
    pub async fn from_config(config: &EngineConfig) -> Result<Self, OrderEngineError> {
        SqliteDatabase::new_with_url(&config.database_url, config.max_connections).await
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Brings the schema up to date.
    pub async fn run_migrations(&self) -> Result<(), OrderEngineError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Migrations complete");
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Loads the items, payments and status history for `order`.
async fn load_aggregate(order: Order, conn: &mut SqliteConnection) -> Result<OrderAggregate, OrderEngineError> {
    let items = orders::fetch_items(order.id, conn).await?;
    let attempts = payments::fetch_payments_for_order(order.id, conn).await?;
    let payment = authoritative_payment(&attempts).cloned();
    let history = orders::fetch_history(order.id, conn).await?;
    Ok(OrderAggregate { order, items, payment, history })
}

fn validate_new_order(order: &NewOrder) -> Result<(), OrderEngineError> {
    if order.items.is_empty() {
        return Err(OrderEngineError::validation("An order must contain at least one item"));
    }
    if let Some(item) = order.items.iter().find(|i| i.quantity <= 0) {
        return Err(OrderEngineError::validation(format!(
            "Item quantities must be positive. Product #{} has a quantity of {}",
            item.product_id, item.quantity
        )));
    }
    if order.customer_id.trim().is_empty() {
        return Err(OrderEngineError::validation("An order must belong to a customer"));
    }
    if order.payment_method.as_str().is_empty() {
        return Err(OrderEngineError::validation("A payment method is required"));
    }
    if order.order_number.as_ref().map(|n| n.as_str().trim().is_empty()).unwrap_or(false) {
        return Err(OrderEngineError::validation("The order number cannot be blank"));
    }
    if order.shipping_fee.is_negative() || order.tax_amount.is_negative() {
        return Err(OrderEngineError::validation("Shipping fees and taxes cannot be negative"));
    }
    Ok(())
}

/// Sums the line totals of `(product_id, quantity, unit_price)` lines. Fails if any amount does not fit in `Money`.
fn order_subtotal(lines: &[(i64, i64, Money)]) -> Result<Money, OrderEngineError> {
    lines.iter().try_fold(Money::ZERO, |acc, (product_id, qty, price)| {
        price.checked_mul(*qty).and_then(|line| acc.checked_add(line)).ok_or_else(|| {
            OrderEngineError::validation(format!(
                "The order value is too large. Product #{product_id} x {qty} at {price} overflows the subtotal"
            ))
        })
    })
}

/// Whether a cash-on-delivery order has proof of payment: either its authoritative payment is `Paid`, or a bank
/// transaction has been linked to it.
async fn cod_payment_settled(order_id: i64, conn: &mut SqliteConnection) -> Result<bool, OrderEngineError> {
    let attempts = payments::fetch_payments_for_order(order_id, conn).await?;
    if authoritative_payment(&attempts).map(|p| p.is_paid()).unwrap_or(false) {
        return Ok(true);
    }
    let reconciled = bank::fetch_reconciliations_for_order(order_id, conn).await?.iter().any(|r| r.is_linked());
    Ok(reconciled)
}

/// Runs the matcher for `txn`, which must not have a reconciliation record yet.
async fn run_matcher(
    txn: BankTransaction,
    conn: &mut SqliteConnection,
) -> Result<(BankTransaction, MatchOutcome), OrderEngineError> {
    if !matcher::is_eligible(&txn) {
        trace!("🏦️ Bank transaction #{} ({} / {}) is not eligible for matching", txn.id, txn.direction, txn.status);
        return Ok((txn, MatchOutcome::Unmatched));
    }
    let numbers = matcher::referenced_orders(&txn);
    let referenced = orders::fetch_orders_by_numbers(&numbers, conn).await?;
    let order_ids = referenced.iter().map(|o| o.id).collect::<Vec<_>>();
    let mut attempts = payments::fetch_payments_for_orders(&order_ids, conn).await?;
    if let Some(p) = payments::fetch_payment_by_external_txn_id(&txn.external_txn_id, conn).await? {
        attempts.push(p);
    }
    let payment_ids = attempts.iter().map(|p| p.id).collect::<Vec<_>>();
    let linked = bank::linked_payment_ids(&payment_ids, conn).await?;
    match matcher::select_candidates(&txn, &attempts, &linked) {
        CandidateSelection::None => {
            debug!("🏦️ No payment matches bank transaction #{} ({} orders referenced)", txn.id, numbers.len());
            Ok((txn, MatchOutcome::Unmatched))
        },
        CandidateSelection::Many(candidates) => {
            info!(
                "🏦️ Bank transaction #{} matches {} payments. It needs to be resolved manually.",
                txn.id,
                candidates.len()
            );
            Ok((txn, MatchOutcome::Ambiguous { candidates }))
        },
        CandidateSelection::Single(c) => {
            let record = ReconciliationRecord {
                payment_id: Some(c.payment_id),
                order_id: Some(c.order_id),
                outcome: ReconciliationOutcome::Matched,
                actor: None,
                note: None,
            };
            let rec = bank::insert_reconciliation(txn.id, record, conn).await?;
            let txn = bank::set_status(txn.id, BankTransactionStatus::Reconciled, conn)
                .await?
                .ok_or(OrderEngineError::BankTransactionNotFound(txn.id))?;
            info!("🏦️ Bank transaction #{} matched to payment #{} for order #{}", txn.id, c.payment_id, c.order_id);
            let outcome =
                MatchOutcome::Matched { payment_id: c.payment_id, order_id: c.order_id, reconciliation_id: rec.id };
            Ok((txn, outcome))
        },
    }
}

impl OrderManagement for SqliteDatabase {
    async fn insert_order(&self, mut order: NewOrder) -> Result<OrderAggregate, OrderEngineError> {
        validate_new_order(&order)?;
        let currency = order.currency.clone().unwrap_or_else(|| DEFAULT_CURRENCY_CODE.to_string());
        let created_at = Utc::now();
        let number = order.order_number.clone().unwrap_or_else(|| generate_order_number(created_at));
        let mut tx = self.pool.begin().await?;
        // Take the stock first. A failure on any line drops the transaction, undoing the earlier lines.
        let mut lines = Vec::with_capacity(order.items.len());
        for item in &order.items {
            let product = products::adjust_stock(item.product_id, -item.quantity, &mut tx).await?;
            lines.push((item.product_id, item.quantity, product.unit_price));
        }
        let subtotal = order_subtotal(&lines)?;
        let discount = match order.coupon_code.clone() {
            Some(code) => {
                let coupon = coupons::fetch_coupon(&code, &mut tx).await?;
                let check = validate_coupon(coupon.as_ref(), &code, subtotal, created_at);
                let discount = check.into_result().map_err(OrderEngineError::CouponInvalid)?;
                order.coupon_code = coupon.map(|c| c.code);
                discount
            },
            None => Money::ZERO,
        };
        let totals = OrderTotals::compute(subtotal, discount, order.shipping_fee, order.tax_amount)?;
        let stored = orders::insert_order(&order, &number, &currency, &totals, created_at, &mut tx).await?;
        let mut items = Vec::with_capacity(lines.len());
        for (product_id, quantity, unit_price) in lines {
            items.push(orders::insert_item(stored.id, product_id, quantity, unit_price, &mut tx).await?);
            let sale = NewInventoryTransaction::new(
                product_id,
                -quantity,
                InventoryChangeType::Sale,
                format!("Sale for order {number}"),
            )
            .for_order(stored.id);
            inventory::insert_ledger_entry(sale, &mut tx).await?;
        }
        let entry = orders::insert_history_entry(
            stored.id,
            OrderStatusType::Pending,
            Some(stored.customer_id.as_str()),
            stored.created_at,
            &mut tx,
        )
        .await?;
        let payment = NewPayment::new(stored.id, stored.payment_method.clone(), stored.total_amount);
        let payment = payments::insert_payment(payment, &mut tx).await?;
        tx.commit().await?;
        info!(
            "📝️ Order [{number}] created for {} with a total of {} {currency}",
            stored.customer_id, stored.total_amount
        );
        Ok(OrderAggregate { order: stored, items, payment: Some(payment), history: vec![entry] })
    }

    async fn transition_order(
        &self,
        order_id: i64,
        transition: OrderTransition,
    ) -> Result<OrderChanged, OrderEngineError> {
        let operation = transition.operation();
        if let OrderTransition::Return { reason, .. } = &transition {
            if reason.trim().is_empty() {
                return Err(OrderEngineError::validation("A reason is required to return an order"));
            }
        }
        let mut tx = self.pool.begin().await?;
        if !orders::lock_order(order_id, &mut tx).await? {
            return Err(OrderEngineError::OrderNotFound(order_id));
        }
        let old_order = orders::fetch_order(order_id, &mut tx).await?.ok_or(OrderEngineError::OrderNotFound(order_id))?;
        let target = operation
            .target_status()
            .filter(|_| operation.is_legal_from(old_order.status))
            .ok_or_else(|| OrderEngineError::invalid_transition(order_id, old_order.status, operation))?;
        if let OrderTransition::Complete { require_cod_payment: true, .. } = &transition {
            if old_order.payment_method.is_cash_on_delivery() && !cod_payment_settled(order_id, &mut tx).await? {
                warn!("📝️ Order #{order_id} cannot be completed until its cash-on-delivery payment is confirmed");
                return Err(OrderEngineError::PaymentOutstanding(order_id));
            }
        }
        let actor = transition.actor();
        let new_order = orders::update_status(order_id, operation.legal_sources(), target, actor, &mut tx)
            .await?
            .ok_or_else(|| OrderEngineError::invalid_transition(order_id, old_order.status, operation))?;
        orders::insert_history_entry(order_id, target, actor, new_order.updated_at, &mut tx).await?;
        match &transition {
            OrderTransition::Cancel { actor } => {
                let reason = format!("Order {} cancelled", new_order.order_number);
                inventory::return_stock_for_order(order_id, &reason, Some(actor), &mut tx).await?;
                payments::void_open_payments(order_id, &mut tx).await?;
            },
            OrderTransition::Return { reason, processed_by } => {
                orders::insert_return_request(order_id, reason.trim(), processed_by, &mut tx).await?;
                let reason = format!("Order {} returned: {}", new_order.order_number, reason.trim());
                inventory::return_stock_for_order(order_id, &reason, Some(processed_by), &mut tx).await?;
            },
            _ => {},
        }
        tx.commit().await?;
        debug!("📝️ Order #{order_id}: {} -> {}", old_order.status, new_order.status);
        Ok(OrderChanged::new(old_order, new_order))
    }

    async fn confirm_cod_payment(&self, order_id: i64, paid: bool) -> Result<Payment, OrderEngineError> {
        let operation = OrderOperation::ConfirmPayment;
        let mut tx = self.pool.begin().await?;
        if !orders::lock_order(order_id, &mut tx).await? {
            return Err(OrderEngineError::OrderNotFound(order_id));
        }
        let order = orders::fetch_order(order_id, &mut tx).await?.ok_or(OrderEngineError::OrderNotFound(order_id))?;
        if !operation.is_legal_from(order.status) {
            return Err(OrderEngineError::invalid_transition(order_id, order.status, operation));
        }
        if !order.payment_method.is_cash_on_delivery() {
            return Err(OrderEngineError::PaymentTransitionForbidden(format!(
                "Order #{order_id} is paid via {}, not cash on delivery",
                order.payment_method
            )));
        }
        let attempts = payments::fetch_payments_for_order(order_id, &mut tx).await?;
        let current = authoritative_payment(&attempts).cloned().ok_or_else(|| {
            OrderEngineError::PaymentTransitionForbidden(format!("Order #{order_id} has no payment to confirm"))
        })?;
        let updated = match (paid, current.status) {
            (true, PaymentStatus::Paid) | (false, PaymentStatus::Pending) => {
                trace!("💰️ Payment #{} for order #{order_id} is already {}", current.id, current.status);
                return Ok(current);
            },
            (true, PaymentStatus::Pending) => payments::mark_paid(current.id, None, &mut tx).await?,
            (false, PaymentStatus::Paid) => payments::revert_to_pending(current.id, &mut tx).await?,
            (_, status) => {
                return Err(OrderEngineError::PaymentTransitionForbidden(format!(
                    "Payment #{} for order #{order_id} is {status} and cannot be confirmed",
                    current.id
                )))
            },
        };
        let updated = updated.ok_or(OrderEngineError::PaymentNotFound(current.id))?;
        tx.commit().await?;
        info!("💰️ Cash-on-delivery payment #{} for order #{order_id} is now {}", updated.id, updated.status);
        Ok(updated)
    }

    async fn fetch_order(&self, order_id: i64) -> Result<Option<OrderAggregate>, OrderEngineError> {
        let mut conn = self.pool.acquire().await?;
        match orders::fetch_order(order_id, &mut conn).await? {
            Some(order) => Ok(Some(load_aggregate(order, &mut conn).await?)),
            None => Ok(None),
        }
    }

    async fn fetch_order_by_number(&self, number: &OrderNumber) -> Result<Option<OrderAggregate>, OrderEngineError> {
        let mut conn = self.pool.acquire().await?;
        match orders::fetch_order_by_number(number, &mut conn).await? {
            Some(order) => Ok(Some(load_aggregate(order, &mut conn).await?)),
            None => Ok(None),
        }
    }

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<OrderAggregate>, OrderEngineError> {
        let mut conn = self.pool.acquire().await?;
        let found = orders::search_orders(query, &mut conn).await?;
        let mut result = Vec::with_capacity(found.len());
        for order in found {
            result.push(load_aggregate(order, &mut conn).await?);
        }
        Ok(result)
    }

    async fn fetch_return_requests(&self, order_id: i64) -> Result<Vec<ReturnRequest>, OrderEngineError> {
        let mut conn = self.pool.acquire().await?;
        let requests = orders::fetch_return_requests(order_id, &mut conn).await?;
        Ok(requests)
    }
}

impl PaymentManagement for SqliteDatabase {
    async fn open_payment(&self, payment: NewPayment) -> Result<Payment, OrderEngineError> {
        if payment.amount.is_negative() {
            return Err(OrderEngineError::validation("A payment amount cannot be negative"));
        }
        let order_id = payment.order_id;
        let mut tx = self.pool.begin().await?;
        if !orders::lock_order(order_id, &mut tx).await? {
            return Err(OrderEngineError::OrderNotFound(order_id));
        }
        let order = orders::fetch_order(order_id, &mut tx).await?.ok_or(OrderEngineError::OrderNotFound(order_id))?;
        if order.status.is_terminal() {
            return Err(OrderEngineError::PaymentTransitionForbidden(format!(
                "Order #{order_id} is {} and cannot take payments",
                order.status
            )));
        }
        let attempts = payments::fetch_payments_for_order(order_id, &mut tx).await?;
        if let Some(paid) = attempts.iter().find(|p| p.is_paid()) {
            return Err(OrderEngineError::PaymentTransitionForbidden(format!(
                "Order #{order_id} has already been paid by payment #{}",
                paid.id
            )));
        }
        let payment = payments::insert_payment(payment, &mut tx).await?;
        tx.commit().await?;
        Ok(payment)
    }

    async fn mark_payment_paid(
        &self,
        payment_id: i64,
        external_txn_id: Option<String>,
    ) -> Result<Payment, OrderEngineError> {
        let mut tx = self.pool.begin().await?;
        if !payments::lock_payment(payment_id, &mut tx).await? {
            return Err(OrderEngineError::PaymentNotFound(payment_id));
        }
        let current =
            payments::fetch_payment(payment_id, &mut tx).await?.ok_or(OrderEngineError::PaymentNotFound(payment_id))?;
        if !check_gateway_transition(payment_id, current.status, PaymentStatus::Paid)? {
            trace!("💰️ Payment #{payment_id} is already paid");
            return Ok(current);
        }
        let attempts = payments::fetch_payments_for_order(current.order_id, &mut tx).await?;
        if let Some(paid) = attempts.iter().find(|p| p.is_paid()) {
            return Err(OrderEngineError::PaymentTransitionForbidden(format!(
                "Order #{} has already been paid by payment #{}",
                current.order_id, paid.id
            )));
        }
        let paid = payments::mark_paid(payment_id, external_txn_id, &mut tx)
            .await?
            .ok_or(OrderEngineError::PaymentNotFound(payment_id))?;
        tx.commit().await?;
        info!("💰️ Payment #{payment_id} for order #{} is paid", paid.order_id);
        Ok(paid)
    }

    async fn mark_payment_failed(&self, payment_id: i64) -> Result<Payment, OrderEngineError> {
        let mut tx = self.pool.begin().await?;
        if !payments::lock_payment(payment_id, &mut tx).await? {
            return Err(OrderEngineError::PaymentNotFound(payment_id));
        }
        let current =
            payments::fetch_payment(payment_id, &mut tx).await?.ok_or(OrderEngineError::PaymentNotFound(payment_id))?;
        if !check_gateway_transition(payment_id, current.status, PaymentStatus::Failed)? {
            trace!("💰️ Payment #{payment_id} has already failed");
            return Ok(current);
        }
        let failed =
            payments::mark_failed(payment_id, &mut tx).await?.ok_or(OrderEngineError::PaymentNotFound(payment_id))?;
        tx.commit().await?;
        info!("💰️ Payment #{payment_id} for order #{} failed", failed.order_id);
        Ok(failed)
    }

    async fn fetch_payment(&self, payment_id: i64) -> Result<Option<Payment>, OrderEngineError> {
        let mut conn = self.pool.acquire().await?;
        let payment = payments::fetch_payment(payment_id, &mut conn).await?;
        Ok(payment)
    }

    async fn fetch_payments_for_order(&self, order_id: i64) -> Result<Vec<Payment>, OrderEngineError> {
        let mut conn = self.pool.acquire().await?;
        if orders::fetch_order(order_id, &mut conn).await?.is_none() {
            return Err(OrderEngineError::OrderNotFound(order_id));
        }
        let attempts = payments::fetch_payments_for_order(order_id, &mut conn).await?;
        Ok(attempts)
    }
}

impl InventoryManagement for SqliteDatabase {
    async fn record_inventory_change(
        &self,
        change: NewInventoryTransaction,
    ) -> Result<InventoryTransaction, OrderEngineError> {
        let mut tx = self.pool.begin().await?;
        let (product, entry) = inventory::record_change(change, &mut tx).await?;
        tx.commit().await?;
        debug!(
            "📊️ Product #{} stock is now {} after {} of {}",
            product.id, product.stock, entry.change_type, entry.delta
        );
        Ok(entry)
    }

    async fn fetch_stock(&self, product_id: i64) -> Result<i64, OrderEngineError> {
        let mut conn = self.pool.acquire().await?;
        let product =
            products::fetch_product(product_id, &mut conn).await?.ok_or(OrderEngineError::ProductNotFound(product_id))?;
        Ok(product.stock)
    }

    async fn fetch_ledger_stock(&self, product_id: i64) -> Result<i64, OrderEngineError> {
        let mut conn = self.pool.acquire().await?;
        if products::fetch_product(product_id, &mut conn).await?.is_none() {
            return Err(OrderEngineError::ProductNotFound(product_id));
        }
        let stock = inventory::ledger_stock(product_id, &mut conn).await?;
        Ok(stock)
    }

    async fn fetch_inventory_history(&self, product_id: i64) -> Result<Vec<InventoryTransaction>, OrderEngineError> {
        let mut conn = self.pool.acquire().await?;
        let history = inventory::fetch_history(product_id, &mut conn).await?;
        Ok(history)
    }
}

impl CatalogManagement for SqliteDatabase {
    async fn insert_product(&self, product: NewProduct, initial_stock: i64) -> Result<Product, OrderEngineError> {
        if product.sku.trim().is_empty() {
            return Err(OrderEngineError::validation("A product needs a SKU"));
        }
        if product.unit_price.is_negative() {
            return Err(OrderEngineError::validation("A product price cannot be negative"));
        }
        if initial_stock < 0 {
            return Err(OrderEngineError::validation("Initial stock cannot be negative"));
        }
        let mut tx = self.pool.begin().await?;
        let mut product = products::insert_product(product, &mut tx).await?;
        if initial_stock > 0 {
            let change =
                NewInventoryTransaction::new(product.id, initial_stock, InventoryChangeType::In, "Initial stock");
            product = inventory::record_change(change, &mut tx).await?.0;
        }
        tx.commit().await?;
        Ok(product)
    }

    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, OrderEngineError> {
        let mut conn = self.pool.acquire().await?;
        let product = products::fetch_product(product_id, &mut conn).await?;
        Ok(product)
    }

    async fn fetch_product_by_sku(&self, sku: &str) -> Result<Option<Product>, OrderEngineError> {
        let mut conn = self.pool.acquire().await?;
        let product = products::fetch_product_by_sku(sku, &mut conn).await?;
        Ok(product)
    }

    async fn update_product_price(&self, product_id: i64, price: Money) -> Result<Product, OrderEngineError> {
        if price.is_negative() {
            return Err(OrderEngineError::validation("A product price cannot be negative"));
        }
        let mut conn = self.pool.acquire().await?;
        products::update_price(product_id, price, &mut conn).await?.ok_or(OrderEngineError::ProductNotFound(product_id))
    }

    async fn insert_coupon(&self, coupon: NewCoupon) -> Result<Coupon, OrderEngineError> {
        if coupon.code.trim().is_empty() {
            return Err(OrderEngineError::validation("A coupon needs a code"));
        }
        match coupon.discount_type {
            DiscountType::Percentage if !(0..=100).contains(&coupon.discount_value) => {
                return Err(OrderEngineError::validation("A percentage discount must be between 0 and 100"));
            },
            DiscountType::Fixed if coupon.discount_value < 0 => {
                return Err(OrderEngineError::validation("A fixed discount cannot be negative"));
            },
            _ => {},
        }
        if coupon.min_cart_value.is_negative() {
            return Err(OrderEngineError::validation("A minimum cart value cannot be negative"));
        }
        if let (Some(start), Some(end)) = (coupon.starts_at, coupon.ends_at) {
            if start > end {
                return Err(OrderEngineError::validation("A coupon cannot end before it starts"));
            }
        }
        let mut conn = self.pool.acquire().await?;
        coupons::insert_coupon(coupon, &mut conn).await
    }

    async fn fetch_coupon(&self, code: &str) -> Result<Option<Coupon>, OrderEngineError> {
        let mut conn = self.pool.acquire().await?;
        let coupon = coupons::fetch_coupon(code, &mut conn).await?;
        Ok(coupon)
    }

    async fn set_coupon_active(&self, code: &str, active: bool) -> Result<Coupon, OrderEngineError> {
        let mut conn = self.pool.acquire().await?;
        coupons::set_active(code, active, &mut conn)
            .await?
            .ok_or_else(|| OrderEngineError::CouponInvalid(crate::coupons::CouponRejection::NotFound(code.to_string())))
    }
}

impl BankReconciliationManagement for SqliteDatabase {
    async fn ingest_bank_transaction(
        &self,
        txn: NewBankTransaction,
    ) -> Result<(BankTransaction, MatchOutcome), OrderEngineError> {
        if txn.account_ref.trim().is_empty() || txn.external_txn_id.trim().is_empty() {
            return Err(OrderEngineError::validation("A bank transaction needs an account and a transaction id"));
        }
        if txn.amount.is_negative() {
            return Err(OrderEngineError::validation("Bank transaction amounts are unsigned. Use the direction field"));
        }
        let mut tx = self.pool.begin().await?;
        let stored = bank::insert_bank_transaction(txn, &mut tx).await?;
        let result = run_matcher(stored, &mut tx).await?;
        tx.commit().await?;
        Ok(result)
    }

    async fn reconcile_bank_transaction(&self, bank_transaction_id: i64) -> Result<MatchOutcome, OrderEngineError> {
        let mut tx = self.pool.begin().await?;
        if !bank::lock_bank_transaction(bank_transaction_id, &mut tx).await? {
            return Err(OrderEngineError::BankTransactionNotFound(bank_transaction_id));
        }
        if let Some(rec) = bank::fetch_reconciliation(bank_transaction_id, &mut tx).await? {
            return match (rec.is_linked(), rec.payment_id, rec.order_id) {
                (true, Some(payment_id), Some(order_id)) => {
                    Ok(MatchOutcome::Matched { payment_id, order_id, reconciliation_id: rec.id })
                },
                _ => {
                    debug!("🏦️ Bank transaction #{bank_transaction_id} was rejected by {:?}", rec.actor);
                    Ok(MatchOutcome::Unmatched)
                },
            };
        }
        let txn = bank::fetch_bank_transaction(bank_transaction_id, &mut tx)
            .await?
            .ok_or(OrderEngineError::BankTransactionNotFound(bank_transaction_id))?;
        let (_, outcome) = run_matcher(txn, &mut tx).await?;
        tx.commit().await?;
        Ok(outcome)
    }

    async fn resolve_bank_transaction(
        &self,
        bank_transaction_id: i64,
        resolution: ManualResolution,
        actor: &str,
    ) -> Result<BankReconciliation, OrderEngineError> {
        if actor.trim().is_empty() {
            return Err(OrderEngineError::validation("Manual reconciliation requires an actor"));
        }
        let mut tx = self.pool.begin().await?;
        if !bank::lock_bank_transaction(bank_transaction_id, &mut tx).await? {
            return Err(OrderEngineError::BankTransactionNotFound(bank_transaction_id));
        }
        let txn = bank::fetch_bank_transaction(bank_transaction_id, &mut tx)
            .await?
            .ok_or(OrderEngineError::BankTransactionNotFound(bank_transaction_id))?;
        let existing = bank::fetch_reconciliation(bank_transaction_id, &mut tx).await?;
        let (record, status) = match &resolution {
            ManualResolution::Link { payment_id } => {
                let payment = payments::fetch_payment(*payment_id, &mut tx)
                    .await?
                    .ok_or(OrderEngineError::PaymentNotFound(*payment_id))?;
                let already_ours = existing.as_ref().map(|r| r.payment_id == Some(payment.id)).unwrap_or(false);
                if !already_ours && !bank::linked_payment_ids(&[payment.id], &mut tx).await?.is_empty() {
                    return Err(OrderEngineError::validation(format!(
                        "Payment #{} is already linked to another bank transaction",
                        payment.id
                    )));
                }
                if payment.amount != txn.amount {
                    warn!(
                        "🏦️ {actor} is linking bank transaction #{bank_transaction_id} ({}) to payment #{} ({}) even \
                         though the amounts differ",
                        txn.amount, payment.id, payment.amount
                    );
                }
                let record = ReconciliationRecord {
                    payment_id: Some(payment.id),
                    order_id: Some(payment.order_id),
                    outcome: ReconciliationOutcome::ManualMatch,
                    actor: Some(actor),
                    note: None,
                };
                (record, BankTransactionStatus::Reconciled)
            },
            ManualResolution::Reject { note } => {
                if note.trim().is_empty() {
                    return Err(OrderEngineError::validation("A rejection needs a note"));
                }
                let record = ReconciliationRecord {
                    payment_id: None,
                    order_id: None,
                    outcome: ReconciliationOutcome::Rejected,
                    actor: Some(actor),
                    note: Some(note.as_str()),
                };
                let status = match txn.status {
                    BankTransactionStatus::Reconciled => BankTransactionStatus::Posted,
                    s => s,
                };
                (record, status)
            },
        };
        let rec = match existing {
            Some(_) => bank::override_reconciliation(bank_transaction_id, record, &mut tx)
                .await?
                .ok_or(OrderEngineError::BankTransactionNotFound(bank_transaction_id))?,
            None => bank::insert_reconciliation(bank_transaction_id, record, &mut tx).await?,
        };
        if status != txn.status {
            bank::set_status(bank_transaction_id, status, &mut tx).await?;
        }
        tx.commit().await?;
        info!("🏦️ {actor} resolved bank transaction #{bank_transaction_id} as {}", rec.outcome);
        Ok(rec)
    }

    async fn fetch_bank_transaction(&self, id: i64) -> Result<Option<BankTransaction>, OrderEngineError> {
        let mut conn = self.pool.acquire().await?;
        let txn = bank::fetch_bank_transaction(id, &mut conn).await?;
        Ok(txn)
    }

    async fn fetch_reconciliation(
        &self,
        bank_transaction_id: i64,
    ) -> Result<Option<BankReconciliation>, OrderEngineError> {
        let mut conn = self.pool.acquire().await?;
        let rec = bank::fetch_reconciliation(bank_transaction_id, &mut conn).await?;
        Ok(rec)
    }

    async fn fetch_reconciliations_for_order(
        &self,
        order_id: i64,
    ) -> Result<Vec<BankReconciliation>, OrderEngineError> {
        let mut conn = self.pool.acquire().await?;
        let recs = bank::fetch_reconciliations_for_order(order_id, &mut conn).await?;
        Ok(recs)
    }

    async fn fetch_unreconciled_transactions(&self) -> Result<Vec<BankTransaction>, OrderEngineError> {
        let mut conn = self.pool.acquire().await?;
        let txns = bank::fetch_unreconciled(&mut conn).await?;
        Ok(txns)
    }
}
