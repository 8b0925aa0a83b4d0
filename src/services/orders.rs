use std::sync::Arc;

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use prometheus::{register_int_counter, IntCounter};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::checkout::session::{CheckoutSession, OrderKind};
use crate::db::DbPool;
use crate::entities::cart_item::{Column as CartColumn, Entity as CartItem};
use crate::entities::order::{self, Column as OrderColumn, Entity as Order, OrderStatus};
use crate::entities::product::Entity as Product;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::catalog::{decrement_stock_on, StockOutcome};
use crate::services::discounts::{increment_usage_on, UsageOutcome};

lazy_static! {
    static ref ORDERS_PLACED: IntCounter =
        register_int_counter!("orders_placed_total", "Total number of orders committed")
            .expect("metric can be created");
    static ref CHECKOUT_CAPACITY_FAILURES: IntCounter = register_int_counter!(
        "checkout_capacity_failures_total",
        "Order commits rolled back because stock or a discount cap ran out"
    )
    .expect("metric can be created");
}

/// A committed order, as handed back to the checkout flow.
#[derive(Debug, Clone)]
pub struct PlacedOrder {
    pub order_id: String,
    pub placed_at: DateTime<Utc>,
}

/// The order ledger. One row per line item; rows of one checkout share an
/// order id and the repeated total, and change status together.
pub struct OrderService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl OrderService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Short public order reference: first eight hex chars of a v4 uuid,
    /// upper-cased.
    fn generate_order_id() -> String {
        let hex = Uuid::new_v4().simple().to_string();
        hex[..8].to_uppercase()
    }

    /// Commits a finished checkout atomically: order rows, stock
    /// decrements, cart clearing, and the discount usage increment all
    /// apply together or not at all.
    ///
    /// Stock and discount caps are re-checked here with conditional
    /// updates. A failed check rolls the whole transaction back and
    /// surfaces as `CapacityExceeded`; the caller keeps the session alive
    /// so the buyer can retry from payment selection.
    #[instrument(skip(self, session), fields(client_id = session.client_id))]
    pub async fn place_order(
        &self,
        session: &CheckoutSession,
        source_address: &str,
    ) -> Result<PlacedOrder, ServiceError> {
        if session.items.is_empty() {
            return Err(ServiceError::InvalidOperation(
                "Checkout has no line items".to_string(),
            ));
        }
        let currency = session.payment_currency.as_deref().ok_or_else(|| {
            ServiceError::InvalidOperation("Checkout has no payment method selected".to_string())
        })?;

        let txn = self.db_pool.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start order commit transaction");
            ServiceError::DatabaseError(e)
        })?;

        let order_id = Self::generate_order_id();
        let placed_at = Utc::now();

        let mut depleted = Vec::new();
        for item in &session.items {
            match decrement_stock_on(&txn, item.product_id, item.quantity).await? {
                StockOutcome::Decremented => {}
                StockOutcome::Insufficient => {
                    txn.rollback().await.map_err(ServiceError::DatabaseError)?;
                    CHECKOUT_CAPACITY_FAILURES.inc();
                    warn!(
                        client_id = session.client_id,
                        product_id = item.product_id,
                        "Order commit aborted: insufficient stock"
                    );
                    return Err(ServiceError::CapacityExceeded(format!(
                        "Not enough stock left for {}",
                        item.name
                    )));
                }
            }

            let remaining = Product::find_by_id(item.product_id).one(&txn).await?;
            if let Some(product) = remaining {
                if product.quantity == 0 {
                    depleted.push((product.id, product.name));
                }
            }
        }

        for item in &session.items {
            order::ActiveModel {
                order_id: Set(order_id.clone()),
                client_id: Set(session.client_id),
                client_name: Set(session.display_name().to_string()),
                product_id: Set(item.product_id),
                product_name: Set(item.name.clone()),
                quantity: Set(item.quantity),
                total_price: Set(session.total),
                payment_currency: Set(currency.to_string()),
                payment_source_address: Set(source_address.to_string()),
                discount_code: Set(session.discount_code.clone()),
                status: Set(OrderStatus::Pending),
                created_at: Set(placed_at),
                ..Default::default()
            }
            .insert(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, order_id = %order_id, "Failed to insert order row");
                ServiceError::DatabaseError(e)
            })?;
        }

        if session.kind == OrderKind::CartCheckout {
            CartItem::delete_many()
                .filter(CartColumn::ClientId.eq(session.client_id))
                .exec(&txn)
                .await?;
        }

        if let Some(code) = &session.discount_code {
            match increment_usage_on(&txn, code).await? {
                UsageOutcome::Incremented => {}
                UsageOutcome::CapReached => {
                    txn.rollback().await.map_err(ServiceError::DatabaseError)?;
                    CHECKOUT_CAPACITY_FAILURES.inc();
                    warn!(
                        client_id = session.client_id,
                        code = %code,
                        "Order commit aborted: discount code has no uses left"
                    );
                    return Err(ServiceError::CapacityExceeded(format!(
                        "Discount code {} has no uses left",
                        code
                    )));
                }
            }
        }

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to commit order transaction");
            ServiceError::DatabaseError(e)
        })?;

        ORDERS_PLACED.inc();
        info!(
            order_id = %order_id,
            client_id = session.client_id,
            total = %session.total,
            "Order placed"
        );

        self.event_sender
            .send_or_log(Event::OrderPlaced {
                order_id: order_id.clone(),
                client_id: session.client_id,
                total: session.total,
            })
            .await;
        for (product_id, product_name) in depleted {
            self.event_sender
                .send_or_log(Event::StockDepleted {
                    product_id,
                    product_name,
                })
                .await;
        }

        Ok(PlacedOrder {
            order_id,
            placed_at,
        })
    }

    /// All rows sharing an order id, in insertion order.
    #[instrument(skip(self))]
    pub async fn rows(&self, order_id: &str) -> Result<Vec<order::Model>, ServiceError> {
        let rows = Order::find()
            .filter(OrderColumn::OrderId.eq(order_id))
            .order_by_asc(OrderColumn::Id)
            .all(&*self.db_pool)
            .await?;

        Ok(rows)
    }

    /// Pending rows across all orders, oldest first.
    #[instrument(skip(self))]
    pub async fn pending_rows(&self) -> Result<Vec<order::Model>, ServiceError> {
        let rows = Order::find()
            .filter(OrderColumn::Status.eq(OrderStatus::Pending))
            .order_by_asc(OrderColumn::Id)
            .all(&*self.db_pool)
            .await?;

        Ok(rows)
    }

    /// Forces every row of an order to a status, returning how many rows
    /// changed. The confirmation workflow uses its own guarded transition;
    /// this is the unconditional ledger operation.
    #[instrument(skip(self))]
    pub async fn set_status(
        &self,
        order_id: &str,
        status: OrderStatus,
    ) -> Result<u64, ServiceError> {
        let result = Order::update_many()
            .col_expr(
                OrderColumn::Status,
                sea_orm::sea_query::Expr::value(status),
            )
            .filter(OrderColumn::OrderId.eq(order_id))
            .exec(&*self.db_pool)
            .await?;

        Ok(result.rows_affected)
    }

    /// (total, completed, pending) row counts for the statistics screen.
    #[instrument(skip(self))]
    pub async fn status_counts(&self) -> Result<(u64, u64, u64), ServiceError> {
        let total = Order::find().count(&*self.db_pool).await?;
        let completed = Order::find()
            .filter(OrderColumn::Status.eq(OrderStatus::Completed))
            .count(&*self.db_pool)
            .await?;
        let pending = Order::find()
            .filter(OrderColumn::Status.eq(OrderStatus::Pending))
            .count(&*self.db_pool)
            .await?;

        Ok((total, completed, pending))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkout::session::LineItem;
    use crate::entities::{cart_item, discount_code, product};
    use rust_decimal_macros::dec;
    use tokio::sync::mpsc;

    async fn test_db() -> Arc<DbPool> {
        let mut opt = sea_orm::ConnectOptions::new("sqlite::memory:".to_string());
        // one connection, so every query sees the same in-memory database
        opt.max_connections(1);
        let db = sea_orm::Database::connect(opt)
            .await
            .expect("in-memory sqlite");
        use sea_orm_migration::MigratorTrait;
        crate::migrator::Migrator::up(&db, None)
            .await
            .expect("migrations");
        Arc::new(db)
    }

    fn service(db: Arc<DbPool>) -> OrderService {
        let (tx, _rx) = mpsc::channel(16);
        OrderService::new(db, Arc::new(EventSender::new(tx)))
    }

    async fn seed_product(
        db: &DbPool,
        name: &str,
        price: rust_decimal::Decimal,
        quantity: i32,
    ) -> i32 {
        product::ActiveModel {
            name: Set(name.to_string()),
            price: Set(price),
            quantity: Set(quantity),
            ..Default::default()
        }
        .insert(db)
        .await
        .expect("seed product")
        .id
    }

    async fn seed_cart_row(db: &DbPool, client_id: i64, product_id: i32, quantity: i32) {
        cart_item::ActiveModel {
            client_id: Set(client_id),
            product_id: Set(product_id),
            quantity: Set(quantity),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await
        .expect("seed cart row");
    }

    async fn seed_code(db: &DbPool, code: &str, max_uses: i32, used_count: i32) {
        discount_code::ActiveModel {
            code: Set(code.to_string()),
            discount_percentage: Set(dec!(20)),
            expiry_date: Set(None),
            max_uses: Set(max_uses),
            used_count: Set(used_count),
            is_general: Set(true),
            client_id: Set(None),
            client_username: Set(None),
            is_active: Set(true),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await
        .expect("seed discount code");
    }

    fn cart_session(items: Vec<LineItem>) -> CheckoutSession {
        let mut session = CheckoutSession::from_cart(
            10,
            10,
            Some("alice".to_string()),
            "Alice".to_string(),
            items,
        );
        session.skip_discount();
        session.choose_payment_method("btc".to_string(), "bc1qshop".to_string());
        session.acknowledge_payment();
        session
    }

    fn buy_now_session(item: LineItem) -> CheckoutSession {
        let mut session = CheckoutSession::buy_now(10, 10, None, "Alice".to_string(), item);
        session.skip_discount();
        session.choose_payment_method("btc".to_string(), "bc1qshop".to_string());
        session.acknowledge_payment();
        session
    }

    async fn product_quantity(db: &DbPool, id: i32) -> i32 {
        Product::find_by_id(id)
            .one(db)
            .await
            .unwrap()
            .unwrap()
            .quantity
    }

    #[tokio::test]
    async fn cart_commit_writes_rows_decrements_stock_and_clears_cart() {
        let db = test_db().await;
        let svc = service(db.clone());
        let a = seed_product(&db, "Product A", dec!(10.00), 5).await;
        let b = seed_product(&db, "Product B", dec!(5.00), 1).await;
        seed_cart_row(&db, 10, a, 2).await;
        seed_cart_row(&db, 10, b, 1).await;

        let session = cart_session(vec![
            LineItem {
                product_id: a,
                name: "Product A".to_string(),
                price: dec!(10.00),
                quantity: 2,
            },
            LineItem {
                product_id: b,
                name: "Product B".to_string(),
                price: dec!(5.00),
                quantity: 1,
            },
        ]);

        let placed = svc.place_order(&session, "bc1qbuyer").await.unwrap();
        assert_eq!(placed.order_id.len(), 8);
        assert_eq!(placed.order_id, placed.order_id.to_uppercase());

        let rows = svc.rows(&placed.order_id).await.unwrap();
        assert_eq!(rows.len(), 2);
        for row in &rows {
            assert_eq!(row.status, OrderStatus::Pending);
            assert_eq!(row.total_price, dec!(25.00));
            assert_eq!(row.client_name, "alice");
            assert_eq!(row.payment_currency, "btc");
            assert_eq!(row.payment_source_address, "bc1qbuyer");
        }

        assert_eq!(product_quantity(&db, a).await, 3);
        assert_eq!(product_quantity(&db, b).await, 0);
        let cart_left = CartItem::find()
            .filter(CartColumn::ClientId.eq(10i64))
            .count(&*db)
            .await
            .unwrap();
        assert_eq!(cart_left, 0);
    }

    #[tokio::test]
    async fn insufficient_stock_rolls_back_everything() {
        let db = test_db().await;
        let svc = service(db.clone());
        let a = seed_product(&db, "Product A", dec!(10.00), 5).await;
        let b = seed_product(&db, "Product B", dec!(5.00), 0).await;
        seed_cart_row(&db, 10, a, 2).await;
        seed_cart_row(&db, 10, b, 1).await;

        let session = cart_session(vec![
            LineItem {
                product_id: a,
                name: "Product A".to_string(),
                price: dec!(10.00),
                quantity: 2,
            },
            LineItem {
                product_id: b,
                name: "Product B".to_string(),
                price: dec!(5.00),
                quantity: 1,
            },
        ]);

        let err = svc.place_order(&session, "bc1qbuyer").await.unwrap_err();
        assert!(matches!(err, ServiceError::CapacityExceeded(_)));

        // the first product's decrement must roll back with the rest
        assert_eq!(product_quantity(&db, a).await, 5);
        assert_eq!(Order::find().count(&*db).await.unwrap(), 0);
        assert_eq!(CartItem::find().count(&*db).await.unwrap(), 2);
    }

    fn discounted_buy_now_session(item: LineItem) -> CheckoutSession {
        let mut session = CheckoutSession::buy_now(10, 10, None, "Alice".to_string(), item);
        session.apply_discount("ONCE".to_string(), dec!(20));
        session.choose_payment_method("btc".to_string(), "bc1qshop".to_string());
        session.acknowledge_payment();
        session
    }

    #[tokio::test]
    async fn exhausted_discount_rolls_back_the_commit() {
        let db = test_db().await;
        let svc = service(db.clone());
        let a = seed_product(&db, "Product A", dec!(10.00), 5).await;
        seed_code(&db, "ONCE", 1, 1).await;

        let session = discounted_buy_now_session(LineItem {
            product_id: a,
            name: "Product A".to_string(),
            price: dec!(10.00),
            quantity: 1,
        });

        let err = svc.place_order(&session, "bc1qbuyer").await.unwrap_err();
        assert!(matches!(err, ServiceError::CapacityExceeded(_)));

        assert_eq!(product_quantity(&db, a).await, 5);
        assert_eq!(Order::find().count(&*db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn successful_commit_consumes_one_discount_use() {
        let db = test_db().await;
        let svc = service(db.clone());
        let a = seed_product(&db, "Product A", dec!(10.00), 5).await;
        seed_code(&db, "ONCE", 1, 0).await;

        let session = discounted_buy_now_session(LineItem {
            product_id: a,
            name: "Product A".to_string(),
            price: dec!(10.00),
            quantity: 1,
        });

        let placed = svc.place_order(&session, "bc1qbuyer").await.unwrap();
        let rows = svc.rows(&placed.order_id).await.unwrap();
        assert_eq!(rows[0].total_price, dec!(8.00));
        assert_eq!(rows[0].discount_code.as_deref(), Some("ONCE"));

        use crate::entities::discount_code::Entity as DiscountCode;
        let code = DiscountCode::find().one(&*db).await.unwrap().unwrap();
        assert_eq!(code.used_count, 1);
    }

    #[tokio::test]
    async fn buy_now_leaves_the_cart_alone() {
        let db = test_db().await;
        let svc = service(db.clone());
        let a = seed_product(&db, "Product A", dec!(10.00), 5).await;
        let b = seed_product(&db, "Product B", dec!(5.00), 5).await;
        seed_cart_row(&db, 10, b, 1).await;

        let session = buy_now_session(LineItem {
            product_id: a,
            name: "Product A".to_string(),
            price: dec!(10.00),
            quantity: 1,
        });
        svc.place_order(&session, "bc1qbuyer").await.unwrap();

        assert_eq!(CartItem::find().count(&*db).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn status_counts_track_transitions() {
        let db = test_db().await;
        let svc = service(db.clone());
        let a = seed_product(&db, "Product A", dec!(10.00), 5).await;

        let session = buy_now_session(LineItem {
            product_id: a,
            name: "Product A".to_string(),
            price: dec!(10.00),
            quantity: 1,
        });
        let placed = svc.place_order(&session, "bc1qbuyer").await.unwrap();
        assert_eq!(svc.status_counts().await.unwrap(), (1, 0, 1));
        assert_eq!(svc.pending_rows().await.unwrap().len(), 1);

        let changed = svc
            .set_status(&placed.order_id, OrderStatus::Completed)
            .await
            .unwrap();
        assert_eq!(changed, 1);
        assert_eq!(svc.status_counts().await.unwrap(), (1, 1, 0));
    }
}
