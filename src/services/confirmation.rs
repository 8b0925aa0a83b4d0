use std::sync::Arc;

use lazy_static::lazy_static;
use prometheus::{register_int_counter, IntCounter};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use tracing::{error, info, instrument};

use crate::db::DbPool;
use crate::entities::order::{self, Column as OrderColumn, Entity as Order, OrderStatus};
use crate::entities::product::Entity as Product;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::notifications::{NotificationChannel, OutboundMessage};
use crate::services::content::ContentService;

lazy_static! {
    static ref ORDER_CONFIRMATIONS: IntCounter = register_int_counter!(
        "order_confirmations_total",
        "Orders confirmed by the operator"
    )
    .expect("metric can be created");
    static ref ORDER_REJECTIONS: IntCounter = register_int_counter!(
        "order_rejections_total",
        "Orders rejected by the operator"
    )
    .expect("metric can be created");
}

/// Resolves pending orders after the operator has checked the wallet.
///
/// An order resolves exactly once: the pending -> completed / rejected
/// transition is a conditional update over every row of the order, so a
/// second attempt (or a confirm after a reject) changes nothing and
/// reports the order as already resolved.
pub struct ConfirmationService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    notifier: Arc<dyn NotificationChannel>,
    content: Arc<ContentService>,
}

impl ConfirmationService {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        notifier: Arc<dyn NotificationChannel>,
        content: Arc<ContentService>,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            notifier,
            content,
        }
    }

    async fn load_rows(&self, order_id: &str) -> Result<Vec<order::Model>, ServiceError> {
        let rows = Order::find()
            .filter(OrderColumn::OrderId.eq(order_id))
            .order_by_asc(OrderColumn::Id)
            .all(&*self.db_pool)
            .await?;

        Ok(rows)
    }

    /// Flips every still-pending row of the order to `to`. Zero rows
    /// affected means someone already resolved it.
    async fn resolve(&self, order_id: &str, to: OrderStatus) -> Result<u64, ServiceError> {
        let result = Order::update_many()
            .col_expr(OrderColumn::Status, sea_orm::sea_query::Expr::value(to))
            .filter(OrderColumn::OrderId.eq(order_id))
            .filter(OrderColumn::Status.eq(OrderStatus::Pending))
            .exec(&*self.db_pool)
            .await?;

        Ok(result.rows_affected)
    }

    /// Marks the order completed and delivers the goods: one fulfillment
    /// message per line item, with location and product photos where the
    /// product has them, then the configured success message if any.
    ///
    /// Delivery is best effort; a failed send is logged and does not undo
    /// the confirmation.
    #[instrument(skip(self))]
    pub async fn confirm(&self, order_id: &str) -> Result<(), ServiceError> {
        let rows = self.load_rows(order_id).await?;
        if rows.is_empty() {
            return Err(ServiceError::NotFound(format!(
                "Order {} not found",
                order_id
            )));
        }

        let flipped = self.resolve(order_id, OrderStatus::Completed).await?;
        if flipped == 0 {
            return Err(ServiceError::InvalidOperation(format!(
                "Order {} is already resolved",
                order_id
            )));
        }

        let client_id = rows[0].client_id;
        for row in &rows {
            self.deliver_fulfillment(row).await?;
        }

        if let Some(success) = self.content.find("success_message").await? {
            let message = OutboundMessage::to_client(client_id, success);
            if let Err(e) = self.notifier.send(message).await {
                error!(error = %e, order_id = %order_id, "Failed to deliver success message");
            }
        }

        ORDER_CONFIRMATIONS.inc();
        info!(order_id = %order_id, client_id, "Order confirmed");
        self.event_sender
            .send_or_log(Event::OrderCompleted(order_id.to_string()))
            .await;

        Ok(())
    }

    async fn deliver_fulfillment(&self, row: &order::Model) -> Result<(), ServiceError> {
        let product = Product::find_by_id(row.product_id).one(&*self.db_pool).await?;

        let mut text = format!(
            "✅ Your payment has been confirmed!\n\n🛍️ Product: {}\n📦 Quantity: {}",
            row.product_name, row.quantity
        );
        if let Some(coordinates) = product.as_ref().and_then(|p| p.coordinates.as_deref()) {
            if !coordinates.is_empty() {
                text.push_str(&format!("\n📍 Location: {}", coordinates));
            }
        }

        let mut message = OutboundMessage::to_client(row.client_id, text);
        if let Some(product) = &product {
            if let Some(image) = &product.image1 {
                message = message.with_attachment(image.clone(), Some("Product image 1".to_string()));
            }
            if let Some(image) = &product.image2 {
                message = message.with_attachment(image.clone(), Some("Product image 2".to_string()));
            }
        }

        if let Err(e) = self.notifier.send(message).await {
            error!(
                error = %e,
                order_id = %row.order_id,
                product_id = row.product_id,
                "Failed to deliver fulfillment message"
            );
        }

        Ok(())
    }

    /// Marks the order rejected and tells the buyer to get in touch.
    #[instrument(skip(self))]
    pub async fn reject(&self, order_id: &str) -> Result<(), ServiceError> {
        let rows = self.load_rows(order_id).await?;
        if rows.is_empty() {
            return Err(ServiceError::NotFound(format!(
                "Order {} not found",
                order_id
            )));
        }

        let flipped = self.resolve(order_id, OrderStatus::Rejected).await?;
        if flipped == 0 {
            return Err(ServiceError::InvalidOperation(format!(
                "Order {} is already resolved",
                order_id
            )));
        }

        let client_id = rows[0].client_id;
        let notice = OutboundMessage::to_client(
            client_id,
            format!(
                "❌ Your payment for order {} has been rejected. Please contact admin.",
                order_id
            ),
        );
        if let Err(e) = self.notifier.send(notice).await {
            error!(error = %e, order_id = %order_id, "Failed to deliver rejection notice");
        }

        ORDER_REJECTIONS.inc();
        info!(order_id = %order_id, client_id, "Order rejected");
        self.event_sender
            .send_or_log(Event::OrderRejected(order_id.to_string()))
            .await;

        Ok(())
    }
}
