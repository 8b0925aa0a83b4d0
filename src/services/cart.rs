use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use tracing::{info, instrument, warn};

use crate::db::DbPool;
use crate::entities::cart_item::{self, Column as CartColumn, Entity as CartItem};
use crate::entities::product::{self, Column as ProductColumn, Entity as Product};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

/// One cart line joined with its product, priced at the current price.
#[derive(Debug, Clone, PartialEq)]
pub struct CartEntry {
    pub product_id: i32,
    pub name: String,
    pub price: Decimal,
    pub quantity: i32,
}

impl CartEntry {
    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

/// What adding to the cart did. Stock and availability problems are
/// outcomes the buyer is told about, not service failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartAddOutcome {
    Added { product_name: String },
    NotAvailable,
    InsufficientStock,
}

/// Service for per-buyer carts.
pub struct CartService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl CartService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Adds one unit of a product, upserting the (buyer, product) row.
    /// The quantity is capped at the stock on hand; the hard reservation
    /// happens later, at order commit.
    #[instrument(skip(self))]
    pub async fn add(
        &self,
        client_id: i64,
        product_id: i32,
    ) -> Result<CartAddOutcome, ServiceError> {
        let db = &*self.db_pool;

        let product = Product::find()
            .filter(ProductColumn::Id.eq(product_id))
            .filter(ProductColumn::IsActive.eq(true))
            .one(db)
            .await?;
        let product = match product {
            Some(product) => product,
            None => return Ok(CartAddOutcome::NotAvailable),
        };

        let existing = CartItem::find()
            .filter(CartColumn::ClientId.eq(client_id))
            .filter(CartColumn::ProductId.eq(product_id))
            .one(db)
            .await?;

        let new_quantity = match existing {
            Some(item) => {
                if item.quantity + 1 > product.quantity {
                    return Ok(CartAddOutcome::InsufficientStock);
                }
                let quantity = item.quantity + 1;
                let mut model: cart_item::ActiveModel = item.into();
                model.quantity = Set(quantity);
                model.update(db).await?;
                quantity
            }
            None => {
                if product.quantity < 1 {
                    return Ok(CartAddOutcome::InsufficientStock);
                }
                cart_item::ActiveModel {
                    client_id: Set(client_id),
                    product_id: Set(product_id),
                    quantity: Set(1),
                    created_at: Set(Utc::now()),
                    ..Default::default()
                }
                .insert(db)
                .await?;
                1
            }
        };

        info!(
            client_id,
            product_id, new_quantity, "Cart item added"
        );
        self.event_sender
            .send_or_log(Event::CartItemAdded {
                client_id,
                product_id,
                quantity: new_quantity,
            })
            .await;

        Ok(CartAddOutcome::Added {
            product_name: product.name,
        })
    }

    /// The buyer's cart lines in insertion order, joined with products.
    #[instrument(skip(self))]
    pub async fn entries(&self, client_id: i64) -> Result<Vec<CartEntry>, ServiceError> {
        let rows = CartItem::find()
            .filter(CartColumn::ClientId.eq(client_id))
            .order_by_asc(CartColumn::Id)
            .find_also_related(Product)
            .all(&*self.db_pool)
            .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for (item, product) in rows {
            match product {
                Some(product) => entries.push(CartEntry {
                    product_id: product.id,
                    name: product.name,
                    price: product.price,
                    quantity: item.quantity,
                }),
                None => {
                    // product deleted after it was carted; drop the line
                    warn!(
                        client_id,
                        product_id = item.product_id,
                        "Cart references a missing product, skipping"
                    );
                }
            }
        }

        Ok(entries)
    }

    /// Empties the buyer's cart, returning how many lines were removed.
    #[instrument(skip(self))]
    pub async fn clear(&self, client_id: i64) -> Result<u64, ServiceError> {
        let result = CartItem::delete_many()
            .filter(CartColumn::ClientId.eq(client_id))
            .exec(&*self.db_pool)
            .await?;

        if result.rows_affected > 0 {
            info!(client_id, lines = result.rows_affected, "Cart cleared");
            self.event_sender
                .send_or_log(Event::CartCleared(client_id))
                .await;
        }

        Ok(result.rows_affected)
    }

    /// Cart lines across all buyers, for the statistics screen.
    #[instrument(skip(self))]
    pub async fn count_lines(&self) -> Result<u64, ServiceError> {
        let count = CartItem::find().count(&*self.db_pool).await?;
        Ok(count)
    }
}
