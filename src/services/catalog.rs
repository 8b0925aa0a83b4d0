use std::sync::Arc;

use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use tracing::{error, info, instrument};

use crate::db::DbPool;
use crate::entities::product::{self, Column as ProductColumn, Entity as Product};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

/// What a conditional stock decrement did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockOutcome {
    Decremented,
    Insufficient,
}

/// Decrements stock only while enough is on hand, as a single conditional
/// UPDATE. Runs on the caller's connection so the order commit can execute
/// it inside its transaction; the affected-row count is the success signal,
/// which keeps concurrent checkouts from driving stock negative.
pub(crate) async fn decrement_stock_on<C: ConnectionTrait>(
    conn: &C,
    product_id: i32,
    quantity: i32,
) -> Result<StockOutcome, ServiceError> {
    let result = Product::update_many()
        .col_expr(
            ProductColumn::Quantity,
            Expr::col(ProductColumn::Quantity).sub(quantity),
        )
        .filter(ProductColumn::Id.eq(product_id))
        .filter(ProductColumn::Quantity.gte(quantity))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        return Ok(StockOutcome::Insufficient);
    }
    Ok(StockOutcome::Decremented)
}

/// Service for the product catalog.
pub struct CatalogService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl CatalogService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Products the storefront offers: active, in stock, ordered by name.
    #[instrument(skip(self))]
    pub async fn list_available(&self) -> Result<Vec<product::Model>, ServiceError> {
        let products = Product::find()
            .filter(ProductColumn::IsActive.eq(true))
            .filter(ProductColumn::Quantity.gt(0))
            .order_by_asc(ProductColumn::Name)
            .all(&*self.db_pool)
            .await?;

        Ok(products)
    }

    /// Every product regardless of state, for the operator listing.
    #[instrument(skip(self))]
    pub async fn list_all(&self) -> Result<Vec<product::Model>, ServiceError> {
        let products = Product::find()
            .order_by_asc(ProductColumn::Name)
            .all(&*self.db_pool)
            .await?;

        Ok(products)
    }

    /// Fetches a product only if it is still active. Buyer-facing reads go
    /// through this so deactivated products behave as missing.
    #[instrument(skip(self))]
    pub async fn get_active(&self, id: i32) -> Result<Option<product::Model>, ServiceError> {
        let product = Product::find()
            .filter(ProductColumn::Id.eq(id))
            .filter(ProductColumn::IsActive.eq(true))
            .one(&*self.db_pool)
            .await?;

        Ok(product)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: i32) -> Result<Option<product::Model>, ServiceError> {
        let product = Product::find_by_id(id).one(&*self.db_pool).await?;
        Ok(product)
    }

    /// Creates a product and returns its id.
    #[instrument(skip(self))]
    pub async fn create(
        &self,
        name: String,
        price: Decimal,
        description: Option<String>,
        quantity: i32,
        image1: Option<String>,
        image2: Option<String>,
        coordinates: Option<String>,
    ) -> Result<i32, ServiceError> {
        if name.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "Product name cannot be empty".to_string(),
            ));
        }
        if price <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Product price must be positive".to_string(),
            ));
        }
        if quantity < 0 {
            return Err(ServiceError::ValidationError(
                "Product quantity cannot be negative".to_string(),
            ));
        }

        let model = product::ActiveModel {
            name: Set(name.clone()),
            description: Set(description),
            price: Set(price),
            quantity: Set(quantity),
            image1: Set(image1),
            image2: Set(image2),
            coordinates: Set(coordinates),
            ..Default::default()
        };

        let created = model.insert(&*self.db_pool).await.map_err(|e| {
            error!(error = %e, name = %name, "Failed to create product");
            ServiceError::DatabaseError(e)
        })?;

        info!(product_id = created.id, name = %name, "Product created");
        self.event_sender
            .send_or_log(Event::ProductCreated(created.id))
            .await;

        Ok(created.id)
    }

    /// Flips the active flag and returns the updated product.
    #[instrument(skip(self))]
    pub async fn toggle_active(&self, id: i32) -> Result<product::Model, ServiceError> {
        let product = Product::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", id)))?;

        let next = !product.is_active;
        let mut model: product::ActiveModel = product.into();
        model.is_active = Set(next);
        let updated = model.update(&*self.db_pool).await?;

        info!(product_id = id, is_active = next, "Product active flag toggled");
        self.event_sender
            .send_or_log(Event::ProductUpdated(id))
            .await;

        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: i32) -> Result<(), ServiceError> {
        let result = Product::delete_by_id(id).exec(&*self.db_pool).await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!("Product {} not found", id)));
        }

        info!(product_id = id, "Product deleted");
        self.event_sender
            .send_or_log(Event::ProductDeleted(id))
            .await;

        Ok(())
    }

    /// (total, active) product counts for the statistics screen.
    #[instrument(skip(self))]
    pub async fn counts(&self) -> Result<(u64, u64), ServiceError> {
        let total = Product::find().count(&*self.db_pool).await?;
        let active = Product::find()
            .filter(ProductColumn::IsActive.eq(true))
            .count(&*self.db_pool)
            .await?;

        Ok((total, active))
    }
}
