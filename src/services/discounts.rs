use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use tracing::{error, info, instrument};

use crate::db::DbPool;
use crate::entities::discount_code::{self, Column as CodeColumn, Entity as DiscountCode};
use crate::errors::ServiceError;

/// What a conditional usage increment did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageOutcome {
    Incremented,
    CapReached,
}

/// Consumes one use of a code, but only while the cap allows it. A single
/// conditional UPDATE on the caller's connection; with N max uses, at most
/// N commits can ever win no matter how many checkouts validated the code
/// earlier. A vanished code counts as CapReached: nothing was consumed.
pub(crate) async fn increment_usage_on<C: ConnectionTrait>(
    conn: &C,
    code: &str,
) -> Result<UsageOutcome, ServiceError> {
    let result = DiscountCode::update_many()
        .col_expr(
            CodeColumn::UsedCount,
            Expr::col(CodeColumn::UsedCount).add(1),
        )
        .filter(CodeColumn::Code.eq(code))
        .filter(
            Condition::any()
                .add(CodeColumn::MaxUses.eq(-1))
                .add(Expr::col(CodeColumn::UsedCount).lt(Expr::col(CodeColumn::MaxUses))),
        )
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        return Ok(UsageOutcome::CapReached);
    }
    Ok(UsageOutcome::Incremented)
}

/// Registry of discount codes. Codes are stored and matched upper-cased.
pub struct DiscountService {
    db_pool: Arc<DbPool>,
}

impl DiscountService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Looks a code up by its normalized form.
    #[instrument(skip(self))]
    pub async fn lookup(&self, code: &str) -> Result<Option<discount_code::Model>, ServiceError> {
        let normalized = Self::normalize(code);
        let found = DiscountCode::find()
            .filter(CodeColumn::Code.eq(normalized))
            .one(&*self.db_pool)
            .await?;

        Ok(found)
    }

    /// Creates a code anyone may redeem.
    #[instrument(skip(self))]
    pub async fn create_general(
        &self,
        code: &str,
        percentage: Decimal,
        expiry_date: Option<NaiveDate>,
        max_uses: i32,
    ) -> Result<i32, ServiceError> {
        self.create(code, percentage, expiry_date, max_uses, true, None, None)
            .await
    }

    /// Creates a code bound to a specific buyer, by id and/or handle.
    #[instrument(skip(self))]
    pub async fn create_client_bound(
        &self,
        code: &str,
        percentage: Decimal,
        expiry_date: Option<NaiveDate>,
        max_uses: i32,
        client_id: Option<i64>,
        client_username: Option<String>,
    ) -> Result<i32, ServiceError> {
        if client_id.is_none() && client_username.is_none() {
            return Err(ServiceError::ValidationError(
                "A client-bound code needs a client id or a username".to_string(),
            ));
        }
        self.create(
            code,
            percentage,
            expiry_date,
            max_uses,
            false,
            client_id,
            client_username,
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn create(
        &self,
        code: &str,
        percentage: Decimal,
        expiry_date: Option<NaiveDate>,
        max_uses: i32,
        is_general: bool,
        client_id: Option<i64>,
        client_username: Option<String>,
    ) -> Result<i32, ServiceError> {
        let normalized = Self::normalize(code);
        if normalized.is_empty() {
            return Err(ServiceError::ValidationError(
                "Discount code cannot be empty".to_string(),
            ));
        }
        if percentage <= Decimal::ZERO || percentage > Decimal::ONE_HUNDRED {
            return Err(ServiceError::ValidationError(
                "Discount percentage must be between 0 and 100".to_string(),
            ));
        }
        if max_uses < -1 || max_uses == 0 {
            return Err(ServiceError::ValidationError(
                "Max uses must be positive, or -1 for unlimited".to_string(),
            ));
        }

        let existing = DiscountCode::find()
            .filter(CodeColumn::Code.eq(normalized.clone()))
            .one(&*self.db_pool)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::ValidationError(format!(
                "Discount code '{}' already exists",
                normalized
            )));
        }

        let model = discount_code::ActiveModel {
            code: Set(normalized.clone()),
            discount_percentage: Set(percentage),
            expiry_date: Set(expiry_date),
            max_uses: Set(max_uses),
            used_count: Set(0),
            is_general: Set(is_general),
            client_id: Set(client_id),
            client_username: Set(client_username),
            is_active: Set(true),
            created_at: Set(chrono::Utc::now()),
            ..Default::default()
        };

        let created = model.insert(&*self.db_pool).await.map_err(|e| {
            error!(error = %e, code = %normalized, "Failed to create discount code");
            ServiceError::DatabaseError(e)
        })?;

        info!(code = %normalized, is_general, "Discount code created");
        Ok(created.id)
    }

    /// Every code, newest first, for the operator listing.
    #[instrument(skip(self))]
    pub async fn list_all(&self) -> Result<Vec<discount_code::Model>, ServiceError> {
        let codes = DiscountCode::find()
            .order_by_desc(CodeColumn::CreatedAt)
            .all(&*self.db_pool)
            .await?;

        Ok(codes)
    }

    /// Standalone capped increment, outside any checkout transaction.
    #[instrument(skip(self))]
    pub async fn increment_usage(&self, code: &str) -> Result<UsageOutcome, ServiceError> {
        let normalized = Self::normalize(code);
        increment_usage_on(&*self.db_pool, &normalized).await
    }

    /// (total, active) code counts for the statistics screen.
    #[instrument(skip(self))]
    pub async fn counts(&self) -> Result<(u64, u64), ServiceError> {
        let total = DiscountCode::find().count(&*self.db_pool).await?;
        let active = DiscountCode::find()
            .filter(CodeColumn::IsActive.eq(true))
            .count(&*self.db_pool)
            .await?;

        Ok((total, active))
    }

    fn normalize(code: &str) -> String {
        code.trim().to_uppercase()
    }
}
