use std::sync::Arc;

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use tracing::{info, instrument};

use crate::db::DbPool;
use crate::entities::payment_method::{self, Column as MethodColumn, Entity as PaymentMethod};
use crate::errors::ServiceError;

/// Directory of accepted payment currencies and their receiving addresses.
/// Currency codes are stored lower-cased.
pub struct PaymentMethodService {
    db_pool: Arc<DbPool>,
}

impl PaymentMethodService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// All configured methods in configuration order.
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<payment_method::Model>, ServiceError> {
        let methods = PaymentMethod::find()
            .order_by_asc(MethodColumn::Id)
            .all(&*self.db_pool)
            .await?;

        Ok(methods)
    }

    #[instrument(skip(self))]
    pub async fn get(
        &self,
        currency_code: &str,
    ) -> Result<Option<payment_method::Model>, ServiceError> {
        let normalized = Self::normalize(currency_code);
        let method = PaymentMethod::find()
            .filter(MethodColumn::CurrencyCode.eq(normalized))
            .one(&*self.db_pool)
            .await?;

        Ok(method)
    }

    /// Adds a currency, or replaces the address and network of an existing
    /// one. Returns the stored row.
    #[instrument(skip(self))]
    pub async fn upsert(
        &self,
        currency_code: &str,
        address: String,
        network: Option<String>,
    ) -> Result<payment_method::Model, ServiceError> {
        let normalized = Self::normalize(currency_code);
        if normalized.is_empty() {
            return Err(ServiceError::ValidationError(
                "Currency code cannot be empty".to_string(),
            ));
        }
        if address.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "Receiving address cannot be empty".to_string(),
            ));
        }

        let existing = PaymentMethod::find()
            .filter(MethodColumn::CurrencyCode.eq(normalized.clone()))
            .one(&*self.db_pool)
            .await?;

        let stored = match existing {
            Some(method) => {
                let mut model: payment_method::ActiveModel = method.into();
                model.address = Set(address);
                model.network = Set(network);
                model.updated_at = Set(Utc::now());
                model.update(&*self.db_pool).await?
            }
            None => {
                let now = Utc::now();
                payment_method::ActiveModel {
                    currency_code: Set(normalized.clone()),
                    address: Set(address),
                    network: Set(network),
                    created_at: Set(now),
                    updated_at: Set(now),
                    ..Default::default()
                }
                .insert(&*self.db_pool)
                .await?
            }
        };

        info!(currency = %normalized, "Payment method stored");
        Ok(stored)
    }

    #[instrument(skip(self))]
    pub async fn remove(&self, currency_code: &str) -> Result<(), ServiceError> {
        let normalized = Self::normalize(currency_code);
        let result = PaymentMethod::delete_many()
            .filter(MethodColumn::CurrencyCode.eq(normalized.clone()))
            .exec(&*self.db_pool)
            .await?;

        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "Payment method '{}' not found",
                normalized
            )));
        }

        info!(currency = %normalized, "Payment method removed");
        Ok(())
    }

    fn normalize(currency_code: &str) -> String {
        currency_code.trim().to_lowercase()
    }
}
