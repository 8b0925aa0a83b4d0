use std::sync::Arc;

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use tracing::{info, instrument};

use crate::db::DbPool;
use crate::entities::content_block::{self, Column as ContentColumn, Entity as ContentBlock};
use crate::errors::ServiceError;

/// Body shown when a key has never been set.
pub const MISSING_CONTENT: &str = "Content not found";

/// Key-value store for operator-editable storefront texts (welcome message,
/// about page, contact details, and so on).
pub struct ContentService {
    db_pool: Arc<DbPool>,
}

impl ContentService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// The body for a key if one was ever set.
    #[instrument(skip(self))]
    pub async fn find(&self, key: &str) -> Result<Option<String>, ServiceError> {
        let block = ContentBlock::find()
            .filter(ContentColumn::Key.eq(key))
            .one(&*self.db_pool)
            .await?;

        Ok(block.map(|b| b.body))
    }

    /// The body for a key, with the standard placeholder for unset keys.
    #[instrument(skip(self))]
    pub async fn get(&self, key: &str) -> Result<String, ServiceError> {
        let body = self.find(key).await?;
        Ok(body.unwrap_or_else(|| MISSING_CONTENT.to_string()))
    }

    /// Sets or replaces the body for a key.
    #[instrument(skip(self, body))]
    pub async fn set(&self, key: &str, body: String) -> Result<(), ServiceError> {
        if key.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "Content key cannot be empty".to_string(),
            ));
        }

        let existing = ContentBlock::find()
            .filter(ContentColumn::Key.eq(key))
            .one(&*self.db_pool)
            .await?;

        match existing {
            Some(block) => {
                let mut model: content_block::ActiveModel = block.into();
                model.body = Set(body);
                model.updated_at = Set(Utc::now());
                model.update(&*self.db_pool).await?;
            }
            None => {
                content_block::ActiveModel {
                    key: Set(key.to_string()),
                    body: Set(body),
                    updated_at: Set(Utc::now()),
                    ..Default::default()
                }
                .insert(&*self.db_pool)
                .await?;
            }
        }

        info!(key, "Content block stored");
        Ok(())
    }
}
