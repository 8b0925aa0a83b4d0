use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Discount code entity
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "discount_codes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Stored upper-cased; buyer input is upper-cased before lookup
    pub code: String,

    /// Percentage off the checkout total, in the range 0..=100
    pub discount_percentage: Decimal,

    /// Last day the code is honoured; None means it never expires
    pub expiry_date: Option<NaiveDate>,

    /// -1 means unlimited uses
    pub max_uses: i32,
    pub used_count: i32,

    /// General codes work for anyone; personal codes bind to one client
    pub is_general: bool,
    pub client_id: Option<i64>,
    pub client_username: Option<String>,

    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
