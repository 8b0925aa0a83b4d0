use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Enum representing the lifecycle of a placed order.
#[derive(
    Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum OrderStatus {
    /// Placed, awaiting manual payment confirmation by the operator
    #[sea_orm(string_value = "Pending")]
    Pending,
    /// Operator confirmed the payment and fulfillment was sent
    #[sea_orm(string_value = "Completed")]
    Completed,
    /// Operator rejected the payment
    #[sea_orm(string_value = "Rejected")]
    Rejected,
}

/// The `orders` table. Each row is one line item; all rows placed in the
/// same checkout share an `order_id` reference.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Short public reference, e.g. "3F9A21BC"
    pub order_id: String,

    pub client_id: i64,
    pub client_name: String,

    pub product_id: i32,
    pub product_name: String,
    pub quantity: i32,

    /// Total for the whole checkout after discounts, repeated on every row
    pub total_price: Decimal,

    pub payment_currency: String,
    pub payment_source_address: String,
    pub discount_code: Option<String>,

    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
