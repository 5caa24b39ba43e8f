//! Product entity - a catalog entry with price and delivery strategy.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::enums::DeliveryKind;

/// Product database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    /// Unique identifier for the product
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Catalog name (e.g. "Netflix 4K", "YouTube Premium")
    #[sea_orm(unique)]
    pub name: String,
    /// Optional catalog description shown to buyers
    pub description: Option<String>,
    /// Price in wallet currency, two-decimal fixed point
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub price: Decimal,
    /// Inactive products cannot be purchased
    pub is_active: bool,
    /// Fulfilment strategy applied at purchase time
    pub delivery_kind: DeliveryKind,
    /// Free text appended to every delivery message for this product
    pub post_purchase_instructions: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One product has many stock accounts
    #[sea_orm(has_many = "super::stock_account::Entity")]
    StockAccounts,
    /// One product has many pooled accounts
    #[sea_orm(has_many = "super::pooled_account::Entity")]
    PooledAccounts,
    /// One product has many orders
    #[sea_orm(has_many = "super::order::Entity")]
    Orders,
}

impl Related<super::stock_account::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StockAccounts.def()
    }
}

impl Related<super::pooled_account::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PooledAccounts.def()
    }
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Orders.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
