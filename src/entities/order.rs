//! Order entity - the immutable receipt of a purchase.
//!
//! An order records what was charged and how delivery went. At most one of
//! `stock_account_id` / `pooled_account_id` is populated; a PENDING order has
//! neither until an admin fulfils it manually.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::enums::DeliveryStatus;

/// Order database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    /// Unique identifier for the order
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Buyer
    #[sea_orm(indexed)]
    pub user_id: i64,
    /// Product purchased
    #[sea_orm(indexed)]
    pub product_id: i64,
    /// Stock slot allocated, for automatic (or manually fulfilled) delivery
    pub stock_account_id: Option<i64>,
    /// Pooled slot allocated, for email delivery
    pub pooled_account_id: Option<i64>,
    /// Amount actually charged at purchase time
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub amount_paid: Decimal,
    /// Customer email supplied for email-delivery products
    pub customer_email: Option<String>,
    /// DELIVERED or PENDING (awaiting manual fulfilment)
    pub delivery_status: DeliveryStatus,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
    #[sea_orm(
        belongs_to = "super::stock_account::Entity",
        from = "Column::StockAccountId",
        to = "super::stock_account::Column::Id"
    )]
    StockAccount,
    #[sea_orm(
        belongs_to = "super::pooled_account::Entity",
        from = "Column::PooledAccountId",
        to = "super::pooled_account::Column::Id"
    )]
    PooledAccount,
    /// At most one support ticket per order
    #[sea_orm(has_many = "super::ticket::Entity")]
    Tickets,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl Related<super::stock_account::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StockAccount.def()
    }
}

impl Related<super::ticket::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tickets.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
