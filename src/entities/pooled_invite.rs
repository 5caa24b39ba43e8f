//! Pooled invite entity - one granted slot on a pooled account.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Pooled invite database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "pooled_invites")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Account the slot was granted on
    #[sea_orm(indexed)]
    pub pooled_account_id: i64,
    /// Customer email holding the slot; unique per account
    #[sea_orm(indexed)]
    pub customer_email: String,
    /// Purchase that produced this invite, when granted in a purchase context
    pub order_id: Option<i64>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::pooled_account::Entity",
        from = "Column::PooledAccountId",
        to = "super::pooled_account::Column::Id"
    )]
    PooledAccount,
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id"
    )]
    Order,
}

impl Related<super::pooled_account::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PooledAccount.def()
    }
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
