//! Ticket entity - a buyer's report that a delivered account is defective.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::enums::{TicketReason, TicketResolution, TicketStatus};

/// Ticket database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tickets")]
pub struct Model {
    /// Unique identifier for the ticket
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Order being disputed; unique, so at most one ticket per order
    #[sea_orm(unique)]
    pub order_id: i64,
    /// Buyer who filed the report
    #[sea_orm(indexed)]
    pub user_id: i64,
    /// Account flagged defective at report time
    pub stock_account_id: Option<i64>,
    /// Reported defect category
    pub reason: TicketReason,
    /// Free-text details when the reason is OTHER
    pub details: Option<String>,
    #[sea_orm(indexed)]
    pub status: TicketStatus,
    pub resolution: TicketResolution,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id"
    )]
    Order,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
    #[sea_orm(
        belongs_to = "super::stock_account::Entity",
        from = "Column::StockAccountId",
        to = "super::stock_account::Column::Id"
    )]
    StockAccount,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::stock_account::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StockAccount.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
