//! User entity - a storefront customer (or administrator) and their wallet.
//!
//! Users are created on first contact with the bot and never deleted. The
//! wallet balance is only ever mutated through the ledger operations so the
//! non-negativity invariant stays enforced in one place.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// User database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// Unique identifier for the user
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Stable external identity (Telegram user id)
    #[sea_orm(unique)]
    pub telegram_id: i64,
    /// Display name as last seen on Telegram
    pub full_name: String,
    /// Spendable stored value, two-decimal fixed point, never negative
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub wallet_balance: Decimal,
    /// Whether this user may perform admin operations
    pub is_admin: bool,
    /// The user who referred this one, captured at creation; one level only
    pub referrer_id: Option<i64>,
    /// Cashback percentage earned as a referrer, consumed on the next top-up
    pub pending_cashback_percent: Option<i32>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One user has many orders
    #[sea_orm(has_many = "super::order::Entity")]
    Orders,
    /// One user has many top-ups
    #[sea_orm(has_many = "super::top_up::Entity")]
    TopUps,
    /// One user has many support tickets
    #[sea_orm(has_many = "super::ticket::Entity")]
    Tickets,
    /// Self-referential referrer link (one level, never chained)
    #[sea_orm(
        belongs_to = "Entity",
        from = "Column::ReferrerId",
        to = "Column::Id"
    )]
    Referrer,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Orders.def()
    }
}

impl Related<super::top_up::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TopUps.def()
    }
}

impl Related<super::ticket::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tickets.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
