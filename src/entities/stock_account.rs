//! Stock account entity - one shared credential in the automatic pool.
//!
//! Each account carries a bounded number of concurrent slots. Allocation
//! increments `occupied_slots`; an account that reaches capacity is
//! deactivated automatically and never reactivated by the system.
//! `needs_attention` marks an account reported defective and removes it
//! from allocation until an admin clears the flag.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Stock account database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_accounts")]
pub struct Model {
    /// Unique identifier for the stock account
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Product this credential belongs to
    #[sea_orm(indexed)]
    pub product_id: i64,
    /// Login half of the credential pair (stored in the clear)
    pub login: String,
    /// Secret half, encrypted at rest; never returned undecrypted
    pub secret_enc: String,
    /// Concurrent-access capacity of this credential
    pub max_slots: i32,
    /// Slots already handed out; invariant 0 <= occupied_slots <= max_slots
    pub occupied_slots: i32,
    /// Inactive accounts are never selected by the allocator
    pub is_active: bool,
    /// Set when a buyer reports the account defective; excludes it from allocation
    pub needs_attention: bool,
    /// Subscription end date, if known; near-expiry stock is allocated first
    pub expires_on: Option<Date>,
    /// Per-account note appended to the delivery message
    pub delivery_instructions: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
    /// Orders whose delivered credential is this account
    #[sea_orm(has_many = "super::order::Entity")]
    Orders,
    /// Tickets filed against this account
    #[sea_orm(has_many = "super::ticket::Entity")]
    Tickets,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Orders.def()
    }
}

impl Related<super::ticket::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tickets.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
