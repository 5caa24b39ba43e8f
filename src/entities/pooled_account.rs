//! Pooled account entity - a "mother account" addressed by invited email.
//!
//! Same slot-capacity shape as a stock account, but slots are granted to
//! customer emails through invite records instead of per-order assignment.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Pooled account database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "pooled_accounts")]
pub struct Model {
    /// Unique identifier for the pooled account
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Product this account serves
    #[sea_orm(indexed)]
    pub product_id: i64,
    /// Login half of the credential pair
    pub login: String,
    /// Secret half, encrypted at rest
    pub secret_enc: String,
    /// Invite capacity
    pub max_slots: i32,
    /// Invites already granted; invariant 0 <= occupied_slots <= max_slots
    pub occupied_slots: i32,
    /// Inactive accounts accept no further invites
    pub is_active: bool,
    /// Subscription end date, if known
    pub expires_on: Option<Date>,
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
    /// Invites granted on this account
    #[sea_orm(has_many = "super::pooled_invite::Entity")]
    Invites,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl Related<super::pooled_invite::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Invites.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
