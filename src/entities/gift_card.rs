//! Gift card entity - a single-use redemption code worth a fixed amount.
//!
//! Issued by admins, or generated as the immediate affiliate reward (in which
//! case `created_by_id` points at the referrer who earned it).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Gift card database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "gift_cards")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Redemption code, e.g. "REF-1A2B3C-4D5E6F"
    #[sea_orm(unique)]
    pub code: String,
    /// Wallet value credited on redemption
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub value: Decimal,
    pub is_used: bool,
    /// Issuer (an admin, or the referrer for affiliate rewards)
    pub created_by_id: i64,
    /// Redeemer, once used
    pub used_by_id: Option<i64>,
    pub created_at: DateTimeUtc,
    pub used_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::CreatedById",
        to = "super::user::Column::Id"
    )]
    Creator,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UsedById",
        to = "super::user::Column::Id"
    )]
    Redeemer,
}

impl ActiveModelBehavior for ActiveModel {}
