//! Top-up entity - a wallet credit requested through the payment gateway.
//!
//! Created PENDING with the gateway's reference; the settlement webhook
//! flips it to PAID exactly once. Idempotency of the credit is carried by
//! this row's own status, not by external deduplication.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::enums::PaymentStatus;

/// Top-up database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "top_ups")]
pub struct Model {
    /// Unique identifier for the top-up
    #[sea_orm(primary_key)]
    pub id: i64,
    /// User whose wallet is credited on settlement
    #[sea_orm(indexed)]
    pub user_id: i64,
    /// Requested amount
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub amount: Decimal,
    pub payment_status: PaymentStatus,
    /// Gateway name (e.g. "MERCADOPAGO")
    pub gateway: String,
    /// Gateway's payment reference; the webhook looks the top-up up by this
    #[sea_orm(indexed)]
    pub gateway_ref: Option<String>,
    /// Payer-facing payment code (copy-and-paste PIX string)
    pub payment_code: Option<String>,
    pub created_at: DateTimeUtc,
    /// Settlement timestamp, once confirmed
    pub paid_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
