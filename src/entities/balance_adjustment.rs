//! Balance adjustment entity - append-only audit log of manual wallet changes.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::enums::AdjustOperation;

/// Balance adjustment database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "balance_adjustments")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Wallet that was adjusted
    #[sea_orm(indexed)]
    pub user_id: i64,
    /// Administrator who performed the adjustment
    pub admin_id: i64,
    /// ADD, REMOVE or SET
    pub operation: AdjustOperation,
    /// Operand of the operation, rounded to two decimals
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub amount: Decimal,
    /// Balance snapshot before the adjustment
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub balance_before: Decimal,
    /// Balance snapshot after the adjustment
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub balance_after: Decimal,
    /// Optional operator note
    pub reason: Option<String>,
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
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
