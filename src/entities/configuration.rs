//! Configuration entity - the singleton row of global settings.
//!
//! Lazily created with defaults on first read. The affiliate evaluator never
//! reads this table itself; callers fetch a snapshot and inject it.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::enums::{AffiliateRewardKind, AffiliateTrigger};

/// Configuration database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "configuration")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Master switch for the affiliate program
    pub affiliate_enabled: bool,
    /// Which referred-user event grants a reward
    pub affiliate_trigger: AffiliateTrigger,
    /// What the referrer receives
    pub affiliate_reward: AffiliateRewardKind,
    /// Percentage for cashback rewards, wallet value for gift cards
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub affiliate_reward_value: Decimal,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
