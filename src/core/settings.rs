//! Global configuration singleton.
//!
//! A single row holds the affiliate-program settings. It is created lazily
//! with defaults on first read; core components never read it themselves but
//! receive a snapshot from their caller.

use rust_decimal::Decimal;
use sea_orm::{Set, prelude::*};
use tracing::info;

use crate::{
    entities::{
        Configuration, configuration,
        enums::{AffiliateRewardKind, AffiliateTrigger},
    },
    errors::{Error, Result},
};

/// Fetches the configuration row, creating it with defaults when absent.
///
/// # Errors
/// Returns a database error when a query fails.
pub async fn get_or_create<C>(conn: &C) -> Result<configuration::Model>
where
    C: ConnectionTrait,
{
    if let Some(config) = Configuration::find().one(conn).await? {
        return Ok(config);
    }

    info!("no configuration row found, creating defaults");
    configuration::ActiveModel {
        affiliate_enabled: Set(false),
        affiliate_trigger: Set(AffiliateTrigger::FirstTopUp),
        affiliate_reward: Set(AffiliateRewardKind::PendingCashback),
        affiliate_reward_value: Set(Decimal::ZERO),
        ..Default::default()
    }
    .insert(conn)
    .await
    .map_err(Into::into)
}

/// Replaces the affiliate settings.
///
/// # Errors
/// `BadRequest` for a negative reward value.
pub async fn update_affiliate<C>(
    conn: &C,
    enabled: bool,
    trigger: AffiliateTrigger,
    reward: AffiliateRewardKind,
    reward_value: Decimal,
) -> Result<configuration::Model>
where
    C: ConnectionTrait,
{
    if reward_value < Decimal::ZERO {
        return Err(Error::BadRequest(
            "reward value cannot be negative".to_string(),
        ));
    }

    let config = get_or_create(conn).await?;
    let mut active: configuration::ActiveModel = config.into();
    active.affiliate_enabled = Set(enabled);
    active.affiliate_trigger = Set(trigger);
    active.affiliate_reward = Set(reward);
    active.affiliate_reward_value = Set(crate::core::ledger::round_money(reward_value));
    active.update(conn).await.map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_lazily_created_with_defaults() -> Result<()> {
        let db = setup_test_db().await?;

        let config = get_or_create(&db).await?;
        assert!(!config.affiliate_enabled);
        assert_eq!(config.affiliate_trigger, AffiliateTrigger::FirstTopUp);
        assert_eq!(config.affiliate_reward_value, Decimal::ZERO);

        // A second read returns the same row, not another default
        let again = get_or_create(&db).await?;
        assert_eq!(config.id, again.id);

        Ok(())
    }

    #[tokio::test]
    async fn test_update_affiliate() -> Result<()> {
        let db = setup_test_db().await?;

        let config = update_affiliate(
            &db,
            true,
            AffiliateTrigger::FirstPurchase,
            AffiliateRewardKind::InstantGiftCard,
            dec!(5.00),
        )
        .await?;
        assert!(config.affiliate_enabled);
        assert_eq!(config.affiliate_trigger, AffiliateTrigger::FirstPurchase);
        assert_eq!(config.affiliate_reward, AffiliateRewardKind::InstantGiftCard);
        assert_eq!(config.affiliate_reward_value, dec!(5.00));

        let result = update_affiliate(
            &db,
            true,
            AffiliateTrigger::FirstTopUp,
            AffiliateRewardKind::PendingCashback,
            dec!(-1.00),
        )
        .await;
        assert!(matches!(result.unwrap_err(), Error::BadRequest(_)));

        Ok(())
    }
}
