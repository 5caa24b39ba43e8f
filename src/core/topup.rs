//! Wallet top-ups and the gateway settlement webhook.
//!
//! A top-up is persisted PENDING with the gateway's payment reference when
//! the payment intent is created; the settlement callback later credits the
//! wallet exactly once, keyed on the top-up's own status. Notifications are
//! dispatched only after the financial transaction has committed.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{Set, TransactionTrait, prelude::*};
use tracing::info;

use crate::{
    core::{affiliate, ledger, settings, users},
    entities::{
        TopUp,
        enums::{AffiliateTrigger, PaymentStatus},
        top_up,
    },
    errors::{Error, Result},
    models::CreditOutcome,
    notify::{Notification, Notifier},
};

/// Records a PENDING top-up after the gateway accepted the payment intent.
///
/// Finds or creates the user first, so `/start`-less buyers can still top
/// up. `gateway_ref` is the reference the settlement webhook will present.
///
/// # Errors
/// `BadRequest` for a non-positive amount.
pub async fn register_pending<C>(
    conn: &C,
    telegram_id: i64,
    full_name: &str,
    amount: Decimal,
    gateway: &str,
    gateway_ref: &str,
    payment_code: Option<String>,
) -> Result<top_up::Model>
where
    C: ConnectionTrait,
{
    if amount <= Decimal::ZERO {
        return Err(Error::BadRequest(
            "top-up amount must be positive".to_string(),
        ));
    }

    let user = users::get_or_create(conn, telegram_id, full_name, None).await?;

    top_up::ActiveModel {
        user_id: Set(user.id),
        amount: Set(ledger::round_money(amount)),
        payment_status: Set(PaymentStatus::Pending),
        gateway: Set(gateway.to_string()),
        gateway_ref: Set(Some(gateway_ref.to_string())),
        payment_code: Set(payment_code),
        created_at: Set(Utc::now()),
        paid_at: Set(None),
        ..Default::default()
    }
    .insert(conn)
    .await
    .map_err(Into::into)
}

/// Processes a confirmed-settlement callback from the payment gateway.
///
/// Idempotent: the top-up's own status decides whether anything happens, so
/// a replayed callback returns `AlreadyProcessed` with the balance
/// untouched. On first confirmation, in one transaction: the top-up flips
/// to PAID, the wallet is credited, any pending cashback the payer had
/// earned as a referrer is applied and cleared, and the affiliate evaluator
/// runs for the payer's own referrer. Notifications go out after commit.
///
/// # Errors
/// `NotFound` when no top-up carries the reference.
pub async fn confirm_payment<N>(
    db: &DatabaseConnection,
    notifier: &N,
    gateway_ref: &str,
) -> Result<CreditOutcome>
where
    N: Notifier,
{
    let txn = db.begin().await?;

    let top_up = TopUp::find()
        .filter(top_up::Column::GatewayRef.eq(gateway_ref))
        .one(&txn)
        .await?
        .ok_or(Error::NotFound { entity: "top-up" })?;

    if top_up.payment_status == PaymentStatus::Paid {
        info!(top_up_id = top_up.id, "settlement already processed");
        return Ok(CreditOutcome::AlreadyProcessed {
            top_up_id: top_up.id,
        });
    }

    let top_up_id = top_up.id;
    let user_id = top_up.user_id;
    let amount = top_up.amount;

    let mut active: top_up::ActiveModel = top_up.into();
    active.payment_status = Set(PaymentStatus::Paid);
    active.paid_at = Set(Some(Utc::now()));
    active.update(&txn).await?;

    let user = ledger::credit(&txn, user_id, amount).await?;

    // Consume the payer's own pending cashback, exactly once.
    let cashback = match user.pending_cashback_percent {
        Some(percent) if percent > 0 => {
            let bonus = ledger::round_money(amount * Decimal::from(percent) / Decimal::from(100));
            let credited = if bonus > Decimal::ZERO {
                ledger::credit(&txn, user_id, bonus).await?;
                Some(bonus)
            } else {
                None
            };
            let mut active: crate::entities::user::ActiveModel =
                users::require_by_telegram_id(&txn, user.telegram_id).await?.into();
            active.pending_cashback_percent = Set(None);
            active.updated_at = Set(Utc::now());
            active.update(&txn).await?;
            credited
        }
        _ => None,
    };

    let user = users::require_by_telegram_id(&txn, user.telegram_id).await?;

    let config = settings::get_or_create(&txn).await?;
    let grant = affiliate::evaluate(&txn, &config, &user, amount, AffiliateTrigger::FirstTopUp)
        .await?;

    txn.commit().await?;
    info!(top_up_id, user_id, %amount, "wallet credited");

    // Post-commit, guarded: a failed notification never affects the credit.
    let mut body = format!(
        "Payment approved! Your top-up of {amount:.2} was confirmed.\n\
         Your new balance is: {:.2}",
        user.wallet_balance
    );
    if let Some(bonus) = cashback {
        body.push_str(&format!("\nReferral cashback applied: +{bonus:.2}"));
    }
    crate::notify::dispatch(
        notifier,
        &Notification {
            telegram_id: user.telegram_id,
            body,
        },
    )
    .await;
    if let Some(grant) = &grant {
        crate::notify::dispatch(notifier, &grant.notification).await;
    }

    Ok(CreditOutcome::Credited {
        top_up_id,
        amount,
        cashback,
        new_balance: user.wallet_balance,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::settings;
    use crate::entities::User;
    use crate::entities::enums::{AffiliateRewardKind, DeliveryKind};
    use crate::notify::TracingNotifier;
    use crate::test_utils::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_register_pending_creates_user_and_row() -> Result<()> {
        let db = setup_test_db().await?;

        let top_up = register_pending(
            &db,
            42,
            "Alice",
            dec!(30.00),
            "MERCADOPAGO",
            "pay-123",
            Some("pix-code".to_string()),
        )
        .await?;

        assert_eq!(top_up.payment_status, PaymentStatus::Pending);
        assert_eq!(top_up.gateway_ref.as_deref(), Some("pay-123"));

        let user = crate::core::users::require_by_telegram_id(&db, 42).await?;
        assert_eq!(user.wallet_balance, Decimal::ZERO);

        Ok(())
    }

    #[tokio::test]
    async fn test_register_pending_rejects_non_positive_amount() -> Result<()> {
        let db = setup_test_db().await?;

        let result =
            register_pending(&db, 42, "Alice", Decimal::ZERO, "MERCADOPAGO", "x", None).await;
        assert!(matches!(result.unwrap_err(), Error::BadRequest(_)));

        Ok(())
    }

    #[tokio::test]
    async fn test_confirm_credits_wallet_once() -> Result<()> {
        let db = setup_test_db().await?;
        register_pending(&db, 42, "Alice", dec!(30.00), "MERCADOPAGO", "pay-123", None).await?;

        let outcome = confirm_payment(&db, &TracingNotifier, "pay-123").await?;
        let CreditOutcome::Credited {
            amount, new_balance, ..
        } = outcome
        else {
            panic!("expected a credit");
        };
        assert_eq!(amount, dec!(30.00));
        assert_eq!(new_balance, dec!(30.00));

        // Replayed callback: no further credit
        let replay = confirm_payment(&db, &TracingNotifier, "pay-123").await?;
        assert!(matches!(replay, CreditOutcome::AlreadyProcessed { .. }));

        let user = crate::core::users::require_by_telegram_id(&db, 42).await?;
        assert_eq!(user.wallet_balance, dec!(30.00));

        Ok(())
    }

    #[tokio::test]
    async fn test_confirm_unknown_reference() -> Result<()> {
        let db = setup_test_db().await?;

        let result = confirm_payment(&db, &TracingNotifier, "missing").await;
        assert!(matches!(result.unwrap_err(), Error::NotFound { .. }));

        Ok(())
    }

    #[tokio::test]
    async fn test_pending_cashback_consumed_exactly_once() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_test_user(&db, 42).await?;

        let mut active: crate::entities::user::ActiveModel = user.into();
        active.pending_cashback_percent = Set(Some(50));
        active.update(&db).await?;

        register_pending(&db, 42, "Test User", dec!(20.00), "MERCADOPAGO", "p1", None).await?;
        let outcome = confirm_payment(&db, &TracingNotifier, "p1").await?;
        let CreditOutcome::Credited {
            cashback,
            new_balance,
            ..
        } = outcome
        else {
            panic!("expected a credit");
        };
        assert_eq!(cashback, Some(dec!(10.00)));
        assert_eq!(new_balance, dec!(30.00));

        // The percentage is cleared; the next top-up is plain
        let reloaded = crate::core::users::require_by_telegram_id(&db, 42).await?;
        assert!(reloaded.pending_cashback_percent.is_none());

        register_pending(&db, 42, "Test User", dec!(20.00), "MERCADOPAGO", "p2", None).await?;
        let outcome = confirm_payment(&db, &TracingNotifier, "p2").await?;
        let CreditOutcome::Credited { cashback, .. } = outcome else {
            panic!("expected a credit");
        };
        assert!(cashback.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn test_first_top_up_rewards_referrer() -> Result<()> {
        let db = setup_test_db().await?;
        settings::update_affiliate(
            &db,
            true,
            AffiliateTrigger::FirstTopUp,
            AffiliateRewardKind::PendingCashback,
            dec!(50.00),
        )
        .await?;
        create_test_product(&db, "Floor", dec!(10.00), DeliveryKind::Automatic).await?;

        let referrer = create_test_user(&db, 1).await?;
        create_referred_user(&db, 2, referrer.telegram_id).await?;

        register_pending(&db, 2, "Referred", dec!(10.00), "MERCADOPAGO", "p1", None).await?;
        confirm_payment(&db, &TracingNotifier, "p1").await?;

        let rewarded = User::find_by_id(referrer.id).one(&db).await?.unwrap();
        assert_eq!(rewarded.pending_cashback_percent, Some(50));

        Ok(())
    }

    #[tokio::test]
    async fn test_second_top_up_grants_nothing() -> Result<()> {
        let db = setup_test_db().await?;
        settings::update_affiliate(
            &db,
            true,
            AffiliateTrigger::FirstTopUp,
            AffiliateRewardKind::PendingCashback,
            dec!(50.00),
        )
        .await?;
        create_test_product(&db, "Floor", dec!(10.00), DeliveryKind::Automatic).await?;

        let referrer = create_test_user(&db, 1).await?;
        create_referred_user(&db, 2, referrer.telegram_id).await?;

        for gateway_ref in ["p1", "p2"] {
            register_pending(&db, 2, "Referred", dec!(10.00), "MERCADOPAGO", gateway_ref, None)
                .await?;
            confirm_payment(&db, &TracingNotifier, gateway_ref).await?;
        }

        // Referrer consumed nothing; the first grant stands, un-doubled
        let rewarded = User::find_by_id(referrer.id).one(&db).await?.unwrap();
        assert_eq!(rewarded.pending_cashback_percent, Some(50));

        Ok(())
    }

    #[tokio::test]
    async fn test_below_floor_top_up_grants_nothing() -> Result<()> {
        let db = setup_test_db().await?;
        settings::update_affiliate(
            &db,
            true,
            AffiliateTrigger::FirstTopUp,
            AffiliateRewardKind::PendingCashback,
            dec!(50.00),
        )
        .await?;
        create_test_product(&db, "Floor", dec!(10.00), DeliveryKind::Automatic).await?;

        let referrer = create_test_user(&db, 1).await?;
        create_referred_user(&db, 2, referrer.telegram_id).await?;

        register_pending(&db, 2, "Referred", dec!(5.00), "MERCADOPAGO", "p1", None).await?;
        confirm_payment(&db, &TracingNotifier, "p1").await?;

        let referrer = User::find_by_id(referrer.id).one(&db).await?.unwrap();
        assert!(referrer.pending_cashback_percent.is_none());

        Ok(())
    }
}
