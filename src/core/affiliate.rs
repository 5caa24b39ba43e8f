//! Affiliate trigger evaluation.
//!
//! Called when a referred user completes a qualifying event (first confirmed
//! top-up or first purchase). The configuration is an injected snapshot, not
//! ambient state. First occurrence is decided by counting prior successful
//! events, never by a boolean flag, so a re-entrant evaluation of the same
//! event cannot double-grant.

use rand::Rng;
use rust_decimal::{Decimal, prelude::ToPrimitive};
use sea_orm::{PaginatorTrait, Set, prelude::*};
use tracing::{debug, info, warn};

use crate::{
    core::{ledger, product},
    entities::{
        Order, TopUp, configuration,
        enums::{AffiliateRewardKind, AffiliateTrigger, PaymentStatus},
        gift_card, order, top_up, user,
    },
    errors::Result,
    notify::Notification,
};

/// A reward granted to a referrer, with the notification to dispatch after
/// the surrounding transaction commits.
#[derive(Debug, Clone)]
pub struct AffiliateGrant {
    pub reward: AffiliateRewardKind,
    pub value: Decimal,
    /// Redemption code, for instant gift-card rewards
    pub gift_card_code: Option<String>,
    pub notification: Notification,
}

/// Evaluates one qualifying event for a referred user and grants the
/// configured reward to their referrer when every gate passes.
///
/// Gates, in order: program active, trigger matches the configured one,
/// referrer present, first occurrence of this event kind for the user
/// (count of prior successes must be at most one, including the event being
/// processed), and the event amount at least the cheapest active product
/// price (the anti-farming floor).
///
/// # Errors
/// Returns a database error when a query fails. A disqualified event is
/// `Ok(None)`, not an error.
pub async fn evaluate<C>(
    conn: &C,
    config: &configuration::Model,
    referred: &user::Model,
    event_amount: Decimal,
    trigger: AffiliateTrigger,
) -> Result<Option<AffiliateGrant>>
where
    C: ConnectionTrait,
{
    if !config.affiliate_enabled {
        return Ok(None);
    }
    if config.affiliate_trigger != trigger {
        debug!(
            telegram_id = referred.telegram_id,
            "event trigger does not match configured trigger"
        );
        return Ok(None);
    }
    let Some(referrer_id) = referred.referrer_id else {
        return Ok(None);
    };

    let occurrences = match trigger {
        AffiliateTrigger::FirstTopUp => {
            TopUp::find()
                .filter(top_up::Column::UserId.eq(referred.id))
                .filter(top_up::Column::PaymentStatus.eq(PaymentStatus::Paid))
                .count(conn)
                .await?
        }
        AffiliateTrigger::FirstPurchase => {
            Order::find()
                .filter(order::Column::UserId.eq(referred.id))
                .count(conn)
                .await?
        }
    };
    // The event being processed is already recorded, so "first" means a
    // count of at most one.
    if occurrences > 1 {
        debug!(
            telegram_id = referred.telegram_id,
            occurrences, "not the first occurrence"
        );
        return Ok(None);
    }

    let floor = product::cheapest_active_price(conn)
        .await?
        .unwrap_or(Decimal::ZERO);
    if event_amount < floor {
        debug!(
            %event_amount,
            %floor,
            "event amount below the cheapest active product"
        );
        return Ok(None);
    }

    let Some(referrer) = crate::entities::User::find_by_id(referrer_id).one(conn).await? else {
        warn!(referrer_id, "referrer row missing, skipping reward");
        return Ok(None);
    };

    let value = config.affiliate_reward_value;
    let grant = match config.affiliate_reward {
        AffiliateRewardKind::PendingCashback => {
            // At most one pending reward at a time: a fresh grant replaces
            // any unconsumed one.
            let percent = value.trunc().to_i32().unwrap_or(0);
            let mut active: user::ActiveModel = referrer.clone().into();
            active.pending_cashback_percent = Set(Some(percent));
            active.updated_at = Set(chrono::Utc::now());
            active.update(conn).await?;

            info!(
                referrer_telegram_id = referrer.telegram_id,
                percent, "pending cashback granted"
            );
            AffiliateGrant {
                reward: AffiliateRewardKind::PendingCashback,
                value,
                gift_card_code: None,
                notification: Notification {
                    telegram_id: referrer.telegram_id,
                    body: format!(
                        "You earned a referral reward! A friend you invited completed \
                         their first {}. You get {percent}% cashback on your next top-up.",
                        trigger_label(trigger)
                    ),
                },
            }
        }
        AffiliateRewardKind::InstantGiftCard => {
            let code = generate_reward_code();
            gift_card::ActiveModel {
                code: Set(code.clone()),
                value: Set(ledger::round_money(value)),
                is_used: Set(false),
                created_by_id: Set(referrer.id),
                used_by_id: Set(None),
                created_at: Set(chrono::Utc::now()),
                used_at: Set(None),
                ..Default::default()
            }
            .insert(conn)
            .await?;

            info!(
                referrer_telegram_id = referrer.telegram_id,
                %value,
                "gift-card reward issued"
            );
            AffiliateGrant {
                reward: AffiliateRewardKind::InstantGiftCard,
                value,
                gift_card_code: Some(code.clone()),
                notification: Notification {
                    telegram_id: referrer.telegram_id,
                    body: format!(
                        "You earned a referral reward! A friend you invited completed \
                         their first {}. You get a gift card worth {value:.2}. \
                         Redeem it with the code: {code}",
                        trigger_label(trigger)
                    ),
                },
            }
        }
    };

    Ok(Some(grant))
}

const fn trigger_label(trigger: AffiliateTrigger) -> &'static str {
    match trigger {
        AffiliateTrigger::FirstTopUp => "top-up",
        AffiliateTrigger::FirstPurchase => "purchase",
    }
}

/// Generates a redemption code of the form `REF-1A2B3C-4D5E6F`.
fn generate_reward_code() -> String {
    fn hex6(rng: &mut impl Rng) -> String {
        (0..3).map(|_| format!("{:02X}", rng.r#gen::<u8>())).collect()
    }

    let mut rng = rand::thread_rng();
    format!("REF-{}-{}", hex6(&mut rng), hex6(&mut rng))
}
