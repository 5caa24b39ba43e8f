//! User lookup and first-contact registration.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{Set, prelude::*};
use tracing::info;

use crate::{
    entities::{User, user},
    errors::{Error, Result},
};

/// Finds a user by their Telegram id.
///
/// # Errors
/// Returns a database error when the query fails.
pub async fn find_by_telegram_id<C>(conn: &C, telegram_id: i64) -> Result<Option<user::Model>>
where
    C: ConnectionTrait,
{
    User::find()
        .filter(user::Column::TelegramId.eq(telegram_id))
        .one(conn)
        .await
        .map_err(Into::into)
}

/// Finds a user by Telegram id or creates one on first contact.
///
/// The referrer link is captured only at creation and only one level deep;
/// re-contacting with a referral parameter never rewires an existing user.
/// The display name is refreshed when it changed on Telegram.
///
/// # Errors
/// Returns a database error when a query fails.
pub async fn get_or_create<C>(
    conn: &C,
    telegram_id: i64,
    full_name: &str,
    referrer_telegram_id: Option<i64>,
) -> Result<user::Model>
where
    C: ConnectionTrait,
{
    if let Some(existing) = find_by_telegram_id(conn, telegram_id).await? {
        if existing.full_name != full_name {
            let mut active: user::ActiveModel = existing.into();
            active.full_name = Set(full_name.to_string());
            active.updated_at = Set(Utc::now());
            return active.update(conn).await.map_err(Into::into);
        }
        return Ok(existing);
    }

    // Resolve the referrer before inserting; a dangling or self referral is
    // dropped silently rather than failing registration.
    let referrer_id = match referrer_telegram_id {
        Some(ref_tid) if ref_tid != telegram_id => find_by_telegram_id(conn, ref_tid)
            .await?
            .map(|referrer| referrer.id),
        _ => None,
    };

    info!(telegram_id, "registering new user");
    let now = Utc::now();
    user::ActiveModel {
        telegram_id: Set(telegram_id),
        full_name: Set(full_name.to_string()),
        wallet_balance: Set(Decimal::ZERO),
        is_admin: Set(false),
        referrer_id: Set(referrer_id),
        pending_cashback_percent: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(conn)
    .await
    .map_err(Into::into)
}

/// Finds a user by Telegram id, failing when absent.
///
/// # Errors
/// `NotFound` when no such user exists.
pub async fn require_by_telegram_id<C>(conn: &C, telegram_id: i64) -> Result<user::Model>
where
    C: ConnectionTrait,
{
    find_by_telegram_id(conn, telegram_id)
        .await?
        .ok_or(Error::NotFound { entity: "user" })
}
