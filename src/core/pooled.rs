//! Pooled-account allocator - "mother account" slots granted to emails.
//!
//! Unlike stock allocation, the allocation key here is the invited customer
//! email: one invite per email per account, bounded by the account's slot
//! capacity. Also resolves the effective access-expiration of an order,
//! which can change over the order's lifetime (hot-swap, re-invite).

use chrono::Utc;
use sea_orm::{QueryOrder, QuerySelect, Set, prelude::*, sea_query::Expr};
use tracing::info;

use crate::{
    entities::{
        PooledAccount, PooledInvite, StockAccount, order, pooled_account, pooled_invite,
        stock_account,
    },
    errors::{Error, Result},
    models::{ExpirationInfo, ExpirationSource},
};

/// Grants a slot on a pooled account to a customer email.
///
/// Pass the order id when the invite is created in a purchase context so the
/// invite stays linked to its receipt.
///
/// # Errors
/// `NotFound` for an unknown account, `BadRequest` for an empty email,
/// `Conflict` when the email already holds an invite on the account,
/// `OutOfStock` when every slot is taken.
pub async fn add_invite<C>(
    conn: &C,
    pooled_account_id: i64,
    customer_email: &str,
    order_id: Option<i64>,
) -> Result<pooled_invite::Model>
where
    C: ConnectionTrait,
{
    let account = require_account(conn, pooled_account_id).await?;

    let customer_email = customer_email.trim();
    if customer_email.is_empty() {
        return Err(Error::BadRequest(
            "customer email is required".to_string(),
        ));
    }

    let existing = PooledInvite::find()
        .filter(pooled_invite::Column::PooledAccountId.eq(pooled_account_id))
        .filter(pooled_invite::Column::CustomerEmail.eq(customer_email))
        .one(conn)
        .await?;
    if existing.is_some() {
        return Err(Error::Conflict(
            "email already holds an invite on this account".to_string(),
        ));
    }

    if account.occupied_slots >= account.max_slots {
        return Err(Error::OutOfStock);
    }

    // Guarded increment: the capacity check is repeated in the WHERE clause
    // so a concurrent invite cannot push the account past its limit.
    let claimed = PooledAccount::update_many()
        .col_expr(
            pooled_account::Column::OccupiedSlots,
            Expr::col(pooled_account::Column::OccupiedSlots).add(1),
        )
        .col_expr(pooled_account::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(pooled_account::Column::Id.eq(pooled_account_id))
        .filter(
            Expr::col(pooled_account::Column::OccupiedSlots)
                .lt(Expr::col(pooled_account::Column::MaxSlots)),
        )
        .exec(conn)
        .await?;
    if claimed.rows_affected == 0 {
        return Err(Error::OutOfStock);
    }

    let invite = pooled_invite::ActiveModel {
        pooled_account_id: Set(pooled_account_id),
        customer_email: Set(customer_email.to_string()),
        order_id: Set(order_id),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(conn)
    .await?;

    deactivate_if_full(conn, pooled_account_id).await?;

    Ok(invite)
}

/// Lists an account's invites, newest first.
///
/// # Errors
/// Returns a database error when the query fails.
pub async fn list_invites<C>(conn: &C, pooled_account_id: i64) -> Result<Vec<pooled_invite::Model>>
where
    C: ConnectionTrait,
{
    PooledInvite::find()
        .filter(pooled_invite::Column::PooledAccountId.eq(pooled_account_id))
        .order_by_desc(pooled_invite::Column::CreatedAt)
        .all(conn)
        .await
        .map_err(Into::into)
}

/// Whether the product still has a pooled account accepting invites.
/// Expired accounts do not count.
///
/// # Errors
/// Returns a database error when the query fails.
pub async fn has_capacity<C>(conn: &C, product_id: i64) -> Result<bool>
where
    C: ConnectionTrait,
{
    let today = Utc::now().date_naive();
    Ok(PooledAccount::find()
        .filter(pooled_account::Column::ProductId.eq(product_id))
        .filter(pooled_account::Column::IsActive.eq(true))
        .filter(
            Expr::col(pooled_account::Column::OccupiedSlots)
                .lt(Expr::col(pooled_account::Column::MaxSlots)),
        )
        .filter(
            pooled_account::Column::ExpiresOn
                .is_null()
                .or(pooled_account::Column::ExpiresOn.gte(today)),
        )
        .limit(1)
        .one(conn)
        .await?
        .is_some())
}

/// Resolves the effective expiration date of an order's access, if any.
///
/// Priority: the pooled account behind the order's invite, then the order's
/// direct pooled-account link, then the order's stock account. The first
/// non-null date wins, reported together with its source.
///
/// # Errors
/// Returns a database error when a query fails.
pub async fn effective_expiration<C>(
    conn: &C,
    order: &order::Model,
) -> Result<Option<ExpirationInfo>>
where
    C: ConnectionTrait,
{
    let mut invite_query =
        PooledInvite::find().filter(pooled_invite::Column::OrderId.eq(order.id));
    if let Some(email) = &order.customer_email {
        invite_query = invite_query.filter(pooled_invite::Column::CustomerEmail.eq(email.clone()));
    }
    if let Some(invite) = invite_query.limit(1).one(conn).await? {
        let account = PooledAccount::find_by_id(invite.pooled_account_id)
            .one(conn)
            .await?;
        if let Some(expires_on) = account.and_then(|a| a.expires_on) {
            return Ok(Some(ExpirationInfo {
                expires_on,
                source: ExpirationSource::PooledAccount,
            }));
        }
    }

    if let Some(pooled_account_id) = order.pooled_account_id {
        let account = PooledAccount::find_by_id(pooled_account_id).one(conn).await?;
        if let Some(expires_on) = account.and_then(|a| a.expires_on) {
            return Ok(Some(ExpirationInfo {
                expires_on,
                source: ExpirationSource::PooledAccount,
            }));
        }
    }

    if let Some(stock_account_id) = order.stock_account_id {
        let account = StockAccount::find_by_id(stock_account_id).one(conn).await?;
        if let Some(expires_on) = account.and_then(|a| a.expires_on) {
            return Ok(Some(ExpirationInfo {
                expires_on,
                source: ExpirationSource::StockAccount,
            }));
        }
    }

    Ok(None)
}

/// Resizes a pooled account's invite capacity. The capacity may not drop
/// below the invites already granted.
///
/// # Errors
/// `NotFound` for an unknown account, `BadRequest` for an invalid capacity.
pub async fn update_capacity<C>(
    conn: &C,
    pooled_account_id: i64,
    max_slots: i32,
) -> Result<pooled_account::Model>
where
    C: ConnectionTrait,
{
    let account = require_account(conn, pooled_account_id).await?;
    if max_slots < 1 {
        return Err(Error::BadRequest(
            "max slots must be at least one".to_string(),
        ));
    }
    if max_slots < account.occupied_slots {
        return Err(Error::BadRequest(
            "max slots cannot be lower than the occupied count".to_string(),
        ));
    }

    let mut active: pooled_account::ActiveModel = account.into();
    active.max_slots = Set(max_slots);
    active.updated_at = Set(Utc::now());
    active.update(conn).await.map_err(Into::into)
}

/// Days until an account expires, negative once past. For admin views.
#[must_use]
pub fn days_remaining(expires_on: Date, today: Date) -> i64 {
    (expires_on - today).num_days()
}

/// Creates a pooled account for a product.
///
/// # Errors
/// `NotFound` for an unknown product, `BadRequest` for a capacity below one.
pub async fn add_account<C>(
    conn: &C,
    cipher: &crate::crypto::CredentialCipher,
    product_id: i64,
    login: &str,
    secret: &str,
    max_slots: i32,
    expires_on: Option<Date>,
) -> Result<pooled_account::Model>
where
    C: ConnectionTrait,
{
    crate::core::product::require_product(conn, product_id).await?;
    if max_slots < 1 {
        return Err(Error::BadRequest(
            "max slots must be at least one".to_string(),
        ));
    }

    let now = Utc::now();
    pooled_account::ActiveModel {
        product_id: Set(product_id),
        login: Set(login.to_string()),
        secret_enc: Set(cipher.encrypt(secret)?),
        max_slots: Set(max_slots),
        occupied_slots: Set(0),
        is_active: Set(true),
        expires_on: Set(expires_on),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(conn)
    .await
    .map_err(Into::into)
}

async fn require_account<C>(conn: &C, pooled_account_id: i64) -> Result<pooled_account::Model>
where
    C: ConnectionTrait,
{
    PooledAccount::find_by_id(pooled_account_id)
        .one(conn)
        .await?
        .ok_or(Error::NotFound {
            entity: "pooled account",
        })
}

async fn deactivate_if_full<C>(conn: &C, pooled_account_id: i64) -> Result<()>
where
    C: ConnectionTrait,
{
    let account = require_account(conn, pooled_account_id).await?;
    if account.occupied_slots >= account.max_slots && account.is_active {
        info!(
            account_id = account.id,
            "pooled account fully consumed"
        );
        let mut active: pooled_account::ActiveModel = account.into();
        active.is_active = Set(false);
        active.updated_at = Set(Utc::now());
        active.update(conn).await?;
    }
    Ok(())
}
