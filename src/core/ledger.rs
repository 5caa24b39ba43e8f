//! Ledger - atomic wallet debit/credit and manual admin adjustments.
//!
//! Every balance mutation in the system flows through this module so the
//! non-negativity invariant is enforced in exactly one place. Debits and
//! credits are single guarded UPDATE statements, not read-modify-write, so
//! two concurrent spenders cannot both pass a balance check and overdraw.
//! All amounts are fixed-point decimals rounded to two places, half-up.

use chrono::Utc;
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::{QueryOrder, Set, prelude::*, sea_query::Expr};

use crate::{
    entities::{BalanceAdjustment, User, balance_adjustment, enums::AdjustOperation, user},
    errors::{Error, Result},
};

/// Rounds a monetary amount to two decimal places, half-up.
#[must_use]
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Atomically decreases a user's balance.
///
/// The balance check and the decrement are one guarded UPDATE: the statement
/// only matches while `wallet_balance >= amount`, so a concurrent debit that
/// got there first simply makes this one fail with `InsufficientFunds`.
///
/// # Errors
/// `BadRequest` for a non-positive amount, `NotFound` for an unknown user,
/// `InsufficientFunds` when the balance does not cover the amount.
pub async fn debit<C>(conn: &C, user_id: i64, amount: Decimal) -> Result<user::Model>
where
    C: ConnectionTrait,
{
    let amount = round_money(amount);
    if amount <= Decimal::ZERO {
        return Err(Error::BadRequest(
            "debit amount must be positive".to_string(),
        ));
    }

    let result = User::update_many()
        .col_expr(
            user::Column::WalletBalance,
            Expr::col(user::Column::WalletBalance).sub(amount),
        )
        .col_expr(user::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(user::Column::Id.eq(user_id))
        .filter(user::Column::WalletBalance.gte(amount))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        let user = find_user(conn, user_id).await?;
        return Err(Error::InsufficientFunds {
            current: user.wallet_balance,
            required: amount,
        });
    }

    find_user(conn, user_id).await
}

/// Atomically increases a user's balance.
///
/// # Errors
/// `BadRequest` for a non-positive amount, `NotFound` for an unknown user.
pub async fn credit<C>(conn: &C, user_id: i64, amount: Decimal) -> Result<user::Model>
where
    C: ConnectionTrait,
{
    let amount = round_money(amount);
    if amount <= Decimal::ZERO {
        return Err(Error::BadRequest(
            "credit amount must be positive".to_string(),
        ));
    }

    let result = User::update_many()
        .col_expr(
            user::Column::WalletBalance,
            Expr::col(user::Column::WalletBalance).add(amount),
        )
        .col_expr(user::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(user::Column::Id.eq(user_id))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        return Err(Error::NotFound { entity: "user" });
    }

    find_user(conn, user_id).await
}

/// Applies a manual admin adjustment (ADD, REMOVE or SET) and writes the
/// append-only audit row with before/after snapshots.
///
/// # Errors
/// `BadRequest` for a non-positive ADD/REMOVE amount or a negative SET
/// target, `InsufficientFunds` when REMOVE exceeds the balance, `NotFound`
/// for an unknown user.
pub async fn adjust<C>(
    conn: &C,
    admin_id: i64,
    user_id: i64,
    operation: AdjustOperation,
    amount: Decimal,
    reason: Option<String>,
) -> Result<(user::Model, balance_adjustment::Model)>
where
    C: ConnectionTrait,
{
    let amount = round_money(amount);
    let user = find_user(conn, user_id).await?;
    let before = user.wallet_balance;

    let after = match operation {
        AdjustOperation::Add => {
            if amount <= Decimal::ZERO {
                return Err(Error::BadRequest(
                    "adjustment amount must be positive".to_string(),
                ));
            }
            before + amount
        }
        AdjustOperation::Remove => {
            if amount <= Decimal::ZERO {
                return Err(Error::BadRequest(
                    "adjustment amount must be positive".to_string(),
                ));
            }
            if amount > before {
                return Err(Error::InsufficientFunds {
                    current: before,
                    required: amount,
                });
            }
            before - amount
        }
        AdjustOperation::Set => {
            if amount < Decimal::ZERO {
                return Err(Error::BadRequest(
                    "balance cannot be set to a negative value".to_string(),
                ));
            }
            amount
        }
    };
    let after = round_money(after);

    let now = Utc::now();
    let mut active: user::ActiveModel = user.into();
    active.wallet_balance = Set(after);
    active.updated_at = Set(now);
    let user = active.update(conn).await?;

    let audit = balance_adjustment::ActiveModel {
        user_id: Set(user_id),
        admin_id: Set(admin_id),
        operation: Set(operation),
        amount: Set(amount),
        balance_before: Set(before),
        balance_after: Set(after),
        reason: Set(reason),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(conn)
    .await?;

    Ok((user, audit))
}

/// Lists the audit trail for one user, newest first.
///
/// # Errors
/// Returns a database error when the query fails.
pub async fn adjustments_for_user<C>(
    conn: &C,
    user_id: i64,
) -> Result<Vec<balance_adjustment::Model>>
where
    C: ConnectionTrait,
{
    BalanceAdjustment::find()
        .filter(balance_adjustment::Column::UserId.eq(user_id))
        .order_by_desc(balance_adjustment::Column::CreatedAt)
        .all(conn)
        .await
        .map_err(Into::into)
}

async fn find_user<C>(conn: &C, user_id: i64) -> Result<user::Model>
where
    C: ConnectionTrait,
{
    User::find_by_id(user_id)
        .one(conn)
        .await?
        .ok_or(Error::NotFound { entity: "user" })
}
