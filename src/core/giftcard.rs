//! Gift-card issuance and single-use redemption.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{Set, prelude::*, sea_query::Expr};
use tracing::info;

use crate::{
    core::ledger,
    entities::{GiftCard, gift_card, user},
    errors::{Error, Result},
};

/// Issues a gift card with a fixed wallet value.
///
/// # Errors
/// `BadRequest` for a non-positive value, `Conflict` for a duplicate code.
pub async fn issue<C>(
    conn: &C,
    created_by_id: i64,
    code: &str,
    value: Decimal,
) -> Result<gift_card::Model>
where
    C: ConnectionTrait,
{
    if value <= Decimal::ZERO {
        return Err(Error::BadRequest(
            "gift card value must be positive".to_string(),
        ));
    }

    let code = code.trim();
    if code.is_empty() {
        return Err(Error::BadRequest("gift card code is required".to_string()));
    }
    if find_by_code(conn, code).await?.is_some() {
        return Err(Error::Conflict("gift card code already exists".to_string()));
    }

    gift_card::ActiveModel {
        code: Set(code.to_string()),
        value: Set(ledger::round_money(value)),
        is_used: Set(false),
        created_by_id: Set(created_by_id),
        used_by_id: Set(None),
        created_at: Set(Utc::now()),
        used_at: Set(None),
        ..Default::default()
    }
    .insert(conn)
    .await
    .map_err(Into::into)
}

/// Redeems a gift card into a user's wallet. Single-use: the claim is a
/// guarded UPDATE, so two racing redemptions cannot both credit.
///
/// # Errors
/// `NotFound` for an unknown code or user, `Conflict` when already redeemed.
pub async fn redeem<C>(
    conn: &C,
    user: &user::Model,
    code: &str,
) -> Result<(user::Model, gift_card::Model)>
where
    C: ConnectionTrait,
{
    let card = find_by_code(conn, code.trim()).await?.ok_or(Error::NotFound {
        entity: "gift card",
    })?;
    if card.is_used {
        return Err(Error::Conflict("gift card already redeemed".to_string()));
    }

    let claimed = GiftCard::update_many()
        .col_expr(gift_card::Column::IsUsed, Expr::value(true))
        .col_expr(gift_card::Column::UsedById, Expr::value(user.id))
        .col_expr(gift_card::Column::UsedAt, Expr::value(Utc::now()))
        .filter(gift_card::Column::Id.eq(card.id))
        .filter(gift_card::Column::IsUsed.eq(false))
        .exec(conn)
        .await?;
    if claimed.rows_affected == 0 {
        return Err(Error::Conflict("gift card already redeemed".to_string()));
    }

    let user = ledger::credit(conn, user.id, card.value).await?;
    info!(user_id = user.id, card_id = card.id, "gift card redeemed");

    let card = find_by_code(conn, &card.code)
        .await?
        .ok_or(Error::Internal("gift card vanished mid-redemption".to_string()))?;

    Ok((user, card))
}

async fn find_by_code<C>(conn: &C, code: &str) -> Result<Option<gift_card::Model>>
where
    C: ConnectionTrait,
{
    GiftCard::find()
        .filter(gift_card::Column::Code.eq(code))
        .one(conn)
        .await
        .map_err(Into::into)
}
