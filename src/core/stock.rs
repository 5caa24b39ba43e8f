//! Stock allocator - contention-safe reservation of shared-credential slots.
//!
//! Selection prefers accounts that expire soonest (so near-expiry inventory
//! drains first) and, within the same date, the least-occupied account.
//! Reservation never blocks on a contended row: each candidate is claimed
//! with a single guarded UPDATE that re-checks eligibility, and on a miss the
//! allocator simply moves to the next candidate. Under extreme contention
//! this can report `OutOfStock` while a slot is technically in flight, which
//! is the accepted trade for bounded latency.

use chrono::Utc;
use sea_orm::{
    Order, QueryOrder, QuerySelect, Set, prelude::*, sea_query::Expr, sea_query::NullOrdering,
};
use tracing::{debug, info};

use crate::{
    crypto::CredentialCipher,
    entities::{StockAccount, stock_account},
    errors::{Error, Result},
};

/// Upper bound on candidates examined per reservation attempt.
const CANDIDATE_SCAN_LIMIT: u64 = 16;

/// Reserves one slot on an eligible stock account of the product.
///
/// Pass `exclude_account_id` to keep a known-bad account out of the running
/// (hot-swap replacement). On success the account's occupied count has been
/// incremented and, if it just reached capacity, the account deactivated.
///
/// # Errors
/// `OutOfStock` when no eligible account can be claimed within the scan.
pub async fn reserve_slot<C>(
    conn: &C,
    product_id: i64,
    exclude_account_id: Option<i64>,
) -> Result<stock_account::Model>
where
    C: ConnectionTrait,
{
    let mut query = StockAccount::find()
        .filter(stock_account::Column::ProductId.eq(product_id))
        .filter(stock_account::Column::IsActive.eq(true))
        .filter(stock_account::Column::NeedsAttention.eq(false))
        .filter(
            Expr::col(stock_account::Column::OccupiedSlots)
                .lt(Expr::col(stock_account::Column::MaxSlots)),
        )
        .order_by_with_nulls(
            stock_account::Column::ExpiresOn,
            Order::Asc,
            NullOrdering::Last,
        )
        .order_by_asc(stock_account::Column::OccupiedSlots)
        .limit(CANDIDATE_SCAN_LIMIT);
    if let Some(excluded) = exclude_account_id {
        query = query.filter(stock_account::Column::Id.ne(excluded));
    }

    let candidates = query.all(conn).await?;
    for candidate in candidates {
        if try_claim_slot(conn, candidate.id).await? {
            let account = reload(conn, candidate.id).await?;
            let account = deactivate_if_full(conn, account).await?;
            debug!(
                account_id = account.id,
                occupied = account.occupied_slots,
                max = account.max_slots,
                "reserved stock slot"
            );
            return Ok(account);
        }
        // Claimed or flagged by a concurrent transaction; skip to the next
        // candidate instead of waiting on it.
    }

    Err(Error::OutOfStock)
}

/// Attempts to claim one slot with a guarded atomic increment. The WHERE
/// clause repeats the full eligibility predicate, so the check and the
/// increment are one statement and a raced-out candidate simply misses.
async fn try_claim_slot<C>(conn: &C, account_id: i64) -> Result<bool>
where
    C: ConnectionTrait,
{
    let result = StockAccount::update_many()
        .col_expr(
            stock_account::Column::OccupiedSlots,
            Expr::col(stock_account::Column::OccupiedSlots).add(1),
        )
        .col_expr(stock_account::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(stock_account::Column::Id.eq(account_id))
        .filter(stock_account::Column::IsActive.eq(true))
        .filter(stock_account::Column::NeedsAttention.eq(false))
        .filter(
            Expr::col(stock_account::Column::OccupiedSlots)
                .lt(Expr::col(stock_account::Column::MaxSlots)),
        )
        .exec(conn)
        .await?;

    Ok(result.rows_affected == 1)
}

/// Deactivates a fully consumed account. One-directional: the system never
/// reactivates an account on its own.
async fn deactivate_if_full<C>(
    conn: &C,
    account: stock_account::Model,
) -> Result<stock_account::Model>
where
    C: ConnectionTrait,
{
    if account.occupied_slots < account.max_slots || !account.is_active {
        return Ok(account);
    }

    info!(account_id = account.id, "stock account fully consumed");
    let mut active: stock_account::ActiveModel = account.into();
    active.is_active = Set(false);
    active.updated_at = Set(Utc::now());
    active.update(conn).await.map_err(Into::into)
}

/// Whether the product still has at least one allocatable stock account.
///
/// # Errors
/// Returns a database error when the query fails.
pub async fn has_capacity<C>(conn: &C, product_id: i64) -> Result<bool>
where
    C: ConnectionTrait,
{
    Ok(StockAccount::find()
        .filter(stock_account::Column::ProductId.eq(product_id))
        .filter(stock_account::Column::IsActive.eq(true))
        .filter(stock_account::Column::NeedsAttention.eq(false))
        .filter(
            Expr::col(stock_account::Column::OccupiedSlots)
                .lt(Expr::col(stock_account::Column::MaxSlots)),
        )
        .limit(1)
        .one(conn)
        .await?
        .is_some())
}

/// Adds a credential to the stock pool; the secret is encrypted before it
/// is stored.
///
/// # Errors
/// `NotFound` for an unknown product, `BadRequest` for a capacity below one.
pub async fn add_account<C>(
    conn: &C,
    cipher: &CredentialCipher,
    product_id: i64,
    login: &str,
    secret: &str,
    max_slots: i32,
    expires_on: Option<Date>,
    delivery_instructions: Option<String>,
) -> Result<stock_account::Model>
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
    stock_account::ActiveModel {
        product_id: Set(product_id),
        login: Set(login.to_string()),
        secret_enc: Set(cipher.encrypt(secret)?),
        max_slots: Set(max_slots),
        occupied_slots: Set(0),
        is_active: Set(true),
        needs_attention: Set(false),
        expires_on: Set(expires_on),
        delivery_instructions: Set(delivery_instructions),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(conn)
    .await
    .map_err(Into::into)
}

/// Lists a product's stock accounts for the admin panel.
///
/// # Errors
/// Returns a database error when the query fails.
pub async fn list_for_product<C>(conn: &C, product_id: i64) -> Result<Vec<stock_account::Model>>
where
    C: ConnectionTrait,
{
    StockAccount::find()
        .filter(stock_account::Column::ProductId.eq(product_id))
        .order_by_asc(stock_account::Column::Id)
        .all(conn)
        .await
        .map_err(Into::into)
}

/// Updates a stock account's credential and capacity. A new secret is
/// re-encrypted; the capacity may not drop below the occupied count.
///
/// # Errors
/// `NotFound` for an unknown account, `BadRequest` when the new capacity is
/// below one or below the slots already handed out.
pub async fn update_account<C>(
    conn: &C,
    cipher: &CredentialCipher,
    account_id: i64,
    new_secret: Option<&str>,
    new_max_slots: Option<i32>,
    expires_on: Option<Date>,
) -> Result<stock_account::Model>
where
    C: ConnectionTrait,
{
    let account = reload(conn, account_id).await?;

    if let Some(max_slots) = new_max_slots {
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
    }

    let mut active: stock_account::ActiveModel = account.into();
    if let Some(secret) = new_secret {
        active.secret_enc = Set(cipher.encrypt(secret)?);
    }
    if let Some(max_slots) = new_max_slots {
        active.max_slots = Set(max_slots);
    }
    if expires_on.is_some() {
        active.expires_on = Set(expires_on);
    }
    active.updated_at = Set(Utc::now());
    active.update(conn).await.map_err(Into::into)
}

/// Clears the attention flag after an admin has verified or replaced the
/// credential. Does not reactivate a consumed account.
///
/// # Errors
/// `NotFound` for an unknown account.
pub async fn clear_attention<C>(conn: &C, account_id: i64) -> Result<stock_account::Model>
where
    C: ConnectionTrait,
{
    let account = reload(conn, account_id).await?;
    let mut active: stock_account::ActiveModel = account.into();
    active.needs_attention = Set(false);
    active.updated_at = Set(Utc::now());
    active.update(conn).await.map_err(Into::into)
}

async fn reload<C>(conn: &C, account_id: i64) -> Result<stock_account::Model>
where
    C: ConnectionTrait,
{
    StockAccount::find_by_id(account_id)
        .one(conn)
        .await?
        .ok_or(Error::NotFound {
            entity: "stock account",
        })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::entities::enums::DeliveryKind;
    use crate::test_utils::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use tokio::task::JoinSet;

    #[tokio::test]
    async fn test_reserve_increments_and_persists() -> Result<()> {
        let db = setup_test_db().await?;
        let product =
            create_test_product(&db, "Netflix", dec!(20.00), DeliveryKind::Automatic).await?;
        let account = create_test_stock_account(&db, product.id, "a@pool.com").await?;
        assert_eq!(account.occupied_slots, 0);

        let reserved = reserve_slot(&db, product.id, None).await?;
        assert_eq!(reserved.id, account.id);
        assert_eq!(reserved.occupied_slots, 1);
        assert!(reserved.is_active);

        Ok(())
    }

    #[tokio::test]
    async fn test_reserve_out_of_stock() -> Result<()> {
        let db = setup_test_db().await?;
        let product =
            create_test_product(&db, "Netflix", dec!(20.00), DeliveryKind::Automatic).await?;

        let result = reserve_slot(&db, product.id, None).await;
        assert!(matches!(result.unwrap_err(), Error::OutOfStock));

        Ok(())
    }

    #[tokio::test]
    async fn test_full_account_deactivates_one_way() -> Result<()> {
        let db = setup_test_db().await?;
        let product =
            create_test_product(&db, "Netflix", dec!(20.00), DeliveryKind::Automatic).await?;
        // Capacity two: second reservation consumes the account
        create_test_stock_account(&db, product.id, "a@pool.com").await?;

        reserve_slot(&db, product.id, None).await?;
        let full = reserve_slot(&db, product.id, None).await?;
        assert_eq!(full.occupied_slots, 2);
        assert!(!full.is_active);

        let result = reserve_slot(&db, product.id, None).await;
        assert!(matches!(result.unwrap_err(), Error::OutOfStock));

        Ok(())
    }

    #[tokio::test]
    async fn test_flagged_and_inactive_accounts_are_skipped() -> Result<()> {
        let db = setup_test_db().await?;
        let product =
            create_test_product(&db, "Netflix", dec!(20.00), DeliveryKind::Automatic).await?;
        let flagged = create_test_stock_account(&db, product.id, "flagged@pool.com").await?;

        let mut active: stock_account::ActiveModel = flagged.into();
        active.needs_attention = Set(true);
        active.update(&db).await?;

        let result = reserve_slot(&db, product.id, None).await;
        assert!(matches!(result.unwrap_err(), Error::OutOfStock));

        Ok(())
    }

    #[tokio::test]
    async fn test_exclusion_for_hot_swap() -> Result<()> {
        let db = setup_test_db().await?;
        let product =
            create_test_product(&db, "Netflix", dec!(20.00), DeliveryKind::Automatic).await?;
        let only = create_test_stock_account(&db, product.id, "only@pool.com").await?;

        let result = reserve_slot(&db, product.id, Some(only.id)).await;
        assert!(matches!(result.unwrap_err(), Error::OutOfStock));

        let other = create_test_stock_account(&db, product.id, "other@pool.com").await?;
        let reserved = reserve_slot(&db, product.id, Some(only.id)).await?;
        assert_eq!(reserved.id, other.id);

        Ok(())
    }

    #[tokio::test]
    async fn test_near_expiry_inventory_drains_first() -> Result<()> {
        let db = setup_test_db().await?;
        let product =
            create_test_product(&db, "Netflix", dec!(20.00), DeliveryKind::Automatic).await?;

        let fresh = create_stock_account_with(
            &db,
            product.id,
            "fresh@pool.com",
            4,
            0,
            NaiveDate::from_ymd_opt(2027, 6, 1),
        )
        .await?;
        let expiring = create_stock_account_with(
            &db,
            product.id,
            "expiring@pool.com",
            4,
            2,
            NaiveDate::from_ymd_opt(2026, 9, 1),
        )
        .await?;
        let undated =
            create_stock_account_with(&db, product.id, "undated@pool.com", 4, 0, None).await?;

        // Soonest expiration wins even with more occupied slots
        let first = reserve_slot(&db, product.id, None).await?;
        assert_eq!(first.id, expiring.id);

        // With the expiring account excluded, the dated account beats the
        // undated one
        let second = reserve_slot(&db, product.id, Some(expiring.id)).await?;
        assert_eq!(second.id, fresh.id);

        let _ = undated;
        Ok(())
    }

    #[tokio::test]
    async fn test_load_balances_across_equal_dates() -> Result<()> {
        let db = setup_test_db().await?;
        let product =
            create_test_product(&db, "Netflix", dec!(20.00), DeliveryKind::Automatic).await?;

        let busy = create_stock_account_with(&db, product.id, "busy@pool.com", 4, 3, None).await?;
        let idle = create_stock_account_with(&db, product.id, "idle@pool.com", 4, 0, None).await?;

        let reserved = reserve_slot(&db, product.id, None).await?;
        assert_eq!(reserved.id, idle.id);

        let _ = busy;
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_reservations_never_overbook() -> Result<()> {
        let db = setup_test_db().await?;
        let product =
            create_test_product(&db, "Netflix", dec!(20.00), DeliveryKind::Automatic).await?;
        // One account with exactly 3 free slots, 8 concurrent buyers
        let account =
            create_stock_account_with(&db, product.id, "hot@pool.com", 3, 0, None).await?;

        let mut tasks = JoinSet::new();
        for _ in 0..8 {
            let db = db.clone();
            let product_id = product.id;
            tasks.spawn(async move { reserve_slot(&db, product_id, None).await });
        }

        let mut successes = 0;
        let mut out_of_stock = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined.expect("task panicked") {
                Ok(_) => successes += 1,
                Err(Error::OutOfStock) => out_of_stock += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }

        assert_eq!(successes, 3);
        assert_eq!(out_of_stock, 5);

        let final_state = StockAccount::find_by_id(account.id)
            .one(&db)
            .await?
            .unwrap();
        assert_eq!(final_state.occupied_slots, 3);
        assert!(!final_state.is_active);

        Ok(())
    }

    #[tokio::test]
    async fn test_add_account_encrypts_secret() -> Result<()> {
        let db = setup_test_db().await?;
        let cipher = test_cipher();
        let product =
            create_test_product(&db, "Netflix", dec!(20.00), DeliveryKind::Automatic).await?;

        let account = add_account(
            &db,
            &cipher,
            product.id,
            "login@pool.com",
            "s3cret",
            2,
            None,
            None,
        )
        .await?;
        assert_ne!(account.secret_enc, "s3cret");
        assert_eq!(cipher.decrypt(&account.secret_enc)?, "s3cret");

        Ok(())
    }

    #[tokio::test]
    async fn test_add_account_validation() -> Result<()> {
        let db = setup_test_db().await?;
        let cipher = test_cipher();
        let product =
            create_test_product(&db, "Netflix", dec!(20.00), DeliveryKind::Automatic).await?;

        let result = add_account(&db, &cipher, 999, "a", "b", 1, None, None).await;
        assert!(matches!(result.unwrap_err(), Error::NotFound { .. }));

        let result = add_account(&db, &cipher, product.id, "a", "b", 0, None, None).await;
        assert!(matches!(result.unwrap_err(), Error::BadRequest(_)));

        Ok(())
    }

    #[tokio::test]
    async fn test_update_account_floors_capacity_at_occupancy() -> Result<()> {
        let db = setup_test_db().await?;
        let cipher = test_cipher();
        let product =
            create_test_product(&db, "Netflix", dec!(20.00), DeliveryKind::Automatic).await?;
        let account =
            create_stock_account_with(&db, product.id, "a@pool.com", 4, 2, None).await?;

        let result = update_account(&db, &cipher, account.id, None, Some(1), None).await;
        assert!(matches!(result.unwrap_err(), Error::BadRequest(_)));

        let updated =
            update_account(&db, &cipher, account.id, Some("rotated"), Some(2), None).await?;
        assert_eq!(updated.max_slots, 2);
        assert_eq!(cipher.decrypt(&updated.secret_enc)?, "rotated");

        Ok(())
    }

    #[tokio::test]
    async fn test_list_for_product() -> Result<()> {
        let db = setup_test_db().await?;
        let product =
            create_test_product(&db, "Netflix", dec!(20.00), DeliveryKind::Automatic).await?;
        create_test_stock_account(&db, product.id, "a@pool.com").await?;
        create_test_stock_account(&db, product.id, "b@pool.com").await?;

        let accounts = list_for_product(&db, product.id).await?;
        assert_eq!(accounts.len(), 2);

        Ok(())
    }

    #[tokio::test]
    async fn test_clear_attention_restores_eligibility() -> Result<()> {
        let db = setup_test_db().await?;
        let product =
            create_test_product(&db, "Netflix", dec!(20.00), DeliveryKind::Automatic).await?;
        let account = create_test_stock_account(&db, product.id, "a@pool.com").await?;

        let mut active: stock_account::ActiveModel = account.clone().into();
        active.needs_attention = Set(true);
        active.update(&db).await?;
        assert!(!has_capacity(&db, product.id).await?);

        clear_attention(&db, account.id).await?;
        assert!(has_capacity(&db, product.id).await?);

        Ok(())
    }
}
