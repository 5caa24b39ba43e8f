//! Product catalog operations.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, QuerySelect, Set, prelude::*};
use tracing::info;

use crate::{
    core::{pooled, stock},
    entities::{Product, enums::DeliveryKind, product},
    errors::{Error, Result},
};

/// Creates a new catalog entry.
///
/// # Errors
/// `BadRequest` for an empty name or a non-positive price, `Conflict` when
/// the name is already taken.
pub async fn create_product<C>(
    conn: &C,
    name: &str,
    description: Option<String>,
    price: Decimal,
    delivery_kind: DeliveryKind,
    post_purchase_instructions: Option<String>,
) -> Result<product::Model>
where
    C: ConnectionTrait,
{
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::BadRequest(
            "product name cannot be empty".to_string(),
        ));
    }
    if price <= Decimal::ZERO {
        return Err(Error::BadRequest(
            "product price must be positive".to_string(),
        ));
    }

    if Product::find()
        .filter(product::Column::Name.eq(name))
        .one(conn)
        .await?
        .is_some()
    {
        return Err(Error::Conflict(format!(
            "a product named '{name}' already exists"
        )));
    }

    let now = Utc::now();
    product::ActiveModel {
        name: Set(name.to_string()),
        description: Set(description),
        price: Set(crate::core::ledger::round_money(price)),
        is_active: Set(true),
        delivery_kind: Set(delivery_kind),
        post_purchase_instructions: Set(post_purchase_instructions),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(conn)
    .await
    .map_err(Into::into)
}

/// Fetches a product by id, failing when absent.
///
/// # Errors
/// `NotFound` when no such product exists.
pub async fn require_product<C>(conn: &C, product_id: i64) -> Result<product::Model>
where
    C: ConnectionTrait,
{
    Product::find_by_id(product_id)
        .one(conn)
        .await?
        .ok_or(Error::NotFound { entity: "product" })
}

/// Lists active products ordered by name.
///
/// # Errors
/// Returns a database error when the query fails.
pub async fn list_active<C>(conn: &C) -> Result<Vec<product::Model>>
where
    C: ConnectionTrait,
{
    Product::find()
        .filter(product::Column::IsActive.eq(true))
        .order_by_asc(product::Column::Name)
        .all(conn)
        .await
        .map_err(Into::into)
}

/// Price of the cheapest active product, used as the affiliate reward floor.
///
/// # Errors
/// Returns a database error when the query fails.
pub async fn cheapest_active_price<C>(conn: &C) -> Result<Option<Decimal>>
where
    C: ConnectionTrait,
{
    Ok(Product::find()
        .filter(product::Column::IsActive.eq(true))
        .order_by_asc(product::Column::Price)
        .limit(1)
        .one(conn)
        .await?
        .map(|p| p.price))
}

/// Deactivates a product when its delivery strategy has no eligible account
/// left. One-directional: a product is never reactivated automatically.
/// Manual-delivery products do not depend on stock and are never touched.
///
/// Returns whether the product was deactivated by this call.
///
/// # Errors
/// Returns a database error when a query fails.
pub async fn deactivate_if_unavailable<C>(conn: &C, product_id: i64) -> Result<bool>
where
    C: ConnectionTrait,
{
    let product = require_product(conn, product_id).await?;
    if !product.is_active {
        return Ok(false);
    }

    let available = match product.delivery_kind {
        DeliveryKind::Automatic => stock::has_capacity(conn, product.id).await?,
        DeliveryKind::RequiresEmail => pooled::has_capacity(conn, product.id).await?,
        DeliveryKind::ManualAdmin => true,
    };
    if available {
        return Ok(false);
    }

    info!(product_id, "deactivating product with no available accounts");
    let mut active: product::ActiveModel = product.into();
    active.is_active = Set(false);
    active.updated_at = Set(Utc::now());
    active.update(conn).await?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_create_product_validation() -> Result<()> {
        let db = setup_test_db().await?;

        let result = create_product(
            &db,
            "  ",
            None,
            dec!(10.00),
            DeliveryKind::Automatic,
            None,
        )
        .await;
        assert!(matches!(result.unwrap_err(), Error::BadRequest(_)));

        let result = create_product(
            &db,
            "Netflix",
            None,
            Decimal::ZERO,
            DeliveryKind::Automatic,
            None,
        )
        .await;
        assert!(matches!(result.unwrap_err(), Error::BadRequest(_)));

        Ok(())
    }

    #[tokio::test]
    async fn test_create_product_duplicate_name() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_product(&db, "Netflix", dec!(20.00), DeliveryKind::Automatic).await?;

        let result = create_product(
            &db,
            "Netflix",
            None,
            dec!(25.00),
            DeliveryKind::Automatic,
            None,
        )
        .await;
        assert!(matches!(result.unwrap_err(), Error::Conflict(_)));

        Ok(())
    }

    #[tokio::test]
    async fn test_cheapest_active_price_ignores_inactive() -> Result<()> {
        let db = setup_test_db().await?;
        assert!(cheapest_active_price(&db).await?.is_none());

        create_test_product(&db, "Cheap", dec!(10.00), DeliveryKind::Automatic).await?;
        create_test_product(&db, "Pricey", dec!(30.00), DeliveryKind::Automatic).await?;
        let bargain =
            create_test_product(&db, "Bargain", dec!(5.00), DeliveryKind::Automatic).await?;

        assert_eq!(cheapest_active_price(&db).await?, Some(dec!(5.00)));

        let mut active: product::ActiveModel = bargain.into();
        active.is_active = Set(false);
        active.update(&db).await?;

        assert_eq!(cheapest_active_price(&db).await?, Some(dec!(10.00)));

        Ok(())
    }

    #[tokio::test]
    async fn test_deactivate_if_unavailable() -> Result<()> {
        let db = setup_test_db().await?;
        let product =
            create_test_product(&db, "Netflix", dec!(20.00), DeliveryKind::Automatic).await?;

        // No stock at all: product goes inactive
        assert!(deactivate_if_unavailable(&db, product.id).await?);
        let reloaded = require_product(&db, product.id).await?;
        assert!(!reloaded.is_active);

        // Never reactivates on its own, even once stock appears
        create_test_stock_account(&db, product.id, "acc@example.com").await?;
        assert!(!deactivate_if_unavailable(&db, product.id).await?);
        assert!(!require_product(&db, product.id).await?.is_active);

        Ok(())
    }

    #[tokio::test]
    async fn test_manual_products_stay_active_without_stock() -> Result<()> {
        let db = setup_test_db().await?;
        let product =
            create_test_product(&db, "Custom", dec!(15.00), DeliveryKind::ManualAdmin).await?;

        assert!(!deactivate_if_unavailable(&db, product.id).await?);
        assert!(require_product(&db, product.id).await?.is_active);

        Ok(())
    }
}
