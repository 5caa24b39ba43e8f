//! Shared test utilities.
//!
//! Helper functions for setting up in-memory test databases and creating
//! test entities with sensible defaults.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{DatabaseConnection, Set, prelude::*};

use crate::{
    core::{ledger, pooled, product, stock, users},
    crypto::CredentialCipher,
    entities::{self, enums::DeliveryKind, enums::DeliveryStatus},
    errors::Result,
};

/// Plaintext secret used for every test credential.
pub const TEST_SECRET: &str = "s3cret-pass";

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Cipher with a fixed key so stored secrets stay decryptable across a test.
#[allow(clippy::unwrap_used)]
pub fn test_cipher() -> CredentialCipher {
    CredentialCipher::new(&[7u8; 32]).unwrap()
}

/// Creates a test user with an empty wallet.
pub async fn create_test_user(
    db: &DatabaseConnection,
    telegram_id: i64,
) -> Result<entities::user::Model> {
    users::get_or_create(db, telegram_id, "Test User", None).await
}

/// Creates a test user and credits the given starting balance.
pub async fn create_funded_user(
    db: &DatabaseConnection,
    telegram_id: i64,
    balance: Decimal,
) -> Result<entities::user::Model> {
    let user = create_test_user(db, telegram_id).await?;
    ledger::credit(db, user.id, balance).await
}

/// Creates a test user referred by an existing user.
pub async fn create_referred_user(
    db: &DatabaseConnection,
    telegram_id: i64,
    referrer_telegram_id: i64,
) -> Result<entities::user::Model> {
    users::get_or_create(db, telegram_id, "Referred User", Some(referrer_telegram_id)).await
}

/// Creates a test user with the admin flag set.
pub async fn create_test_admin(
    db: &DatabaseConnection,
    telegram_id: i64,
) -> Result<entities::user::Model> {
    let user = create_test_user(db, telegram_id).await?;
    let mut active: entities::user::ActiveModel = user.into();
    active.is_admin = Set(true);
    active.update(db).await.map_err(Into::into)
}

/// Creates an active test product.
pub async fn create_test_product(
    db: &DatabaseConnection,
    name: &str,
    price: Decimal,
    delivery_kind: DeliveryKind,
) -> Result<entities::product::Model> {
    product::create_product(db, name, None, price, delivery_kind, None).await
}

/// Creates a stock account with two free slots and the standard test secret.
pub async fn create_test_stock_account(
    db: &DatabaseConnection,
    product_id: i64,
    login: &str,
) -> Result<entities::stock_account::Model> {
    stock::add_account(
        db,
        &test_cipher(),
        product_id,
        login,
        TEST_SECRET,
        2,
        None,
        None,
    )
    .await
}

/// Creates a stock account with explicit capacity, occupancy and expiration.
pub async fn create_stock_account_with(
    db: &DatabaseConnection,
    product_id: i64,
    login: &str,
    max_slots: i32,
    occupied_slots: i32,
    expires_on: Option<NaiveDate>,
) -> Result<entities::stock_account::Model> {
    let account = stock::add_account(
        db,
        &test_cipher(),
        product_id,
        login,
        TEST_SECRET,
        max_slots,
        expires_on,
        None,
    )
    .await?;

    if occupied_slots == 0 {
        return Ok(account);
    }
    let mut active: entities::stock_account::ActiveModel = account.into();
    active.occupied_slots = Set(occupied_slots);
    active.update(db).await.map_err(Into::into)
}

/// Creates a stock account whose stored secret is not valid ciphertext, for
/// decryption-failure paths.
pub async fn create_corrupt_stock_account(
    db: &DatabaseConnection,
    product_id: i64,
    login: &str,
) -> Result<entities::stock_account::Model> {
    let account = create_test_stock_account(db, product_id, login).await?;
    let mut active: entities::stock_account::ActiveModel = account.into();
    active.secret_enc = Set("definitely-not-ciphertext".to_string());
    active.update(db).await.map_err(Into::into)
}

/// Creates a pooled account with the given invite capacity.
pub async fn create_test_pooled_account(
    db: &DatabaseConnection,
    product_id: i64,
    max_slots: i32,
) -> Result<entities::pooled_account::Model> {
    pooled::add_account(
        db,
        &test_cipher(),
        product_id,
        "mother@pool.com",
        TEST_SECRET,
        max_slots,
        None,
    )
    .await
}

/// Inserts a DELIVERED order row directly, bypassing the purchase flow, for
/// tests that need an order in a known state.
pub async fn create_delivered_order(
    db: &DatabaseConnection,
    user_id: i64,
    product_id: i64,
    stock_account_id: Option<i64>,
    amount_paid: Decimal,
    customer_email: Option<String>,
) -> Result<entities::order::Model> {
    entities::order::ActiveModel {
        user_id: Set(user_id),
        product_id: Set(product_id),
        stock_account_id: Set(stock_account_id),
        pooled_account_id: Set(None),
        amount_paid: Set(amount_paid),
        customer_email: Set(customer_email),
        delivery_status: Set(DeliveryStatus::Delivered),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}
