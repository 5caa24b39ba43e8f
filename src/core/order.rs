//! Order engine - the purchase state machine and order views.
//!
//! A purchase runs as one transaction: validate buyer and product, debit the
//! wallet, dispatch on the product's delivery strategy, persist the immutable
//! order row, and commit. Any failure after the debit rolls the whole unit
//! back; the buyer can never be charged for an undeliverable automatic
//! product, and no order can exist without its debit.

use chrono::Utc;
use sea_orm::{QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*};
use tracing::{error, info};

use crate::{
    core::{affiliate, ledger, product as products, settings, stock, users},
    crypto::CredentialCipher,
    entities::{
        Order, Product, StockAccount, User,
        enums::{AffiliateTrigger, DeliveryKind, DeliveryStatus},
        order, product, stock_account,
    },
    errors::{Error, Result},
    models::{AdminOrderDetail, Credential, OrderSummary, PurchaseReceipt, PurchaseRequest},
    notify::{Notification, Notifier},
};

/// Fallback delivery message when a product carries no instruction text.
const DEFAULT_DELIVERY_MESSAGE: &str = "Here are your credentials:";

/// Acknowledgement for manual-delivery products.
const MANUAL_PENDING_MESSAGE: &str = "Order received!\n\n\
    The administrator has been notified and is preparing your account. \
    You will get a new message here with the credentials as soon as it is ready.";

/// Executes a purchase end to end and returns the buyer's receipt.
///
/// See the module docs for the transaction discipline. The affiliate
/// evaluator runs inside the same transaction (the order just created counts
/// as the first purchase); its notification is dispatched only after commit.
///
/// # Errors
/// `NotFound`/`Inactive` for a missing or disabled buyer or product,
/// `BadRequest` for a missing customer email on an email-delivery product,
/// `InsufficientFunds` when the wallet does not cover the price,
/// `OutOfStock` when automatic allocation finds no eligible account,
/// `Delivery` when the allocated credential cannot be decrypted.
pub async fn purchase<N>(
    db: &DatabaseConnection,
    cipher: &CredentialCipher,
    notifier: &N,
    request: &PurchaseRequest,
) -> Result<PurchaseReceipt>
where
    N: Notifier,
{
    let txn = db.begin().await?;

    let buyer = users::require_by_telegram_id(&txn, request.telegram_id).await?;
    let product = products::require_product(&txn, request.product_id).await?;
    if !product.is_active {
        return Err(Error::Inactive { entity: "product" });
    }

    if buyer.wallet_balance < product.price {
        return Err(Error::InsufficientFunds {
            current: buyer.wallet_balance,
            required: product.price,
        });
    }

    // Email-delivery products need the email before anything is staged.
    let customer_email = match product.delivery_kind {
        DeliveryKind::RequiresEmail => {
            let email = request
                .customer_email
                .as_deref()
                .map(str::trim)
                .unwrap_or_default();
            if email.is_empty() {
                return Err(Error::BadRequest(
                    "this product requires a customer email for delivery".to_string(),
                ));
            }
            Some(email.to_string())
        }
        _ => request.customer_email.clone(),
    };

    let amount_paid = product.price;
    let buyer = ledger::debit(&txn, buyer.id, amount_paid).await?;

    let mut stock_account_id = None;
    let mut credential = None;
    let mut delivery_status = DeliveryStatus::Delivered;
    let message = match product.delivery_kind {
        DeliveryKind::Automatic => {
            let account = stock::reserve_slot(&txn, product.id, None).await?;
            // A corrupted or rotated key must abort the purchase, never hand
            // out an empty credential.
            let secret = cipher.decrypt(&account.secret_enc)?;
            credential = Some(Credential {
                login: account.login.clone(),
                secret,
            });
            stock_account_id = Some(account.id);

            products::deactivate_if_unavailable(&txn, product.id).await?;
            compose_delivery_message(&product, Some(&account))
        }
        DeliveryKind::RequiresEmail => {
            // No slot is reserved at purchase time; the invite is a
            // downstream admin/pooled process keyed on this email.
            let email = customer_email.as_deref().unwrap_or_default();
            let instructions = product
                .post_purchase_instructions
                .clone()
                .unwrap_or_else(|| {
                    "Delivery is manual and can take a few minutes.".to_string()
                });
            format!("The invite will be sent to the email:\n{email}\n\nInstructions:\n{instructions}")
        }
        DeliveryKind::ManualAdmin => {
            delivery_status = DeliveryStatus::Pending;
            MANUAL_PENDING_MESSAGE.to_string()
        }
    };

    let order = order::ActiveModel {
        user_id: Set(buyer.id),
        product_id: Set(product.id),
        stock_account_id: Set(stock_account_id),
        pooled_account_id: Set(None),
        amount_paid: Set(amount_paid),
        customer_email: Set(customer_email),
        delivery_status: Set(delivery_status),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let config = settings::get_or_create(&txn).await?;
    let grant = affiliate::evaluate(
        &txn,
        &config,
        &buyer,
        amount_paid,
        AffiliateTrigger::FirstPurchase,
    )
    .await?;

    txn.commit().await?;
    info!(
        order_id = order.id,
        buyer_id = buyer.id,
        product_id = product.id,
        %amount_paid,
        "purchase completed"
    );

    if let Some(grant) = &grant {
        crate::notify::dispatch(notifier, &grant.notification).await;
    }

    Ok(PurchaseReceipt {
        order_id: order.id,
        created_at: order.created_at,
        amount_paid,
        new_balance: buyer.wallet_balance,
        product_name: product.name,
        delivery_kind: product.delivery_kind,
        credential,
        message,
    })
}

/// Completes a PENDING (manual-delivery) order: stores the credential the
/// admin prepared as a dedicated, fully consumed single-slot stock account
/// and flips the order to DELIVERED. The buyer is notified after commit.
///
/// # Errors
/// `NotFound` for an unknown order, `Conflict` when the order is not
/// awaiting manual fulfilment.
pub async fn fulfil_manual_order<N>(
    db: &DatabaseConnection,
    cipher: &CredentialCipher,
    notifier: &N,
    order_id: i64,
    login: &str,
    secret: &str,
    delivery_instructions: Option<String>,
) -> Result<order::Model>
where
    N: Notifier,
{
    let txn = db.begin().await?;

    let order = Order::find_by_id(order_id)
        .one(&txn)
        .await?
        .ok_or(Error::NotFound { entity: "order" })?;
    if order.delivery_status != DeliveryStatus::Pending {
        return Err(Error::Conflict(
            "order is not awaiting manual fulfilment".to_string(),
        ));
    }

    let now = Utc::now();
    // Single slot, already occupied: the account exists only to carry this
    // order's credential and is born fully consumed.
    let account = stock_account::ActiveModel {
        product_id: Set(order.product_id),
        login: Set(login.to_string()),
        secret_enc: Set(cipher.encrypt(secret)?),
        max_slots: Set(1),
        occupied_slots: Set(1),
        is_active: Set(false),
        needs_attention: Set(false),
        expires_on: Set(None),
        delivery_instructions: Set(delivery_instructions),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let mut active: order::ActiveModel = order.into();
    active.stock_account_id = Set(Some(account.id));
    active.delivery_status = Set(DeliveryStatus::Delivered);
    let order = active.update(&txn).await?;

    let buyer = User::find_by_id(order.user_id)
        .one(&txn)
        .await?
        .ok_or(Error::NotFound { entity: "user" })?;

    txn.commit().await?;
    info!(order_id = order.id, "manual order fulfilled");

    crate::notify::dispatch(
        notifier,
        &Notification {
            telegram_id: buyer.telegram_id,
            body: format!(
                "Your order is ready!\n\nLogin: {login}\nPassword: {secret}"
            ),
        },
    )
    .await;

    Ok(order)
}

/// The buyer's most recent orders, newest first.
///
/// # Errors
/// `NotFound` for an unknown buyer.
pub async fn recent_orders_for_buyer<C>(
    conn: &C,
    telegram_id: i64,
    limit: u64,
) -> Result<Vec<OrderSummary>>
where
    C: ConnectionTrait,
{
    let buyer = users::require_by_telegram_id(conn, telegram_id).await?;

    let rows = Order::find()
        .filter(order::Column::UserId.eq(buyer.id))
        .order_by_desc(order::Column::CreatedAt)
        .limit(limit)
        .find_also_related(Product)
        .all(conn)
        .await?;

    Ok(rows
        .into_iter()
        .map(|(order, product)| OrderSummary {
            order_id: order.id,
            product_name: product.map(|p| p.name).unwrap_or_default(),
            amount_paid: order.amount_paid,
            created_at: order.created_at,
        })
        .collect())
}

/// Admin detail view of one order, with the delivered credential decrypted.
/// A failed decryption degrades to a marked placeholder rather than hiding
/// the order from the operator.
///
/// # Errors
/// `NotFound` for an unknown order or its missing buyer/product rows.
pub async fn admin_order_detail<C>(
    conn: &C,
    cipher: &CredentialCipher,
    order_id: i64,
) -> Result<AdminOrderDetail>
where
    C: ConnectionTrait,
{
    let order = Order::find_by_id(order_id)
        .one(conn)
        .await?
        .ok_or(Error::NotFound { entity: "order" })?;
    let product = products::require_product(conn, order.product_id).await?;
    let buyer = User::find_by_id(order.user_id)
        .one(conn)
        .await?
        .ok_or(Error::NotFound { entity: "user" })?;

    let mut credential = None;
    if let Some(stock_account_id) = order.stock_account_id {
        if let Some(account) = StockAccount::find_by_id(stock_account_id).one(conn).await? {
            let secret = cipher.decrypt(&account.secret_enc).unwrap_or_else(|e| {
                error!(order_id, account_id = account.id, error = %e, "credential decryption failed");
                "[decryption failed]".to_string()
            });
            credential = Some(Credential {
                login: account.login,
                secret,
            });
        }
    }

    Ok(AdminOrderDetail {
        order_id: order.id,
        created_at: order.created_at,
        amount_paid: order.amount_paid,
        customer_email: order.customer_email,
        product_name: product.name,
        buyer_name: buyer.full_name,
        buyer_telegram_id: buyer.telegram_id,
        credential,
    })
}

/// Builds the delivery message from product-level and account-level
/// instruction text, falling back to a plain header.
fn compose_delivery_message(
    product: &product::Model,
    account: Option<&stock_account::Model>,
) -> String {
    let mut parts = Vec::new();
    if let Some(instructions) = &product.post_purchase_instructions {
        parts.push(instructions.clone());
    }
    if let Some(note) = account.and_then(|a| a.delivery_instructions.as_ref()) {
        parts.push(format!("Account note:\n{note}"));
    }
    if parts.is_empty() {
        DEFAULT_DELIVERY_MESSAGE.to_string()
    } else {
        parts.join("\n\n")
    }
}
