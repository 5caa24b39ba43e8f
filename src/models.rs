//! Plain request/response structures exchanged with the request layer.
//!
//! These are transport-agnostic: the HTTP/bot surface validates its own input
//! shapes and maps these results (and the typed errors) to wire formats.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::entities::enums::DeliveryKind;

/// A purchase request as handed over by the bot-facing API.
#[derive(Debug, Clone, Deserialize)]
pub struct PurchaseRequest {
    pub telegram_id: i64,
    pub product_id: i64,
    /// Required for email-delivery products, ignored otherwise
    pub customer_email: Option<String>,
}

/// A decrypted credential pair, only ever present in a delivery response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Credential {
    pub login: String,
    pub secret: String,
}

/// Receipt returned to the buyer after a successful purchase.
#[derive(Debug, Clone, Serialize)]
pub struct PurchaseReceipt {
    pub order_id: i64,
    pub created_at: DateTime<Utc>,
    pub amount_paid: Decimal,
    pub new_balance: Decimal,
    pub product_name: String,
    pub delivery_kind: DeliveryKind,
    /// Present only for automatic delivery
    pub credential: Option<Credential>,
    /// Delivery message composed from product- and account-level instructions
    pub message: String,
}

/// Result of confirming a gateway settlement callback.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum CreditOutcome {
    /// The wallet was credited by this call.
    Credited {
        top_up_id: i64,
        amount: Decimal,
        /// Extra cashback applied on top of the amount, if any was pending
        cashback: Option<Decimal>,
        new_balance: Decimal,
    },
    /// The top-up was already PAID; nothing changed.
    AlreadyProcessed { top_up_id: i64 },
}

/// One entry of a buyer's order history.
#[derive(Debug, Clone, Serialize)]
pub struct OrderSummary {
    pub order_id: i64,
    pub product_name: String,
    pub amount_paid: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Admin view of one order, credential decrypted when present.
#[derive(Debug, Clone, Serialize)]
pub struct AdminOrderDetail {
    pub order_id: i64,
    pub created_at: DateTime<Utc>,
    pub amount_paid: Decimal,
    pub customer_email: Option<String>,
    pub product_name: String,
    pub buyer_name: String,
    pub buyer_telegram_id: i64,
    pub credential: Option<Credential>,
}

/// Which account a resolved expiration date came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExpirationSource {
    PooledAccount,
    StockAccount,
}

/// Effective access-expiration of an order, with its origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExpirationInfo {
    pub expires_on: NaiveDate,
    pub source: ExpirationSource,
}
