//! Shared string-backed enums used across the entity definitions.
//!
//! Each enum is stored as its uppercase wire value so rows stay readable in
//! the database and stable across refactors of the Rust-side names.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// How a product is fulfilled after the wallet debit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(24))")]
pub enum DeliveryKind {
    /// Credentials are allocated from the stock pool at purchase time.
    #[sea_orm(string_value = "AUTOMATIC")]
    Automatic,
    /// The buyer supplies an email; access arrives via a pooled-account invite.
    #[sea_orm(string_value = "REQUIRES_EMAIL")]
    RequiresEmail,
    /// An administrator fulfils the order by hand.
    #[sea_orm(string_value = "MANUAL_ADMIN")]
    ManualAdmin,
}

/// Whether an order has been fulfilled yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum DeliveryStatus {
    #[sea_orm(string_value = "DELIVERED")]
    Delivered,
    #[sea_orm(string_value = "PENDING")]
    Pending,
}

/// Lifecycle of a wallet top-up against the payment gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum PaymentStatus {
    #[sea_orm(string_value = "PENDING")]
    Pending,
    #[sea_orm(string_value = "PAID")]
    Paid,
    #[sea_orm(string_value = "FAILED")]
    Failed,
    #[sea_orm(string_value = "REFUNDED")]
    Refunded,
}

/// Support-ticket lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum TicketStatus {
    #[sea_orm(string_value = "OPEN")]
    Open,
    #[sea_orm(string_value = "IN_REVIEW")]
    InReview,
    #[sea_orm(string_value = "RESOLVED")]
    Resolved,
    #[sea_orm(string_value = "CLOSED")]
    Closed,
}

/// Outcome recorded when a ticket leaves the admin queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(24))")]
pub enum TicketResolution {
    #[sea_orm(string_value = "NONE")]
    None,
    #[sea_orm(string_value = "ACCOUNT_SWAPPED")]
    AccountSwapped,
    #[sea_orm(string_value = "WALLET_REFUNDED")]
    WalletRefunded,
    #[sea_orm(string_value = "MANUAL")]
    Manual,
}

/// Why the buyer reported the delivered account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(24))")]
pub enum TicketReason {
    #[sea_orm(string_value = "INVALID_LOGIN")]
    InvalidLogin,
    #[sea_orm(string_value = "NO_SUBSCRIPTION")]
    NoSubscription,
    #[sea_orm(string_value = "ACCOUNT_DROPPED")]
    AccountDropped,
    #[sea_orm(string_value = "OTHER")]
    Other,
}

/// Manual wallet-adjustment operation performed by an administrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(8))")]
pub enum AdjustOperation {
    #[sea_orm(string_value = "ADD")]
    Add,
    #[sea_orm(string_value = "REMOVE")]
    Remove,
    #[sea_orm(string_value = "SET")]
    Set,
}

/// Which referred-user event the affiliate program reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(24))")]
pub enum AffiliateTrigger {
    #[sea_orm(string_value = "FIRST_TOP_UP")]
    FirstTopUp,
    #[sea_orm(string_value = "FIRST_PURCHASE")]
    FirstPurchase,
}

/// What the referrer receives when a trigger qualifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(24))")]
pub enum AffiliateRewardKind {
    /// A percentage credited on top of the referrer's next confirmed top-up.
    #[sea_orm(string_value = "PENDING_CASHBACK")]
    PendingCashback,
    /// A single-use gift card of fixed value issued immediately.
    #[sea_orm(string_value = "INSTANT_GIFT_CARD")]
    InstantGiftCard,
}
