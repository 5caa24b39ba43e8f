//! Ticket resolution engine - defect reports and their deferred resolution.
//!
//! Reporting flags the delivered account and opens the ticket. Resolution is
//! two-phase: the admin request validates and flips the ticket to IN_REVIEW
//! synchronously, then the actual work runs out-of-band in its own
//! transaction, which re-checks the IN_REVIEW precondition so a duplicated
//! request cannot resolve twice. A hot-swap that finds no replacement stock
//! quietly re-queues the ticket to OPEN instead of failing, and any internal
//! error during execution rolls back and re-opens the ticket rather than
//! leaving it stuck.

use std::str::FromStr;

use chrono::Utc;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::{error, info, warn};

use crate::{
    core::{ledger, stock, users},
    crypto::CredentialCipher,
    entities::{
        Order, StockAccount, Ticket, User,
        enums::{TicketReason, TicketResolution, TicketStatus},
        order, stock_account, ticket,
    },
    errors::{Error, Result},
    notify::{Notification, Notifier},
};

/// What the admin asked to be done with a ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionAction {
    /// Hot-swap: allocate a replacement slot, excluding the flagged account
    SwapAccount,
    /// Credit the order's paid amount back to the buyer's wallet
    RefundWallet,
    /// Close with no financial effect
    CloseManually,
}

impl FromStr for ResolutionAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SWAP_ACCOUNT" => Ok(Self::SwapAccount),
            "REFUND_WALLET" => Ok(Self::RefundWallet),
            "CLOSE_MANUALLY" => Ok(Self::CloseManually),
            other => Err(Error::BadRequest(format!("unknown action '{other}'"))),
        }
    }
}

/// A unit of deferred resolution work, handed to the background executor.
#[derive(Debug, Clone, Copy)]
pub struct ResolutionJob {
    pub ticket_id: i64,
    pub action: ResolutionAction,
}

/// Files a defect report for a delivered order.
///
/// Idempotent per order. Flags the delivered stock account so the allocator
/// stops handing it out, then opens the ticket, all in one transaction.
///
/// # Errors
/// `NotFound` for an unknown buyer, an unknown order, an order that does not
/// belong to the buyer, or an order with no stock account to flag;
/// `Conflict` when the order already has a ticket.
pub async fn report_defect(
    db: &DatabaseConnection,
    telegram_id: i64,
    order_id: i64,
    reason: TicketReason,
    details: Option<String>,
) -> Result<ticket::Model> {
    let txn = db.begin().await?;

    let reporter = users::require_by_telegram_id(&txn, telegram_id).await?;
    let order = Order::find_by_id(order_id)
        .one(&txn)
        .await?
        // A foreign order is reported as absent, never acknowledged
        .filter(|o| o.user_id == reporter.id)
        .ok_or(Error::NotFound { entity: "order" })?;

    let existing = Ticket::find()
        .filter(ticket::Column::OrderId.eq(order.id))
        .one(&txn)
        .await?;
    if existing.is_some() {
        return Err(Error::Conflict(
            "a support ticket already exists for this order".to_string(),
        ));
    }

    let account_id = order.stock_account_id.ok_or(Error::NotFound {
        entity: "stock account",
    })?;
    let account = StockAccount::find_by_id(account_id)
        .one(&txn)
        .await?
        .ok_or(Error::NotFound {
            entity: "stock account",
        })?;

    let mut flagged: stock_account::ActiveModel = account.into();
    flagged.needs_attention = Set(true);
    flagged.updated_at = Set(Utc::now());
    flagged.update(&txn).await?;

    let now = Utc::now();
    let new_ticket = ticket::ActiveModel {
        order_id: Set(order.id),
        user_id: Set(reporter.id),
        stock_account_id: Set(Some(account_id)),
        reason: Set(reason),
        details: Set(details),
        status: Set(TicketStatus::Open),
        resolution: Set(TicketResolution::None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;
    info!(
        ticket_id = new_ticket.id,
        order_id,
        account_id,
        "defect reported, account flagged"
    );

    Ok(new_ticket)
}

/// Accepts an admin's resolution request: flips the ticket to IN_REVIEW and
/// returns the job for the background executor. The heavy work happens
/// later, in [`run_resolution`].
///
/// # Errors
/// `NotFound` for an unknown ticket, `BadRequest` when the ticket is not
/// OPEN.
pub async fn request_resolution(
    db: &DatabaseConnection,
    ticket_id: i64,
    action: ResolutionAction,
) -> Result<ResolutionJob> {
    let ticket = require_ticket(db, ticket_id).await?;
    if ticket.status != TicketStatus::Open {
        return Err(Error::BadRequest(
            "this ticket is not open for resolution".to_string(),
        ));
    }

    let mut active: ticket::ActiveModel = ticket.into();
    active.status = Set(TicketStatus::InReview);
    active.updated_at = Set(Utc::now());
    active.update(db).await?;

    info!(ticket_id, ?action, "resolution requested");
    Ok(ResolutionJob { ticket_id, action })
}

/// Spawns the deferred resolution onto the runtime. Failures are logged;
/// [`run_resolution`] has already re-opened the ticket by the time they
/// surface here.
pub fn spawn_resolution<N>(
    db: DatabaseConnection,
    cipher: CredentialCipher,
    notifier: N,
    job: ResolutionJob,
) -> tokio::task::JoinHandle<()>
where
    N: Notifier + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = run_resolution(&db, &cipher, &notifier, job).await {
            error!(ticket_id = job.ticket_id, error = %e, "ticket resolution failed");
        }
    })
}

/// Executes one resolution job in a fresh transaction.
///
/// Re-validates that the ticket is still IN_REVIEW (a duplicate request or a
/// raced resolution makes this a no-op). On an internal failure every staged
/// mutation is rolled back and the ticket reverts to OPEN so it re-enters
/// the admin queue.
///
/// # Errors
/// Propagates the underlying failure after re-opening the ticket.
pub async fn run_resolution<N>(
    db: &DatabaseConnection,
    cipher: &CredentialCipher,
    notifier: &N,
    job: ResolutionJob,
) -> Result<()>
where
    N: Notifier,
{
    match execute_resolution(db, cipher, job).await {
        Ok(notification) => {
            if let Some(notification) = notification {
                crate::notify::dispatch(notifier, &notification).await;
            }
            Ok(())
        }
        Err(e) => {
            error!(ticket_id = job.ticket_id, error = %e, "resolution aborted, re-opening ticket");
            reopen_if_stuck(db, job.ticket_id).await;
            Err(e)
        }
    }
}

async fn execute_resolution(
    db: &DatabaseConnection,
    cipher: &CredentialCipher,
    job: ResolutionJob,
) -> Result<Option<Notification>> {
    let txn = db.begin().await?;

    let Some(ticket) = Ticket::find_by_id(job.ticket_id).one(&txn).await? else {
        warn!(ticket_id = job.ticket_id, "ticket vanished before resolution");
        return Ok(None);
    };
    if ticket.status != TicketStatus::InReview {
        warn!(
            ticket_id = ticket.id,
            status = ?ticket.status,
            "ticket is no longer in review, skipping"
        );
        return Ok(None);
    }

    let order = Order::find_by_id(ticket.order_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::Internal(format!("order {} missing for ticket", ticket.order_id)))?;
    let buyer = User::find_by_id(ticket.user_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::Internal(format!("user {} missing for ticket", ticket.user_id)))?;

    let notification = match job.action {
        ResolutionAction::RefundWallet => {
            ledger::credit(&txn, buyer.id, order.amount_paid).await?;
            close_ticket(
                &txn,
                ticket,
                TicketStatus::Resolved,
                TicketResolution::WalletRefunded,
            )
            .await?;
            info!(ticket_id = job.ticket_id, amount = %order.amount_paid, "wallet refunded");
            Some(Notification {
                telegram_id: buyer.telegram_id,
                body: format!(
                    "Your report was resolved: {:.2} was refunded to your wallet.",
                    order.amount_paid
                ),
            })
        }
        ResolutionAction::SwapAccount => {
            match stock::reserve_slot(&txn, order.product_id, ticket.stock_account_id).await {
                Ok(replacement) => {
                    let secret = cipher.decrypt(&replacement.secret_enc)?;

                    let mut updated: order::ActiveModel = order.into();
                    updated.stock_account_id = Set(Some(replacement.id));
                    updated.update(&txn).await?;

                    close_ticket(
                        &txn,
                        ticket,
                        TicketStatus::Resolved,
                        TicketResolution::AccountSwapped,
                    )
                    .await?;
                    info!(
                        ticket_id = job.ticket_id,
                        replacement_id = replacement.id,
                        "account hot-swapped"
                    );
                    Some(Notification {
                        telegram_id: buyer.telegram_id,
                        body: format!(
                            "Your report was resolved with a replacement account.\n\n\
                             Login: {}\nPassword: {secret}",
                            replacement.login
                        ),
                    })
                }
                Err(Error::OutOfStock) => {
                    // No replacement available: back to OPEN so the ticket
                    // re-enters the admin queue instead of being lost.
                    warn!(
                        ticket_id = job.ticket_id,
                        "no replacement stock, re-queueing ticket"
                    );
                    close_ticket(&txn, ticket, TicketStatus::Open, TicketResolution::None)
                        .await?;
                    None
                }
                Err(e) => return Err(e),
            }
        }
        ResolutionAction::CloseManually => {
            // The flagged account stays flagged until an admin clears it.
            close_ticket(&txn, ticket, TicketStatus::Closed, TicketResolution::Manual).await?;
            info!(ticket_id = job.ticket_id, "ticket closed manually");
            None
        }
    };

    txn.commit().await?;
    Ok(notification)
}

async fn close_ticket<C>(
    conn: &C,
    ticket: ticket::Model,
    status: TicketStatus,
    resolution: TicketResolution,
) -> Result<ticket::Model>
where
    C: ConnectionTrait,
{
    let mut active: ticket::ActiveModel = ticket.into();
    active.status = Set(status);
    active.resolution = Set(resolution);
    active.updated_at = Set(Utc::now());
    active.update(conn).await.map_err(Into::into)
}

/// Best-effort revert of a ticket stuck IN_REVIEW after a failed resolution.
async fn reopen_if_stuck(db: &DatabaseConnection, ticket_id: i64) {
    let result = async {
        if let Some(ticket) = Ticket::find_by_id(ticket_id).one(db).await? {
            if ticket.status == TicketStatus::InReview {
                close_ticket(db, ticket, TicketStatus::Open, TicketResolution::None).await?;
                info!(ticket_id, "ticket re-opened after failed resolution");
            }
        }
        Ok::<(), Error>(())
    }
    .await;

    if let Err(e) = result {
        error!(ticket_id, error = %e, "failed to re-open ticket");
    }
}

/// Lists tickets for the admin queue, newest first, optionally filtered by
/// status.
///
/// # Errors
/// Returns a database error when the query fails.
pub async fn list_tickets<C>(
    conn: &C,
    status: Option<TicketStatus>,
) -> Result<Vec<ticket::Model>>
where
    C: ConnectionTrait,
{
    let mut query = Ticket::find().order_by_desc(ticket::Column::CreatedAt);
    if let Some(status) = status {
        query = query.filter(ticket::Column::Status.eq(status));
    }
    query.all(conn).await.map_err(Into::into)
}

async fn require_ticket<C>(conn: &C, ticket_id: i64) -> Result<ticket::Model>
where
    C: ConnectionTrait,
{
    Ticket::find_by_id(ticket_id)
        .one(conn)
        .await?
        .ok_or(Error::NotFound { entity: "ticket" })
}
