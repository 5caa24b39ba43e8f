//! Database connection and table creation using `SeaORM`.
//!
//! Tables are generated from the entity definitions with
//! `Schema::create_table_from_entity`, so the schema always matches the Rust
//! structs without hand-written SQL.

use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema};

use crate::entities::{
    BalanceAdjustment, Configuration, GiftCard, Order, PooledAccount, PooledInvite, Product,
    StockAccount, Ticket, TopUp, User,
};
use crate::errors::Result;

/// Establishes a connection to the database.
///
/// # Errors
/// Returns a database error when the connection cannot be established.
pub async fn create_connection(database_url: &str) -> Result<DatabaseConnection> {
    Database::connect(database_url).await.map_err(Into::into)
}

/// Creates all tables from the entity definitions.
///
/// # Errors
/// Returns a database error when a table statement fails.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    db.execute(builder.build(&schema.create_table_from_entity(User)))
        .await?;
    db.execute(builder.build(&schema.create_table_from_entity(Product)))
        .await?;
    db.execute(builder.build(&schema.create_table_from_entity(StockAccount)))
        .await?;
    db.execute(builder.build(&schema.create_table_from_entity(PooledAccount)))
        .await?;
    db.execute(builder.build(&schema.create_table_from_entity(PooledInvite)))
        .await?;
    db.execute(builder.build(&schema.create_table_from_entity(Order)))
        .await?;
    db.execute(builder.build(&schema.create_table_from_entity(Ticket)))
        .await?;
    db.execute(builder.build(&schema.create_table_from_entity(TopUp)))
        .await?;
    db.execute(builder.build(&schema.create_table_from_entity(BalanceAdjustment)))
        .await?;
    db.execute(builder.build(&schema.create_table_from_entity(GiftCard)))
        .await?;
    db.execute(builder.build(&schema.create_table_from_entity(Configuration)))
        .await?;

    Ok(())
}
