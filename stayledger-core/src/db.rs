use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Create the shared Postgres connection pool.
///
/// Every unit of work (booking persistence, a ledger-sync run, a status
/// transition) checks one connection out of this pool; multi-statement
/// writes run inside a transaction on that connection.
pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;
    Ok(pool)
}
