use sqlx::{PgPool, postgres::PgPoolOptions};

pub mod matches;
pub mod players;
pub mod snapshots;

/// Connects lazily so construction never blocks; the first query pays
/// the connection cost and surfaces configuration mistakes.
pub fn create_db_pool() -> PgPool {
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL env var not set");
    PgPoolOptions::new()
        .max_connections(5)
        .connect_lazy(&database_url)
        .expect("Failed to create DB pool")
}
