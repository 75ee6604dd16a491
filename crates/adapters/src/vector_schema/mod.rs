//! Vector table management backends.

#[cfg(feature = "store-postgres")]
mod postgres;
mod sqlite;

#[cfg(feature = "store-postgres")]
pub use postgres::PostgresVectorSchema;
pub use sqlite::SqliteVectorSchema;
