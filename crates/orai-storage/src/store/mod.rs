use anyhow::Result;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection};

pub mod delivery;
pub mod rule;
pub mod user;

/// Unified access layer for the alert database.
///
/// All methods are `async fn` on top of SeaORM + SQLite. The REST layer and
/// the background scheduler share one instance.
pub struct AlertStore {
    pub(crate) db: DatabaseConnection,
}

impl AlertStore {
    /// Connect and initialize the database.
    ///
    /// `db_url` is a full connection URL, e.g. `sqlite://data/orai.db?mode=rwc`
    /// or `sqlite::memory:` in tests. Pending `sea-orm-migration` migrations
    /// are applied on connect.
    pub async fn new(db_url: &str) -> Result<Self> {
        let db = Database::connect(db_url).await?;

        // WAL mode only applies to file-backed SQLite
        if db_url.starts_with("sqlite://") {
            db.execute_unprepared("PRAGMA journal_mode=WAL;").await?;
        }

        Migrator::up(&db, None).await?;

        tracing::info!(db_url = %db_url, "Initialized alert store (SeaORM)");

        Ok(Self { db })
    }

    pub(crate) fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}
