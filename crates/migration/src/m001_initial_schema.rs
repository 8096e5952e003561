use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m001_initial_schema"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.get_connection().execute_unprepared(UP_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(DOWN_SQL)
            .await?;
        Ok(())
    }
}

const UP_SQL: &str = "
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY NOT NULL,
    username TEXT NOT NULL UNIQUE,
    email TEXT NOT NULL,
    password_hash TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS alert_rules (
    id TEXT PRIMARY KEY NOT NULL,
    user_id TEXT NOT NULL,
    city TEXT NOT NULL,
    place_code TEXT NOT NULL,
    condition TEXT NOT NULL,
    threshold_c REAL NOT NULL,
    active INTEGER NOT NULL DEFAULT 1,
    digest_enabled INTEGER NOT NULL DEFAULT 0,
    digest_send_hour_local INTEGER,
    quiet_hours_start INTEGER,
    quiet_hours_end INTEGER,
    last_triggered_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_alert_rules_user_id ON alert_rules(user_id);
CREATE INDEX IF NOT EXISTS idx_alert_rules_active ON alert_rules(active);

CREATE TABLE IF NOT EXISTS alert_deliveries (
    id TEXT PRIMARY KEY NOT NULL,
    rule_id TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    attempted_at TEXT NOT NULL,
    error_message TEXT,
    payload TEXT,
    digest_batch_date TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_alert_deliveries_rule_id ON alert_deliveries(rule_id);
CREATE INDEX IF NOT EXISTS idx_alert_deliveries_status ON alert_deliveries(status);
CREATE INDEX IF NOT EXISTS idx_alert_deliveries_digest_batch_date ON alert_deliveries(digest_batch_date);
CREATE INDEX IF NOT EXISTS idx_alert_deliveries_attempted_at ON alert_deliveries(attempted_at DESC);
";

const DOWN_SQL: &str = "
DROP TABLE IF EXISTS alert_deliveries;
DROP TABLE IF EXISTS alert_rules;
DROP TABLE IF EXISTS users;
";
