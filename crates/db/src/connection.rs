use std::time::Duration;

use puddle_core::config::DatabaseConfig;
use sqlx::sqlite::SqlitePoolOptions;

pub type DbPool = sqlx::SqlitePool;

pub async fn connect(database_url: &str) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(database_url, 5, 30).await
}

pub async fn connect_from_config(config: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(&config.url, config.max_connections, config.timeout_secs).await
}

/// Opens a pool with foreign keys, WAL journaling and a busy timeout on every connection.
///
/// File URLs get `mode=rwc` appended so a fresh deployment creates its database on first start.
pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(Duration::from_secs(timeout_secs.max(1)))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *conn).await?;
                sqlx::query("PRAGMA journal_mode = WAL").execute(&mut *conn).await?;
                sqlx::query("PRAGMA busy_timeout = 5000").execute(&mut *conn).await?;
                Ok(())
            })
        })
        .connect(&with_create_mode(database_url))
        .await
}

/// Round-trips a trivial query; used by readiness checks.
pub async fn ping(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await.map(|_| ())
}

fn with_create_mode(database_url: &str) -> String {
    let is_file = database_url.starts_with("sqlite://") && !database_url.contains(":memory:");
    if is_file && !database_url.contains("mode=") {
        let joiner = if database_url.contains('?') { '&' } else { '?' };
        format!("{database_url}{joiner}mode=rwc")
    } else {
        database_url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::{connect_with_settings, ping, with_create_mode};

    #[test]
    fn file_urls_gain_create_mode() {
        assert_eq!(with_create_mode("sqlite://puddle.db"), "sqlite://puddle.db?mode=rwc");
        assert_eq!(
            with_create_mode("sqlite://puddle.db?cache=shared"),
            "sqlite://puddle.db?cache=shared&mode=rwc"
        );
        assert_eq!(with_create_mode("sqlite://puddle.db?mode=ro"), "sqlite://puddle.db?mode=ro");
        assert_eq!(with_create_mode("sqlite::memory:"), "sqlite::memory:");
    }

    #[tokio::test]
    async fn in_memory_pool_answers_ping_with_foreign_keys_on() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        ping(&pool).await.expect("ping");

        let enabled: i64 =
            sqlx::query_scalar("PRAGMA foreign_keys").fetch_one(&pool).await.expect("pragma");
        assert_eq!(enabled, 1);
    }
}
