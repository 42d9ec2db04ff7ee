//! Integration tests for the infrastructure components
//!
//! These tests verify that the PostgreSQL database is properly configured and
//! reachable. They need a live server, so they only run with `--ignored`.

use common::{
    database::{DatabaseConfig, health_check, init_pool},
    keepalive::start_keepalive,
};
use sqlx::Row;

#[tokio::test]
#[ignore = "requires a running PostgreSQL instance"]
async fn test_database_round_trip() -> Result<(), Box<dyn std::error::Error>> {
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;

    assert!(health_check(&pool).await?, "Database health check failed");

    let row = sqlx::query("SELECT 1 as result").fetch_one(&pool).await?;
    let result: i32 = row.get("result");
    assert_eq!(result, 1, "PostgreSQL simple query test failed");

    Ok(())
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL instance"]
async fn test_keepalive_scheduler_starts() -> Result<(), Box<dyn std::error::Error>> {
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;

    let mut scheduler = start_keepalive(pool, "*/1 * * * * *").await?;
    tokio::time::sleep(std::time::Duration::from_millis(1500)).await;
    scheduler.shutdown().await?;

    Ok(())
}
