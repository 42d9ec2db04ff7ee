//! Periodic keep-alive ping
//!
//! Hosted PostgreSQL providers evict idle connections; a scheduled `SELECT 1`
//! keeps at least one pooled connection warm.

use anyhow::Result;
use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, error, info};

/// Default keep-alive schedule: every 4 minutes
pub const DEFAULT_KEEPALIVE_SCHEDULE: &str = "0 */4 * * * *";

/// Start the keep-alive job on the given cron schedule
///
/// The returned scheduler owns the job; call `shutdown` on it to stop pinging.
pub async fn start_keepalive(pool: PgPool, schedule: &str) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let job = Job::new_async(schedule, move |_, _| {
        let pool = pool.clone();
        Box::pin(async move {
            match sqlx::query("SELECT 1").execute(&pool).await {
                Ok(_) => debug!("Database keep-alive ping"),
                Err(e) => error!("Database keep-alive failed: {}", e),
            }
        })
    })?;

    scheduler.add(job).await?;
    scheduler.start().await?;

    info!("Started database keep-alive with schedule: {}", schedule);
    Ok(scheduler)
}
