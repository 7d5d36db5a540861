//! Cleanup service for evicting finished jobs from the store.

use std::time::Duration;

use chrono::Utc;
use tokio::time::interval;
use tracing::{debug, error, info};

use crate::db::JobStore;
use crate::error::AppResult;

/// Configuration for the cleanup service.
#[derive(Debug, Clone, Copy)]
pub struct CleanupConfig {
    /// How long completed and failed jobs are kept, in hours
    pub retention_hours: u64,
    /// How often to run cleanup (in seconds)
    pub interval_secs: u64,
}

/// Start the cleanup background task.
///
/// Periodically removes completed and failed jobs that have not changed
/// within the retention period. Running jobs are left alone.
pub fn start_cleanup_task(store: JobStore, config: CleanupConfig) {
    tokio::spawn(async move {
        info!(
            "Starting cleanup service (retention: {} hours, interval: {} seconds)",
            config.retention_hours, config.interval_secs
        );

        let mut ticker = interval(Duration::from_secs(config.interval_secs.max(1)));

        loop {
            ticker.tick().await;

            if let Err(e) = run_cleanup(&store, &config).await {
                error!("Cleanup task error: {}", e);
            }
        }
    });
}

/// Run a single cleanup cycle. Returns the number of evicted jobs.
pub async fn run_cleanup(store: &JobStore, config: &CleanupConfig) -> AppResult<usize> {
    let cutoff = Utc::now() - chrono::Duration::hours(config.retention_hours as i64);
    let removed = store.delete_finished_before(cutoff).await?;

    if removed > 0 {
        info!("Evicted {} finished jobs older than {}", removed, cutoff);
    } else {
        debug!("No finished jobs to evict");
    }
    Ok(removed)
}
