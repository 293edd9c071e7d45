use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{error, info};

pub mod tasks;

/// Job scheduler for background tasks
pub struct JobScheduler {
    context: Arc<crate::context::AppContext>,
}

impl JobScheduler {
    pub fn new(context: Arc<crate::context::AppContext>) -> Self {
        Self { context }
    }

    /// Start all background jobs
    pub fn start(self: Arc<Self>) {
        info!("Starting background job scheduler");

        tokio::spawn(Self::garbage_collection_job(Arc::clone(&self)));
        tokio::spawn(Self::health_check_job(Arc::clone(&self)));

        info!("Background jobs started");
    }

    /// Sweep orphaned blobs (runs daily)
    async fn garbage_collection_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(86400)); // Every 24 hours

        loop {
            interval.tick().await;
            info!("Running blob garbage collection");

            match tasks::collect_garbage(&scheduler.context).await {
                Ok(summary) => {
                    if summary.swept > 0 {
                        info!(
                            "Garbage collection: swept {} blobs ({} live)",
                            summary.swept, summary.live
                        );
                    } else {
                        info!("Garbage collection: nothing to sweep");
                    }
                }
                Err(e) => error!("Garbage collection failed: {}", e),
            }
        }
    }

    /// Health check job (runs every 5 minutes)
    async fn health_check_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(300)); // Every 5 minutes

        loop {
            interval.tick().await;

            match tasks::health_check(&scheduler.context).await {
                Ok(_) => {
                    // Silent success - health is good
                }
                Err(e) => error!("Health check failed: {}", e),
            }
        }
    }
}
