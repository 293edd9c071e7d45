/// Mediatheque - self-hosted media asset service

use mediatheque::{config::ServerConfig, context::AppContext, error::MediaResult, jobs, server};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> MediaResult<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mediatheque=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    print_banner();

    // Load configuration
    let config = ServerConfig::from_env()?;

    // Create application context
    let ctx = Arc::new(AppContext::new(config).await?);

    // Start background jobs
    let scheduler = Arc::new(jobs::JobScheduler::new(Arc::clone(&ctx)));
    scheduler.start();

    // Start server
    server::serve((*ctx).clone()).await?;

    Ok(())
}

fn print_banner() {
    println!(
        r#"
   __  ___        ___       __  __
  /  |/  /__ ___/ (_)___ _/ /_/ /  ___ ___ ___ _____
 / /|_/ / -_) _  / / _ `/ __/ _ \/ -_) _ `/ // / -_)
/_/  /_/\__/\_,_/_/\_,_/\__/_//_/\__/\_, /\_,_/\__/
                                      /_/
        Media Asset Service v{}
        "#,
        env!("CARGO_PKG_VERSION")
    );
}
