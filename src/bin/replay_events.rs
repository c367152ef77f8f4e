// Re-dispatch webhook events that were logged but never processed.
// Usage: cargo run --bin replay_events -- [--event-type user.created] [--limit 50] [--dry-run]

use std::sync::Arc;

use clap::Parser;

use user_sync_api::config::DEFAULT_DATABASE_URL;
use user_sync_api::database::{self, PgSyncStore};
use user_sync_api::services::{replay_unprocessed, EventDispatcher, ReplayOptions};

#[derive(Parser, Debug)]
#[command(about = "Replay unprocessed webhook events from the audit ledger")]
struct Args {
    /// Only replay events of this type (e.g. user.created)
    #[arg(long)]
    event_type: Option<String>,

    /// Maximum number of events to replay, oldest first
    #[arg(long, default_value_t = 100)]
    limit: i64,

    /// List the events that would be replayed without applying them
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "user_sync_api=info,replay_events=info".into()),
        )
        .init();

    // The webhook secret is not needed here, so only the database URL is read.
    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());

    let pool = database::new_pool(&database_url).await?;
    let store = Arc::new(PgSyncStore::new(pool));
    let dispatcher = EventDispatcher::new(store.clone());

    let options = ReplayOptions {
        limit: args.limit,
        event_type: args.event_type,
        dry_run: args.dry_run,
    };
    let summary = replay_unprocessed(store.as_ref(), &dispatcher, &options).await?;

    println!(
        "Examined {} event(s): {} replayed, {} failed{}",
        summary.examined,
        summary.succeeded,
        summary.failed,
        if options.dry_run { " (dry run)" } else { "" }
    );

    Ok(())
}
