//! Projector Worker
//!
//! Pops raw webhook deliveries off the Redis queue, runs each through the
//! dispatcher, and requeues deliveries whose store writes failed. Deliveries
//! that cannot even be parsed are logged and dropped; retrying those can never
//! succeed.

use std::sync::Arc;
use std::time::Duration;

use redis::AsyncCommands;
use tokio::time::sleep;
use tracing::{error, info, warn};

use launchpad_projector::{Dispatcher, ProjectorConfig, RawDelivery, RedisStore};

/// Blocking-pop timeout; the loop wakes periodically so shutdown signals and
/// connection errors surface promptly.
const POP_TIMEOUT_SECS: f64 = 5.0;

/// Pause before touching the queue again after a failure.
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = ProjectorConfig::from_env();
    info!(
        redis_url = %config.redis_url,
        queue = %config.delivery_queue,
        "starting projector worker"
    );

    let client = redis::Client::open(config.redis_url.as_str())?;
    let mut queue = client.get_multiplexed_async_connection().await?;
    let store = Arc::new(RedisStore::new(
        client.get_multiplexed_async_connection().await?,
    ));
    let dispatcher = Dispatcher::new(store, config.clone());

    loop {
        let popped: Option<(String, String)> = match queue
            .blpop(&config.delivery_queue, POP_TIMEOUT_SECS)
            .await
        {
            Ok(popped) => popped,
            Err(err) => {
                error!(%err, "queue pop failed");
                sleep(RETRY_BACKOFF).await;
                continue;
            }
        };

        let Some((_, payload)) = popped else {
            continue;
        };

        let delivery: RawDelivery = match serde_json::from_str(&payload) {
            Ok(delivery) => delivery,
            Err(err) => {
                error!(%err, "unparseable delivery dropped");
                continue;
            }
        };

        match dispatcher.process_delivery(&delivery).await {
            Ok(report) => {
                info!(
                    total = report.total_logs,
                    applied = report.applied,
                    skipped_unknown = report.skipped_unknown,
                    failed_decode = report.failed_decode,
                    "delivery processed"
                );
            }
            Err(err) if err.is_retryable() => {
                warn!(%err, "delivery failed, requeueing");
                if let Err(push_err) = queue
                    .rpush::<_, _, ()>(&config.delivery_queue, &payload)
                    .await
                {
                    error!(%push_err, "requeue failed, delivery lost");
                }
                sleep(RETRY_BACKOFF).await;
            }
            Err(err) => {
                error!(%err, "delivery failed");
            }
        }
    }
}
