use std::sync::Arc;
use std::time::Duration;
use futures_lite::StreamExt;
use lapin::options::{BasicAckOptions, BasicNackOptions};

use kindred_shared::types::event::{payloads, routing_keys, Event};

use crate::matching::MatchError;
use crate::AppState;

/// Pause before handing a failed purge back to the broker, so an outage does
/// not turn into a redelivery spin.
const REQUEUE_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, PartialEq, Eq)]
enum Settle {
    Ack,
    Requeue,
}

/// Only a transient failure is worth redelivering. Anything else would fail
/// the same way again.
fn settle_purge(result: &Result<u64, MatchError>) -> Settle {
    match result {
        Err(e) if e.is_retryable() => Settle::Requeue,
        _ => Settle::Ack,
    }
}

/// Listen for auth.user.deleted events and drop every relationship that
/// references the deleted profile.
pub async fn listen_user_deleted(state: Arc<AppState>) -> anyhow::Result<()> {
    let mut consumer = state
        .rabbitmq
        .subscribe(
            "kindred-matching.auth.user.deleted",
            &[routing_keys::AUTH_USER_DELETED],
        )
        .await?;

    tracing::info!("listening for auth.user.deleted events");

    while let Some(delivery) = consumer.next().await {
        let delivery = match delivery {
            Ok(delivery) => delivery,
            Err(e) => {
                tracing::error!(error = %e, "consumer error");
                continue;
            }
        };

        let settle = match serde_json::from_slice::<Event<payloads::UserDeleted>>(&delivery.data) {
            Ok(event) => {
                let profile_id = event.data.credential_id;
                let result = state.coordinator.purge_profile(profile_id).await;
                match &result {
                    Ok(purged) => {
                        tracing::info!(%profile_id, purged, "relationships purged for deleted user");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, %profile_id, retryable = e.is_retryable(), "failed to purge relationships");
                    }
                }
                settle_purge(&result)
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to deserialize user.deleted event");
                Settle::Ack
            }
        };

        let settled = match settle {
            Settle::Ack => delivery.ack(BasicAckOptions::default()).await,
            Settle::Requeue => {
                tokio::time::sleep(REQUEUE_DELAY).await;
                delivery
                    .nack(BasicNackOptions {
                        requeue: true,
                        ..Default::default()
                    })
                    .await
            }
        };
        if let Err(e) = settled {
            tracing::warn!(error = %e, "failed to settle user.deleted delivery");
        }
    }

    Ok(())
}
