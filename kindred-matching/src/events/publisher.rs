use chrono::{DateTime, Utc};
use uuid::Uuid;

use kindred_shared::clients::rabbitmq::{PublishError, RabbitMQClient};
use kindred_shared::types::event::{payloads, routing_keys, Event};

use crate::matching::pair::PairKey;

const SOURCE: &str = "kindred-matching";

pub async fn publish_match_created(
    rabbitmq: &RabbitMQClient,
    key: &PairKey,
    profile_a: Uuid,
    profile_b: Uuid,
    matched_at: DateTime<Utc>,
) -> Result<(), PublishError> {
    let event = Event::new(
        SOURCE,
        routing_keys::MATCHING_MATCH_CREATED,
        payloads::MatchCreated {
            pair_key: key.to_string(),
            profile_a,
            profile_b,
            matched_at,
        },
    );

    rabbitmq
        .publish(routing_keys::MATCHING_MATCH_CREATED, &event)
        .await
}

pub async fn publish_match_ended(
    rabbitmq: &RabbitMQClient,
    key: &PairKey,
    profile_a: Uuid,
    profile_b: Uuid,
    unmatched_by: Uuid,
    unmatched_at: DateTime<Utc>,
) -> Result<(), PublishError> {
    let event = Event::new(
        SOURCE,
        routing_keys::MATCHING_MATCH_ENDED,
        payloads::MatchEnded {
            pair_key: key.to_string(),
            profile_a,
            profile_b,
            unmatched_by,
            unmatched_at,
        },
    )
    .with_user(unmatched_by);

    rabbitmq
        .publish(routing_keys::MATCHING_MATCH_ENDED, &event)
        .await
}
