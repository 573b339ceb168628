use anyhow::{Context, Result};
use redis::AsyncCommands;

use crate::core::redis::RedisHandle;
use crate::schemas::quiz::CreateQuizRequest;
use crate::services::quiz_codes;

const DRAFT_KEY_PREFIX: &str = "quiz-draft";

fn draft_key(token: &str) -> String {
    format!("{}:{}", DRAFT_KEY_PREFIX, quiz_codes::hash_draft_token(token))
}

/// Stages a quiz payload under a server-issued token so authoring can span
/// requests without sticky sessions. Returns the raw token handed to the
/// author.
pub(crate) async fn stage(
    redis: &RedisHandle,
    payload: &CreateQuizRequest,
    ttl_seconds: u64,
) -> Result<String> {
    let mut manager =
        redis.manager().await.context("Draft staging requires a redis connection")?;

    let token = quiz_codes::generate_draft_token();
    let serialized = serde_json::to_string(payload).context("Failed to serialize quiz draft")?;

    manager
        .set_ex::<_, _, ()>(draft_key(&token), serialized, ttl_seconds)
        .await
        .context("Failed to store quiz draft")?;

    Ok(token)
}

pub(crate) async fn fetch(
    redis: &RedisHandle,
    token: &str,
) -> Result<Option<CreateQuizRequest>> {
    let mut manager =
        redis.manager().await.context("Draft staging requires a redis connection")?;

    let raw: Option<String> =
        manager.get(draft_key(token)).await.context("Failed to read quiz draft")?;

    match raw {
        Some(serialized) => {
            let payload = serde_json::from_str(&serialized)
                .context("Failed to deserialize quiz draft")?;
            Ok(Some(payload))
        }
        None => Ok(None),
    }
}

pub(crate) async fn discard(redis: &RedisHandle, token: &str) -> Result<()> {
    let mut manager =
        redis.manager().await.context("Draft staging requires a redis connection")?;

    manager.del::<_, ()>(draft_key(token)).await.context("Failed to discard quiz draft")?;

    Ok(())
}
