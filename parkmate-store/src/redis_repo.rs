use async_trait::async_trait;
use parkmate_core::{CoreError, CoreResult, KeyValueStore};
use redis::AsyncCommands;
use tracing::debug;

const KEY_PREFIX: &str = "parkmate";

/// Redis-backed [`KeyValueStore`]. Keys are namespaced under `parkmate:`.
#[derive(Clone)]
pub struct RedisStore {
    client: redis::Client,
}

impl RedisStore {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    fn namespaced(key: &str) -> String {
        format!("{}:{}", KEY_PREFIX, key)
    }
}

fn storage_error(err: redis::RedisError) -> CoreError {
    CoreError::StorageError(err.to_string())
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> CoreResult<Option<String>> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(storage_error)?;
        conn.get(Self::namespaced(key)).await.map_err(storage_error)
    }

    async fn set(&self, key: &str, value: &str) -> CoreResult<()> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(storage_error)?;
        conn.set::<_, _, ()>(Self::namespaced(key), value)
            .await
            .map_err(storage_error)?;
        debug!("Stored {} ({} bytes)", key, value.len());
        Ok(())
    }

    async fn remove(&self, key: &str) -> CoreResult<()> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(storage_error)?;
        conn.del::<_, ()>(Self::namespaced(key))
            .await
            .map_err(storage_error)
    }
}
