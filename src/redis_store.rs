//! Redis Document Store
//!
//! [`DocumentStore`] backed by Redis. Documents are JSON strings under
//! `collection:id` keys. Create-only inserts map to `SET NX`; the versioned
//! compare-and-swap runs as a Lua script so the version check and the write
//! are atomic on the server.

use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Script};
use serde_json::Value;
use std::sync::LazyLock;

use async_trait::async_trait;

use crate::store::{DocumentStore, StoreError};

/// Compares the stored document's embedded version against ARGV[1] and writes
/// ARGV[2] only on a match. Expected version 0 doubles as create-if-absent.
static CAS_SCRIPT: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r#"
        local current = redis.call('GET', KEYS[1])
        local expected = tonumber(ARGV[1])
        if current then
            local ok, doc = pcall(cjson.decode, current)
            local version = 0
            if ok and type(doc) == 'table' and type(doc['_version']) == 'number' then
                version = doc['_version']
            end
            if version ~= expected then
                return 0
            end
        elseif expected ~= 0 then
            return 0
        end
        redis.call('SET', KEYS[1], ARGV[2])
        return 1
        "#,
    )
});

/// Document store over one multiplexed Redis connection. The connection is
/// cheap to clone; each call clones it so `&self` methods stay shareable.
#[derive(Clone)]
pub struct RedisStore {
    connection: MultiplexedConnection,
}

impl RedisStore {
    pub fn new(connection: MultiplexedConnection) -> Self {
        Self { connection }
    }

    /// Connect to a Redis URL and wrap the connection.
    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url).map_err(backend)?;
        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(backend)?;
        Ok(Self::new(connection))
    }

    fn key(collection: &str, id: &str) -> String {
        format!("{}:{}", collection, id)
    }
}

fn backend(err: redis::RedisError) -> StoreError {
    StoreError::Backend(err.to_string())
}

#[async_trait]
impl DocumentStore for RedisStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        let mut conn = self.connection.clone();
        let raw: Option<String> = conn.get(Self::key(collection, id)).await.map_err(backend)?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn insert(&self, collection: &str, id: &str, doc: Value) -> Result<bool, StoreError> {
        let mut conn = self.connection.clone();
        let json = serde_json::to_string(&doc)?;
        let created: bool = conn
            .set_nx(Self::key(collection, id), json)
            .await
            .map_err(backend)?;
        Ok(created)
    }

    async fn compare_and_put(
        &self,
        collection: &str,
        id: &str,
        expected_version: u64,
        doc: Value,
    ) -> Result<bool, StoreError> {
        let mut conn = self.connection.clone();
        let json = serde_json::to_string(&doc)?;
        let written: i64 = CAS_SCRIPT
            .key(Self::key(collection, id))
            .arg(expected_version)
            .arg(json)
            .invoke_async(&mut conn)
            .await
            .map_err(backend)?;
        Ok(written == 1)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        let mut conn = self.connection.clone();
        let removed: i64 = conn.del(Self::key(collection, id)).await.map_err(backend)?;
        Ok(removed > 0)
    }
}
