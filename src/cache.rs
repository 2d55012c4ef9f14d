use crate::redis_client::RedisClient;
use redis::AsyncCommands;
use tracing::debug;

/// Redis-backed cache for occupancy snapshots. The inventory registry is
/// the source of truth; the cache only saves the serialize-per-request
/// cost on the hot seat-map read, and every mutation deletes the key.
#[derive(Clone)]
pub struct CacheService {
    redis: RedisClient,
    ttl_seconds: u64,
}

impl CacheService {
    pub fn new(redis: RedisClient, ttl_seconds: u64) -> Self {
        Self { redis, ttl_seconds }
    }

    fn key(event_id: i64) -> String {
        format!("occupancy:{}", event_id)
    }

    pub async fn get_occupancy(&self, event_id: i64) -> Option<String> {
        let mut conn = self.redis.conn.clone();
        conn.get(Self::key(event_id)).await.unwrap_or(None)
    }

    pub async fn cache_occupancy(&self, event_id: i64, json: &str) {
        let mut conn = self.redis.conn.clone();
        // Redis being down only costs us the cache, never correctness.
        let res: Result<(), _> = conn.set_ex(Self::key(event_id), json, self.ttl_seconds).await;
        if let Err(e) = res {
            debug!("failed to cache occupancy for event {}: {:?}", event_id, e);
        }
    }

    pub async fn invalidate_occupancy(&self, event_id: i64) {
        let mut conn = self.redis.conn.clone();
        let res: Result<(), _> = conn.del(Self::key(event_id)).await;
        if let Err(e) = res {
            debug!("failed to invalidate occupancy for event {}: {:?}", event_id, e);
        } else {
            debug!("Invalidated occupancy cache for event {}", event_id);
        }
    }
}
