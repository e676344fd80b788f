//! Redis backend for the tiercache remote store.
//!
//! Wraps a single multiplexed async connection per instance. Any
//! transport-level error flips the store to disconnected for the rest of
//! the instance's lifetime; callers observe this via
//! [`RemoteStore::is_connected`].

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use serde_json::Value;
use tiercache_store::{RemoteStore, StoreError};

/// Number of keys requested per SCAN round-trip.
const SCAN_COUNT: usize = 100;

/// Redis-backed [`RemoteStore`].
pub struct RedisStore {
    conn: MultiplexedConnection,
    connected: bool,
}

impl RedisStore {
    /// Connects to Redis at `host:port`, bounded by `timeout`.
    ///
    /// A PING round-trip verifies the connection is actually usable before
    /// the store is handed out.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Connection` if the address is invalid, the
    /// connection cannot be established within `timeout`, or the PING fails.
    pub async fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self, StoreError> {
        let url = format!("redis://{host}:{port}");
        let client =
            redis::Client::open(url.as_str()).map_err(|e| StoreError::connection(e.to_string()))?;

        let mut conn = tokio::time::timeout(timeout, client.get_multiplexed_async_connection())
            .await
            .map_err(|_| StoreError::connection(format!("connect to {host}:{port} timed out")))?
            .map_err(|e| StoreError::connection(e.to_string()))?;

        let ping: Result<String, redis::RedisError> =
            redis::cmd("PING").query_async(&mut conn).await;
        ping.map_err(|e| StoreError::connection(e.to_string()))?;

        tracing::debug!(host = %host, port = %port, "connected to redis");
        Ok(Self {
            conn,
            connected: true,
        })
    }

    fn guard(&self) -> Result<(), StoreError> {
        if self.connected {
            Ok(())
        } else {
            Err(StoreError::Disconnected)
        }
    }

    /// Records a transport failure: one-way transition to disconnected.
    fn fail(&mut self, op: &str, err: &redis::RedisError) -> StoreError {
        self.connected = false;
        tracing::warn!(op = %op, error = %err, "redis command failed, disconnecting");
        StoreError::command(err.to_string())
    }
}

#[async_trait]
impl RemoteStore for RedisStore {
    async fn get(&mut self, key: &str) -> Result<Option<Value>, StoreError> {
        self.guard()?;
        let raw: Result<Option<String>, redis::RedisError> = self.conn.get(key).await;
        match raw {
            Ok(Some(text)) => Ok(decode_value(key, &text)),
            Ok(None) => Ok(None),
            Err(e) => Err(self.fail("GET", &e)),
        }
    }

    async fn set_with_ttl(
        &mut self,
        key: &str,
        value: &Value,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        self.guard()?;
        let text = serde_json::to_string(value)?;
        let secs = ttl_seconds(ttl);
        let res: Result<(), redis::RedisError> = if secs == 0 {
            self.conn.set(key, text).await
        } else {
            self.conn.set_ex(key, text, secs).await
        };
        res.map_err(|e| self.fail("SET", &e))
    }

    async fn delete(&mut self, key: &str) -> Result<(), StoreError> {
        self.guard()?;
        let res: Result<i64, redis::RedisError> = self.conn.del(key).await;
        match res {
            Ok(_) => Ok(()),
            Err(e) => Err(self.fail("DEL", &e)),
        }
    }

    async fn exists(&mut self, key: &str) -> Result<bool, StoreError> {
        self.guard()?;
        let res: Result<bool, redis::RedisError> = self.conn.exists(key).await;
        match res {
            Ok(found) => Ok(found),
            Err(e) => Err(self.fail("EXISTS", &e)),
        }
    }

    async fn incr_by(&mut self, key: &str, delta: i64) -> Result<(), StoreError> {
        self.guard()?;
        let res: Result<i64, redis::RedisError> = self.conn.incr(key, delta).await;
        match res {
            Ok(_) => Ok(()),
            Err(e) => Err(self.fail("INCRBY", &e)),
        }
    }

    async fn decr_by(&mut self, key: &str, delta: i64) -> Result<(), StoreError> {
        self.guard()?;
        let res: Result<i64, redis::RedisError> = self.conn.decr(key, delta).await;
        match res {
            Ok(_) => Ok(()),
            Err(e) => Err(self.fail("DECRBY", &e)),
        }
    }

    async fn scan_keys(&mut self, pattern: &str) -> Result<Vec<String>, StoreError> {
        self.guard()?;
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let res: Result<(u64, Vec<String>), redis::RedisError> = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT)
                .query_async(&mut self.conn)
                .await;
            let (next, batch) = match res {
                Ok(page) => page,
                Err(e) => return Err(self.fail("SCAN", &e)),
            };
            keys.extend(batch);
            cursor = next;
            if cursor == 0 {
                break;
            }
        }
        Ok(keys)
    }

    async fn close(&mut self) {
        // The multiplexed connection closes on drop; only the flag matters.
        self.connected = false;
        tracing::debug!("redis store closed");
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}

/// Rounds a TTL up to whole seconds, the granularity SETEX supports.
/// Sub-second TTLs become one second rather than an invalid `SETEX key 0`,
/// which Redis rejects as a command error.
fn ttl_seconds(ttl: Duration) -> u64 {
    let secs = ttl.as_secs();
    if ttl.subsec_nanos() > 0 { secs + 1 } else { secs }
}

/// Decodes a stored value. Text that is not valid JSON (e.g. written raw
/// by another client) is treated as absent rather than as a failure, so it
/// neither trips the disconnect nor blocks negative caching upstream.
fn decode_value(key: &str, text: &str) -> Option<Value> {
    match serde_json::from_str(text) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "undecodable stored value treated as absent");
            None
        }
    }
}
