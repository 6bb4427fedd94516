//! Redis caching layer for Domus
//!
//! [`RedisCache`] implements the generic `CacheService` from domus-core over
//! a multiplexed connection. [`CachedRateMemo`] builds the exchange rate
//! memo on top of any `CacheService`, which lets several back-office
//! instances fall back to the same last known rate.
//!
//! # Example
//!
//! ```no_run
//! use domus_cache::{RedisCache, RedisRateMemo};
//! use domus_core::traits::RateMemo;
//! use domus_core::models::RateSource;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cache = RedisCache::new("redis://127.0.0.1:6379").await?;
//!     let memo = RedisRateMemo::new(cache);
//!
//!     let last = memo.get(RateSource::Bnr).await?;
//!     println!("last known BNR rate: {:?}", last);
//!     Ok(())
//! }
//! ```

pub mod keys;
pub mod memo;

use async_trait::async_trait;
use domus_core::error::AppError;
use domus_core::traits::CacheService;
use redis::{aio::ConnectionManager, AsyncCommands, Client, RedisError};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error, warn};

pub use memo::{CachedRateMemo, RedisRateMemo};

/// Redis-backed `CacheService`
///
/// Cloning is cheap; clones share the same connection manager.
#[derive(Clone)]
pub struct RedisCache {
    manager: ConnectionManager,
}

impl RedisCache {
    /// Connect to Redis
    ///
    /// Returns `AppError::CacheConnection` when the URL is invalid or the
    /// server cannot be reached.
    pub async fn new(url: &str) -> Result<Self, AppError> {
        debug!("Connecting to Redis at {}", url);

        let client = Client::open(url).map_err(|e| {
            error!("Invalid Redis URL: {}", e);
            AppError::CacheConnection(format!("Invalid Redis URL: {}", e))
        })?;

        let manager = ConnectionManager::new(client).await.map_err(|e| {
            error!("Failed to establish Redis connection: {}", e);
            AppError::CacheConnection(format!("Connection failed: {}", e))
        })?;

        debug!("Redis connection established");
        Ok(Self { manager })
    }

    /// Round-trip a PING to check connectivity
    pub async fn ping(&self) -> Result<(), AppError> {
        let mut conn = self.manager.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(Self::map_redis_error)?;
        Ok(())
    }

    fn map_redis_error(err: RedisError) -> AppError {
        match err.kind() {
            redis::ErrorKind::IoError => {
                error!("Redis I/O error: {}", err);
                AppError::CacheConnection(format!("I/O error: {}", err))
            }
            redis::ErrorKind::TypeError => {
                warn!("Redis type error: {}", err);
                AppError::Cache(format!("Type mismatch: {}", err))
            }
            _ => {
                error!("Redis error: {}", err);
                AppError::Cache(err.to_string())
            }
        }
    }
}

#[async_trait]
impl CacheService for RedisCache {
    async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, AppError> {
        let mut conn = self.manager.clone();
        let raw: Option<String> = conn.get(key).await.map_err(Self::map_redis_error)?;

        let Some(json) = raw else {
            debug!("Cache MISS: {}", key);
            return Ok(None);
        };

        debug!("Cache HIT: {}", key);
        serde_json::from_str::<T>(&json).map(Some).map_err(|e| {
            error!("Failed to deserialize cached value {}: {}", key, e);
            AppError::Serialization(format!("Deserialization failed: {}", e))
        })
    }

    async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl_secs: u64,
    ) -> Result<(), AppError> {
        debug!("SET {} (TTL: {}s)", key, ttl_secs);

        let json = serde_json::to_string(value).map_err(|e| {
            error!("Failed to serialize value for {}: {}", key, e);
            AppError::Serialization(format!("Serialization failed: {}", e))
        })?;

        let mut conn = self.manager.clone();
        let _: () = conn
            .set_ex(key, json, ttl_secs)
            .await
            .map_err(Self::map_redis_error)?;
        Ok(())
    }
}
