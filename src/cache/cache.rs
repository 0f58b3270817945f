use std::future::Future;

use redis::{aio::MultiplexedConnection, AsyncCommands, FromRedisValue, ToRedisArgs};
use redis_macros::{FromRedisValue, ToRedisArgs};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::database::error::CacheError;
use crate::error::Error;

/// Keys for the catalog data that only changes through the
/// administrative import commands.
#[derive(Clone, Copy, Debug)]
pub enum CacheKey {
    Tags,
    IngredientCatalog,
}

impl CacheKey {
    pub fn to_key(self) -> &'static str {
        match self {
            CacheKey::Tags => "tags",
            CacheKey::IngredientCatalog => "ingredient-catalog",
        }
    }
}

#[derive(Serialize, Deserialize, FromRedisValue, ToRedisArgs, Clone)]
pub struct CachedList<T: Serialize + Send + Sync + Clone> {
    pub value: Vec<T>,
}

/// Read-through list cache: serve the cached copy when present,
/// otherwise fall back to `callback` and store its result. Cache
/// failures degrade to the database, never to an error response.
pub async fn cached_list<T, F, Fut>(
    key: CacheKey,
    cache: &mut MultiplexedConnection,
    callback: F,
) -> Result<Vec<T>, Error>
where
    T: Serialize + DeserializeOwned + Send + Sync + Clone,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Vec<T>, Error>>,
{
    match get_cache_value::<&str, CachedList<T>>(key.to_key(), cache).await {
        Ok(Some(hit)) => {
            log::trace!("> Found {}", key.to_key());
            return Ok(hit.value);
        }
        Ok(None) => {}
        Err(e) => {
            log::warn!("> Cache read failed for {}: {e}", key.to_key());
        }
    }

    log::trace!("> Fetching {}", key.to_key());
    let value = callback().await?;

    let entry = CachedList {
        value: value.clone(),
    };
    if let Err(e) = set_cache_value(key.to_key(), entry, cache).await {
        log::warn!("> Cache write failed for {}: {e}", key.to_key());
    }

    Ok(value)
}

pub async fn invalidate(key: CacheKey, cache: &mut MultiplexedConnection) -> Result<(), Error> {
    delete_cache_value(key.to_key(), cache).await
}

// Cache - raw handlers

pub async fn set_cache_value<K: ToRedisArgs + Send + Sync, V: ToRedisArgs + Send + Sync>(
    key: K,
    value: V,
    cache: &mut MultiplexedConnection,
) -> Result<(), Error> {
    let _: () = cache
        .set(key, value)
        .await
        .map_err(|e| CacheError::from(e).into())?;

    Ok(())
}

pub async fn delete_cache_value<K: ToRedisArgs + Send + Sync>(
    key: K,
    cache: &mut MultiplexedConnection,
) -> Result<(), Error> {
    let _: () = cache
        .del(key)
        .await
        .map_err(|e| CacheError::from(e).into())?;

    Ok(())
}

pub async fn get_cache_value<K: ToRedisArgs + Send + Sync, V: FromRedisValue>(
    key: K,
    cache: &mut MultiplexedConnection,
) -> Result<Option<V>, Error> {
    let value: Option<V> = cache
        .get(key)
        .await
        .map_err(|e| CacheError::from(e).into())?;

    Ok(value)
}
