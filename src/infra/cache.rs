//! Redis cache: note listing pages and rate limit counters.

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client, RedisError};
use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

use crate::config::{
    Config, CACHE_PREFIX_NOTES, CACHE_PREFIX_NOTES_GENERATION, CACHE_PREFIX_RATE_LIMIT,
};
use crate::domain::{ExperimentNote, NoteOrdering};
use crate::errors::{AppError, AppResult};
use crate::types::{PageRequest, Paginated};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Read-through cache of owner-scoped note listings.
///
/// Pages are stored under the owner's current generation. Every write bumps
/// the generation, so a page computed before the write can never be served
/// after it, even when it lands in the cache late. Entries expire after a TTL.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait NoteCache: Send + Sync {
    /// Current listing generation of `owner_id`; read before the store.
    async fn generation(&self, owner_id: Uuid) -> AppResult<u64>;

    async fn get_page(
        &self,
        owner_id: Uuid,
        generation: u64,
        ordering: NoteOrdering,
        page: PageRequest,
    ) -> AppResult<Option<Paginated<ExperimentNote>>>;

    async fn put_page(
        &self,
        owner_id: Uuid,
        generation: u64,
        ordering: NoteOrdering,
        page: PageRequest,
        notes: &Paginated<ExperimentNote>,
    ) -> AppResult<()>;

    /// Start a new generation for `owner_id` and drop the old pages.
    async fn invalidate_owner(&self, owner_id: Uuid) -> AppResult<()>;
}

/// Fixed-window request counter.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Count a request against `identifier`; returns (count, is_allowed).
    async fn hit(
        &self,
        identifier: &str,
        max_requests: u64,
        window_seconds: u64,
    ) -> AppResult<(u64, bool)>;
}

/// Key of one cached listing page.
pub fn notes_page_key(
    owner_id: Uuid,
    generation: u64,
    ordering: NoteOrdering,
    page: PageRequest,
) -> String {
    format!(
        "{}{}:{}:{}:{}:{}",
        CACHE_PREFIX_NOTES,
        owner_id,
        generation,
        ordering.as_str(),
        page.page,
        page.per_page
    )
}

/// Pattern matching every cached page of one owner, across generations.
pub fn notes_owner_pattern(owner_id: Uuid) -> String {
    format!("{}{}:*", CACHE_PREFIX_NOTES, owner_id)
}

/// Counter holding the listing generation of one owner.
///
/// Lives outside the page namespace so pattern deletes never reset it.
pub fn notes_generation_key(owner_id: Uuid) -> String {
    format!("{}{}", CACHE_PREFIX_NOTES_GENERATION, owner_id)
}

/// Cache used when caching is switched off: always a miss.
pub struct NoCache;

#[async_trait]
impl NoteCache for NoCache {
    async fn generation(&self, _owner_id: Uuid) -> AppResult<u64> {
        Ok(0)
    }

    async fn get_page(
        &self,
        _owner_id: Uuid,
        _generation: u64,
        _ordering: NoteOrdering,
        _page: PageRequest,
    ) -> AppResult<Option<Paginated<ExperimentNote>>> {
        Ok(None)
    }

    async fn put_page(
        &self,
        _owner_id: Uuid,
        _generation: u64,
        _ordering: NoteOrdering,
        _page: PageRequest,
        _notes: &Paginated<ExperimentNote>,
    ) -> AppResult<()> {
        Ok(())
    }

    async fn invalidate_owner(&self, _owner_id: Uuid) -> AppResult<()> {
        Ok(())
    }
}

/// Redis cache wrapper over a multiplexed connection manager.
#[derive(Clone)]
pub struct Cache {
    connection: ConnectionManager,
    default_ttl: u64,
}

impl Cache {
    /// Connect to Redis using `REDIS_URL`.
    pub async fn connect(config: &Config) -> Result<Self, RedisError> {
        let client = Client::open(config.redis_url.as_str())?;
        let connection = ConnectionManager::new(client).await?;

        tracing::info!("Redis cache connected");

        Ok(Self {
            connection,
            default_ttl: config.cache_ttl_seconds,
        })
    }

    // =========================================================================
    // Generic Cache Operations
    // =========================================================================

    /// Get a JSON value from cache.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> AppResult<Option<T>> {
        let mut conn = self.connection.clone();
        let value: Option<String> = conn.get(key).await.map_err(cache_error)?;

        match value {
            Some(json) => {
                let parsed = serde_json::from_str(&json).map_err(|e| {
                    AppError::internal(format!("Cache deserialization error: {}", e))
                })?;
                Ok(Some(parsed))
            }
            None => Ok(None),
        }
    }

    /// Set a value with the configured TTL.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> AppResult<()> {
        let mut conn = self.connection.clone();
        let json = serde_json::to_string(value)
            .map_err(|e| AppError::internal(format!("Cache serialization error: {}", e)))?;

        conn.set_ex::<_, _, ()>(key, json, self.default_ttl)
            .await
            .map_err(cache_error)?;

        Ok(())
    }

    /// Check if a key exists in cache.
    pub async fn exists(&self, key: &str) -> AppResult<bool> {
        let mut conn = self.connection.clone();
        let exists: bool = conn.exists(key).await.map_err(cache_error)?;
        Ok(exists)
    }

    /// Delete all keys matching a glob pattern, returning how many matched.
    pub async fn delete_pattern(&self, pattern: &str) -> AppResult<u64> {
        let mut conn = self.connection.clone();
        let keys: Vec<String> = conn.keys(pattern).await.map_err(cache_error)?;

        if keys.is_empty() {
            return Ok(0);
        }

        let _: i64 = conn.del(&keys).await.map_err(cache_error)?;
        Ok(keys.len() as u64)
    }

    // =========================================================================
    // Rate Limiting Operations
    // =========================================================================

    /// Count a request against `identifier` in a fixed window.
    /// Returns (current_count, is_allowed) tuple.
    pub async fn check_rate_limit(
        &self,
        identifier: &str,
        max_requests: u64,
        window_seconds: u64,
    ) -> AppResult<(u64, bool)> {
        let key = format!("{}{}", CACHE_PREFIX_RATE_LIMIT, identifier);
        let mut conn = self.connection.clone();

        let count: i64 = conn.incr(&key, 1).await.map_err(cache_error)?;
        if count == 1 {
            // first hit opens the window
            let _: () = conn
                .expire(&key, window_seconds as i64)
                .await
                .map_err(cache_error)?;
        }

        let count = count.max(0) as u64;
        Ok((count, count <= max_requests))
    }
}

#[async_trait]
impl NoteCache for Cache {
    async fn generation(&self, owner_id: Uuid) -> AppResult<u64> {
        let mut conn = self.connection.clone();
        let generation: Option<u64> = conn
            .get(notes_generation_key(owner_id))
            .await
            .map_err(cache_error)?;
        Ok(generation.unwrap_or(0))
    }

    async fn get_page(
        &self,
        owner_id: Uuid,
        generation: u64,
        ordering: NoteOrdering,
        page: PageRequest,
    ) -> AppResult<Option<Paginated<ExperimentNote>>> {
        self.get(&notes_page_key(owner_id, generation, ordering, page))
            .await
    }

    async fn put_page(
        &self,
        owner_id: Uuid,
        generation: u64,
        ordering: NoteOrdering,
        page: PageRequest,
        notes: &Paginated<ExperimentNote>,
    ) -> AppResult<()> {
        self.set(&notes_page_key(owner_id, generation, ordering, page), notes)
            .await
    }

    async fn invalidate_owner(&self, owner_id: Uuid) -> AppResult<()> {
        let mut conn = self.connection.clone();
        let generation: u64 = conn
            .incr(notes_generation_key(owner_id), 1)
            .await
            .map_err(cache_error)?;

        // old generations are unreachable now; this only frees memory
        let removed = self.delete_pattern(&notes_owner_pattern(owner_id)).await?;
        tracing::debug!(owner = %owner_id, generation, removed, "Note listing cache invalidated");
        Ok(())
    }
}

#[async_trait]
impl RateLimiter for Cache {
    async fn hit(
        &self,
        identifier: &str,
        max_requests: u64,
        window_seconds: u64,
    ) -> AppResult<(u64, bool)> {
        self.check_rate_limit(identifier, max_requests, window_seconds)
            .await
    }
}

/// Process-local note cache with the same generation rules as Redis.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Default)]
pub struct MemoryNoteCache {
    state: std::sync::Mutex<MemoryNoteCacheState>,
}

#[cfg(any(test, feature = "test-utils"))]
#[derive(Default)]
struct MemoryNoteCacheState {
    generations: std::collections::HashMap<Uuid, u64>,
    pages: std::collections::HashMap<String, Paginated<ExperimentNote>>,
}

#[cfg(any(test, feature = "test-utils"))]
impl MemoryNoteCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> AppResult<std::sync::MutexGuard<'_, MemoryNoteCacheState>> {
        self.state
            .lock()
            .map_err(|_| AppError::internal("note cache lock poisoned"))
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl NoteCache for MemoryNoteCache {
    async fn generation(&self, owner_id: Uuid) -> AppResult<u64> {
        Ok(self.lock()?.generations.get(&owner_id).copied().unwrap_or(0))
    }

    async fn get_page(
        &self,
        owner_id: Uuid,
        generation: u64,
        ordering: NoteOrdering,
        page: PageRequest,
    ) -> AppResult<Option<Paginated<ExperimentNote>>> {
        let key = notes_page_key(owner_id, generation, ordering, page);
        Ok(self.lock()?.pages.get(&key).cloned())
    }

    async fn put_page(
        &self,
        owner_id: Uuid,
        generation: u64,
        ordering: NoteOrdering,
        page: PageRequest,
        notes: &Paginated<ExperimentNote>,
    ) -> AppResult<()> {
        let key = notes_page_key(owner_id, generation, ordering, page);
        self.lock()?.pages.insert(key, notes.clone());
        Ok(())
    }

    async fn invalidate_owner(&self, owner_id: Uuid) -> AppResult<()> {
        let mut state = self.lock()?;
        *state.generations.entry(owner_id).or_insert(0) += 1;
        let prefix = notes_owner_pattern(owner_id);
        let prefix = prefix.trim_end_matches('*');
        state.pages.retain(|key, _| !key.starts_with(prefix));
        Ok(())
    }
}

/// Convert Redis error to AppError.
fn cache_error(e: RedisError) -> AppError {
    tracing::error!("Redis error: {}", e);
    AppError::internal(format!("Cache error: {}", e))
}
