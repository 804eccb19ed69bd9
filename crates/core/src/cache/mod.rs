//! Named cache generations holding request/response pairs.
//!
//! [`CacheStore`] is the storage boundary the worker depends on. Two
//! implementations ship with the crate:
//!
//! - [`CacheDb`]: persistent SQLite storage via tokio-rusqlite, with WAL
//!   mode and automatic schema migrations
//! - [`MemoryStore`]: process-local storage for tests and ephemeral hosts
//!
//! Both are safe to share across concurrently running requests. Two writes
//! to the same URL race and the last one wins.

pub mod connection;
pub mod entries;
pub mod hash;
pub mod memory;
pub mod migrations;

use std::sync::Arc;

pub use crate::Error;
use crate::http::{Request, Response};

pub use connection::CacheDb;
pub use memory::MemoryStore;

/// Options for matching a request against stored entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchOptions {
    /// Compare URLs without their query strings.
    pub ignore_search: bool,
}

impl MatchOptions {
    pub fn ignoring_search() -> Self {
        Self { ignore_search: true }
    }
}

/// Persistent storage for named cache generations.
///
/// Stored responses are snapshots: `put` receives a fully read response and
/// `match_request` returns an owned copy.
#[async_trait::async_trait]
pub trait CacheStore: Send + Sync {
    /// Create the named generation if it does not exist.
    async fn open(&self, name: &str) -> Result<(), Error>;

    /// Store a response for a GET request, replacing any entry with the same URL.
    ///
    /// Creates the generation if needed. Non-GET requests are rejected.
    async fn put(&self, name: &str, request: &Request, response: &Response) -> Result<(), Error>;

    /// Find the entry for a request in one generation.
    ///
    /// With `ignore_search` the first entry (in insertion order) whose URL
    /// without query equals the request's URL without query is returned.
    async fn match_request(&self, name: &str, request: &Request, opts: MatchOptions)
    -> Result<Option<Response>, Error>;

    /// Request URLs stored in a generation, in insertion order.
    async fn keys(&self, name: &str) -> Result<Vec<String>, Error>;

    /// Names of all generations, in creation order.
    async fn cache_names(&self) -> Result<Vec<String>, Error>;

    /// Delete a generation and all its entries. Returns whether it existed.
    async fn delete_cache(&self, name: &str) -> Result<bool, Error>;

    /// Record `name` as the generation serving clients, creating it if absent.
    ///
    /// At most one generation is active; marking one clears the others.
    async fn mark_active(&self, name: &str) -> Result<(), Error>;

    /// The generation last marked active, if it still exists.
    async fn active_cache(&self) -> Result<Option<String>, Error>;
}

/// A store bound to one generation name.
///
/// Construction does no I/O; the generation is created on the first `put`
/// or by [`CacheHandle::open`].
#[derive(Clone)]
pub struct CacheHandle {
    store: Arc<dyn CacheStore>,
    name: String,
}

impl std::fmt::Debug for CacheHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheHandle").field("name", &self.name).finish()
    }
}

impl CacheHandle {
    pub fn new(store: Arc<dyn CacheStore>, name: impl Into<String>) -> Self {
        Self { store, name: name.into() }
    }

    /// Bind to a generation, creating it if absent.
    pub async fn open(store: Arc<dyn CacheStore>, name: impl Into<String>) -> Result<Self, Error> {
        let handle = Self::new(store, name);
        handle.store.open(&handle.name).await?;
        Ok(handle)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn put(&self, request: &Request, response: &Response) -> Result<(), Error> {
        self.store.put(&self.name, request, response).await
    }

    pub async fn match_request(&self, request: &Request, opts: MatchOptions) -> Result<Option<Response>, Error> {
        self.store.match_request(&self.name, request, opts).await
    }

    pub async fn keys(&self) -> Result<Vec<String>, Error> {
        self.store.keys(&self.name).await
    }
}
