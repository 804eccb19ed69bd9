//! In-memory [`CacheStore`].
//!
//! Generations and entries are kept in insertion order behind a tokio
//! RwLock, so lookups from concurrent requests proceed in parallel.

use std::sync::Arc;

use tokio::sync::RwLock;

use super::{CacheStore, MatchOptions};
use crate::Error;
use crate::http::{Request, Response};

struct StoredEntry {
    url: String,
    url_no_search: String,
    response: Response,
}

impl StoredEntry {
    fn matches(&self, request: &Request, opts: MatchOptions) -> bool {
        if opts.ignore_search {
            self.url_no_search == request.url_without_search()
        } else {
            self.url == request.url.as_str()
        }
    }
}

struct Generation {
    name: String,
    entries: Vec<StoredEntry>,
    active: bool,
}

/// Process-local cache storage.
#[derive(Clone, Default)]
pub struct MemoryStore {
    generations: Arc<RwLock<Vec<Generation>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn find_or_create<'a>(generations: &'a mut Vec<Generation>, name: &str) -> &'a mut Generation {
    let idx = match generations.iter().position(|g| g.name == name) {
        Some(idx) => idx,
        None => {
            generations.push(Generation { name: name.to_string(), entries: Vec::new(), active: false });
            generations.len() - 1
        }
    };
    &mut generations[idx]
}

#[async_trait::async_trait]
impl CacheStore for MemoryStore {
    async fn open(&self, name: &str) -> Result<(), Error> {
        let mut generations = self.generations.write().await;
        find_or_create(&mut generations, name);
        Ok(())
    }

    async fn put(&self, name: &str, request: &Request, response: &Response) -> Result<(), Error> {
        if !request.is_cacheable() {
            return Err(Error::InvalidInput(format!("cannot cache {} request for {}", request.method, request.url)));
        }

        let mut generations = self.generations.write().await;
        let generation = find_or_create(&mut generations, name);
        let url = request.url.to_string();

        match generation.entries.iter_mut().find(|e| e.url == url) {
            Some(existing) => existing.response = response.clone(),
            None => generation.entries.push(StoredEntry {
                url,
                url_no_search: request.url_without_search(),
                response: response.clone(),
            }),
        }
        Ok(())
    }

    async fn match_request(
        &self, name: &str, request: &Request, opts: MatchOptions,
    ) -> Result<Option<Response>, Error> {
        if !request.is_cacheable() {
            return Ok(None);
        }

        let generations = self.generations.read().await;
        Ok(generations
            .iter()
            .find(|g| g.name == name)
            .and_then(|g| g.entries.iter().find(|e| e.matches(request, opts)))
            .map(|e| e.response.clone()))
    }

    async fn keys(&self, name: &str) -> Result<Vec<String>, Error> {
        let generations = self.generations.read().await;
        Ok(generations
            .iter()
            .find(|g| g.name == name)
            .map(|g| g.entries.iter().map(|e| e.url.clone()).collect())
            .unwrap_or_default())
    }

    async fn cache_names(&self) -> Result<Vec<String>, Error> {
        let generations = self.generations.read().await;
        Ok(generations.iter().map(|g| g.name.clone()).collect())
    }

    async fn delete_cache(&self, name: &str) -> Result<bool, Error> {
        let mut generations = self.generations.write().await;
        let before = generations.len();
        generations.retain(|g| g.name != name);
        Ok(generations.len() < before)
    }

    async fn mark_active(&self, name: &str) -> Result<(), Error> {
        let mut generations = self.generations.write().await;
        for generation in generations.iter_mut() {
            generation.active = false;
        }
        find_or_create(&mut generations, name).active = true;
        Ok(())
    }

    async fn active_cache(&self) -> Result<Option<String>, Error> {
        let generations = self.generations.read().await;
        Ok(generations.iter().find(|g| g.active).map(|g| g.name.clone()))
    }
}
