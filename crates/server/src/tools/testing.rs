//! Fixtures shared by the tool tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use precache_client::{Fetcher, Worker};
use precache_core::{AppConfig, CacheDb, Error, Request, Response};
use rmcp::model::CallToolResult;

use crate::host::ClientRegistry;

/// A small static site that can be taken offline.
#[derive(Default)]
pub(crate) struct SiteFetcher {
    pages: Mutex<HashMap<String, &'static str>>,
    offline: AtomicBool,
    last_headers: Mutex<Vec<(String, String)>>,
}

impl SiteFetcher {
    pub(crate) fn serving_manifest() -> Self {
        let site = Self::default();
        for (path, body) in [
            ("", "root"),
            ("index.html", "A"),
            ("manifest.json", "{}"),
            ("icon-192x192.png", "png192"),
            ("icon-512x512.png", "png512"),
        ] {
            site.serve(&format!("https://app.example.com/{path}"), body);
        }
        site
    }

    pub(crate) fn serve(&self, url: &str, body: &'static str) {
        self.pages.lock().unwrap().insert(url.to_string(), body);
    }

    pub(crate) fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Headers sent with the most recent request.
    pub(crate) fn last_headers(&self) -> Vec<(String, String)> {
        self.last_headers.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Fetcher for SiteFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        *self.last_headers.lock().unwrap() = request.headers.clone();
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Network(format!("{}: offline", request.url)));
        }

        let page = self.pages.lock().unwrap().get(request.url.as_str()).copied();
        Ok(match page {
            Some(body) => Response::new(request.url.clone(), 200, body).with_header("content-type", "text/plain"),
            None => Response::new(request.url.clone(), 404, "not found"),
        })
    }
}

pub(crate) struct Fixture {
    pub(crate) worker: Arc<Worker>,
    pub(crate) store: Arc<CacheDb>,
    pub(crate) site: Arc<SiteFetcher>,
    pub(crate) host: Arc<ClientRegistry>,
}

pub(crate) async fn fixture() -> Fixture {
    let config = AppConfig { scope: "https://app.example.com/".into(), ..Default::default() };
    let store = Arc::new(CacheDb::open_in_memory().await.unwrap());
    let site = Arc::new(SiteFetcher::serving_manifest());
    let host = Arc::new(ClientRegistry::with_clients(1));
    let worker = Arc::new(
        Worker::restore(config.worker().unwrap(), store.clone(), site.clone(), host.clone())
            .await
            .unwrap(),
    );

    Fixture { worker, store, site, host }
}

/// Text of the first content block.
pub(crate) fn output_text(result: &CallToolResult) -> String {
    let content_val = serde_json::to_value(&result.content[0]).unwrap();
    content_val
        .get("text")
        .and_then(|v| v.as_str())
        .expect("Expected text field in content")
        .to_string()
}
