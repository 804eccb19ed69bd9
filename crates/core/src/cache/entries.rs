//! SQLite implementation of [`CacheStore`].

use super::connection::CacheDb;
use super::hash::compute_entry_key;
use super::{CacheStore, MatchOptions};
use crate::Error;
use crate::http::{HeaderList, Request, Response};
use bytes::Bytes;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;
use url::Url;

const SELECT_RESPONSE: &str = "SELECT response_url, status, status_text, headers_json, body FROM entries";

/// Row as stored, before decoding.
struct RawEntry {
    response_url: String,
    status: i64,
    status_text: String,
    headers_json: String,
    body: Vec<u8>,
}

impl RawEntry {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            response_url: row.get(0)?,
            status: row.get(1)?,
            status_text: row.get(2)?,
            headers_json: row.get(3)?,
            body: row.get(4)?,
        })
    }

    fn into_response(self) -> Result<Response, Error> {
        let url = Url::parse(&self.response_url).map_err(|e| Error::CorruptEntry(e.to_string()))?;
        let status = u16::try_from(self.status).map_err(|e| Error::CorruptEntry(e.to_string()))?;
        let headers: HeaderList = serde_json::from_str(&self.headers_json)?;

        Ok(Response { url, status, status_text: self.status_text, headers, body: Bytes::from(self.body) })
    }
}

#[async_trait::async_trait]
impl CacheStore for CacheDb {
    async fn open(&self, name: &str) -> Result<(), Error> {
        let name = name.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute("INSERT OR IGNORE INTO caches (name, created_at) VALUES (?1, ?2)", params![name, now])?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn put(&self, name: &str, request: &Request, response: &Response) -> Result<(), Error> {
        if !request.is_cacheable() {
            return Err(Error::InvalidInput(format!("cannot cache {} request for {}", request.method, request.url)));
        }

        let name = name.to_string();
        let url = request.url.to_string();
        let url_no_search = request.url_without_search();
        let key_hash = compute_entry_key(&name, &url);
        let response_url = response.url.to_string();
        let status = i64::from(response.status);
        let status_text = response.status_text.clone();
        let headers_json = serde_json::to_string(&response.headers)?;
        let body = response.body.to_vec();
        let now = chrono::Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                tx.execute("INSERT OR IGNORE INTO caches (name, created_at) VALUES (?1, ?2)", params![&name, &now])?;
                tx.execute(
                    "INSERT INTO entries (
                    key_hash, cache_name, url, url_no_search, response_url,
                    status, status_text, headers_json, body, stored_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                ON CONFLICT(key_hash) DO UPDATE SET
                    response_url = excluded.response_url,
                    status = excluded.status,
                    status_text = excluded.status_text,
                    headers_json = excluded.headers_json,
                    body = excluded.body,
                    stored_at = excluded.stored_at",
                    params![
                        &key_hash,
                        &name,
                        &url,
                        &url_no_search,
                        &response_url,
                        status,
                        &status_text,
                        &headers_json,
                        &body,
                        &now,
                    ],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn match_request(
        &self, name: &str, request: &Request, opts: MatchOptions,
    ) -> Result<Option<Response>, Error> {
        if !request.is_cacheable() {
            return Ok(None);
        }

        let name = name.to_string();
        let url = request.url.to_string();
        let url_no_search = request.url_without_search();

        let raw = self
            .conn
            .call(move |conn| -> Result<Option<RawEntry>, Error> {
                let result = if opts.ignore_search {
                    let mut stmt = conn.prepare(&format!(
                        "{SELECT_RESPONSE} WHERE cache_name = ?1 AND url_no_search = ?2 ORDER BY rowid LIMIT 1"
                    ))?;
                    stmt.query_row(params![name, url_no_search], RawEntry::from_row)
                } else {
                    let mut stmt = conn.prepare(&format!("{SELECT_RESPONSE} WHERE key_hash = ?1"))?;
                    stmt.query_row(params![compute_entry_key(&name, &url)], RawEntry::from_row)
                };

                match result {
                    Ok(raw) => Ok(Some(raw)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        raw.map(RawEntry::into_response).transpose()
    }

    async fn keys(&self, name: &str) -> Result<Vec<String>, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT url FROM entries WHERE cache_name = ?1 ORDER BY rowid")?;
                let urls = stmt
                    .query_map(params![name], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(urls)
            })
            .await
            .map_err(Error::from)
    }

    async fn cache_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM caches ORDER BY id")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    async fn delete_cache(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM caches WHERE name = ?1", params![name])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    async fn mark_active(&self, name: &str) -> Result<(), Error> {
        let name = name.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                tx.execute("INSERT OR IGNORE INTO caches (name, created_at) VALUES (?1, ?2)", params![&name, &now])?;
                tx.execute("UPDATE caches SET activated_at = NULL WHERE name != ?1", params![&name])?;
                tx.execute("UPDATE caches SET activated_at = ?2 WHERE name = ?1", params![&name, &now])?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn active_cache(&self) -> Result<Option<String>, Error> {
        self.conn
            .call(|conn| -> Result<Option<String>, Error> {
                let result = conn.query_row(
                    "SELECT name FROM caches WHERE activated_at IS NOT NULL ORDER BY activated_at DESC LIMIT 1",
                    [],
                    |row| row.get(0),
                );
                match result {
                    Ok(name) => Ok(Some(name)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }
}
