//! Core types and shared functionality for precache.
//!
//! This crate provides:
//! - Request/response snapshots with clone-before-fork bodies
//! - Cache storage trait with SQLite and in-memory backends
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod http;

pub use cache::{CacheDb, CacheHandle, CacheStore, MatchOptions, MemoryStore};
pub use config::{AppConfig, CacheWriteMode, ConfigError, WorkerConfig};
pub use error::Error;
pub use http::{Request, Response};
