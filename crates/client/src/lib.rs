//! Client code for precache.
//!
//! This crate provides the network fetcher, the network-first and
//! cache-first strategies, request classification, and the install/activate
//! lifecycle, all composed by [`Worker`].

pub mod fetch;
pub mod interceptor;
pub mod lifecycle;
pub mod strategy;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use fetch::{FetchClient, FetchConfig, Fetcher};
pub use interceptor::{Interceptor, RequestKind, classify};
pub use lifecycle::{ActivateReport, InstallReport, Lifecycle, WorkerHost};
pub use strategy::{CacheFirst, NetworkFirst, Resolved, Source, Strategy, WritePolicy};
pub use worker::{EventOutcome, Worker, WorkerEvent, WorkerState};
