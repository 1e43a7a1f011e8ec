//! Cache-first network shell.
//!
//! A local proxy in front of the app's static origin that keeps the entry
//! page and a handful of shell assets in a named cache, so the app still
//! boots when the origin is unreachable. Every other GET is served from
//! the cache when present and otherwise fetched and opportunistically
//! stored.

use axum::body::Bytes;
use axum::http::{HeaderMap, Method, StatusCode};

pub mod cache;
pub mod network;
pub mod server;
pub mod worker;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ShellError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Install failed: {0}")]
    Install(String),
    #[error("Worker is {0}, expected installed")]
    NotInstalled(&'static str),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestMode {
    /// Top-level page load.
    Navigate,
    Other,
}

#[derive(Clone, Debug)]
pub struct ShellRequest {
    pub method: Method,
    /// Path and query, e.g. `/assets/app.js?v=2`.
    pub url: String,
    pub mode: RequestMode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ShellRequest {
    pub fn get(url: &str) -> Self {
        Self {
            method: Method::GET,
            url: url.to_string(),
            mode: RequestMode::Other,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn navigate(url: &str) -> Self {
        Self {
            mode: RequestMode::Navigate,
            ..Self::get(url)
        }
    }
}

/// Whether a response came from the app's own origin.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseKind {
    Basic,
    Cors,
}

#[derive(Clone, Debug)]
pub struct ShellResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub kind: ResponseKind,
}

impl ShellResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
            kind: ResponseKind::Basic,
        }
    }
}
