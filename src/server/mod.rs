//! # Local collection endpoint
//!
//! Receives what the harvester collected and keeps it in JSON files:
//!
//! - `POST /save_urls` with `{urls, filename}` merges the links into
//!   `<data_dir>/<filename>.json`, a sorted array of distinct URLs.
//! - `POST /save_profile` with `{profileUrl, profileName, experiences}`
//!   upserts the profile into the configured profile file.
//!
//! Every reply is a JSON body carrying a `message`; failures also carry
//! `error` and a non-2xx status.

use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use crate::config::{DEFAULT_URLS_FILENAME, ServerConfig};
use crate::models::{ProfileSubmission, ServerReply};

/// Body of `POST /save_urls`; both fields may be missing on the wire.
#[derive(Debug, Deserialize)]
pub struct IncomingUrls {
    pub urls: Option<Vec<String>>,
    pub filename: Option<String>,
}

/// Counts reported after a URL batch was merged
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlsSaved {
    pub path: PathBuf,
    pub added: usize,
    pub total: usize,
}

/// Reduce a user-supplied filename to a plain stem inside the data directory.
pub fn sanitize_filename(raw: &str) -> String {
    let name = raw.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    let name = name.strip_suffix(".json").unwrap_or(name);

    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ' ') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches(|c| c == '.' || c == ' ');

    if cleaned.is_empty() {
        DEFAULT_URLS_FILENAME.to_string()
    } else {
        cleaned.to_string()
    }
}

/// JSON files the endpoint writes to
#[derive(Clone)]
pub struct CollectionStore {
    data_dir: PathBuf,
    profile_file: String,
    // serialises read-merge-write cycles across requests
    write_lock: Arc<Mutex<()>>,
}

impl CollectionStore {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            data_dir: config.data_dir.clone(),
            profile_file: config.profile_file.clone(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn profile_path(&self) -> PathBuf {
        self.data_dir.join(&self.profile_file)
    }

    /// Stored URL list; unreadable content counts as an empty list.
    async fn read_urls(path: &Path) -> Result<Vec<String>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(list) => Ok(list),
                Err(e) => {
                    warn!("Ignoring unreadable content of {}: {}", path.display(), e);
                    Ok(Vec::new())
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Stored profile entries as raw JSON; anything but an array is an error.
    async fn read_profiles(path: &Path) -> Result<Vec<Value>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                anyhow::anyhow!("{} is not a JSON array of profiles: {}", path.display(), e)
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_list<T: serde::Serialize>(path: &Path, list: &[T]) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(list)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    /// Merge `urls` into `<filename>.json` as a set.
    pub async fn save_urls(&self, filename: &str, urls: &[String]) -> Result<UrlsSaved> {
        let _guard = self.write_lock.lock().await;
        let path = self.data_dir.join(format!("{}.json", sanitize_filename(filename)));

        let existing: BTreeSet<String> = Self::read_urls(&path).await?.into_iter().collect();
        let mut merged = existing.clone();
        merged.extend(urls.iter().cloned());

        let added = merged.len() - existing.len();
        let all: Vec<&String> = merged.iter().collect();
        Self::write_list(&path, &all).await?;

        info!(
            "Saved to {} - {} new URLs, total: {}",
            path.display(),
            added,
            merged.len()
        );

        Ok(UrlsSaved {
            path,
            added,
            total: merged.len(),
        })
    }

    /// Insert a profile, replacing an earlier entry with the same URL.
    ///
    /// Entries already in the file are kept as raw JSON, so records with
    /// missing or extra fields survive. A file that is not a JSON array is
    /// left untouched and reported as an error.
    ///
    /// # Returns
    /// * `Result<usize>` - number of profiles in the file afterwards
    pub async fn save_profile(&self, submission: &ProfileSubmission) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        let path = self.profile_path();

        let mut profiles = Self::read_profiles(&path).await?;
        let entry = serde_json::to_value(submission)?;

        match profiles.iter_mut().find(|p| {
            p.get("profileUrl").and_then(Value::as_str) == Some(submission.profile_url.as_str())
        }) {
            Some(existing) => *existing = entry,
            None => profiles.push(entry),
        }
        Self::write_list(&path, &profiles).await?;

        info!(
            "Saved profile {} to {} ({} profiles)",
            submission.profile_name,
            path.display(),
            profiles.len()
        );

        Ok(profiles.len())
    }
}

async fn save_urls(
    State(store): State<CollectionStore>,
    Json(body): Json<IncomingUrls>,
) -> (StatusCode, Json<ServerReply>) {
    let Some(urls) = body.urls else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ServerReply::failure("No URLs provided")),
        );
    };
    let filename = body
        .filename
        .unwrap_or_else(|| DEFAULT_URLS_FILENAME.to_string());

    match store.save_urls(&filename, &urls).await {
        Ok(saved) => (
            StatusCode::OK,
            Json(ServerReply::success(format!(
                "{} new URLs saved to {}, total: {}",
                saved.added,
                saved.path.display(),
                saved.total
            ))),
        ),
        Err(e) => {
            error!("Failed to save URLs: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ServerReply::failure(format!("Failed to save URLs: {e}"))),
            )
        }
    }
}

async fn save_profile(
    State(store): State<CollectionStore>,
    Json(submission): Json<ProfileSubmission>,
) -> (StatusCode, Json<ServerReply>) {
    if submission.profile_url.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ServerReply::failure("No profile URL provided")),
        );
    }

    match store.save_profile(&submission).await {
        Ok(total) => (
            StatusCode::OK,
            Json(ServerReply::success(format!(
                "Profile {} saved ({} profiles collected)",
                submission.profile_name, total
            ))),
        ),
        Err(e) => {
            error!("Failed to save profile: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ServerReply::failure(format!("Failed to save profile: {e}"))),
            )
        }
    }
}

pub fn router(store: CollectionStore) -> Router {
    Router::new()
        .route("/save_urls", post(save_urls))
        .route("/save_profile", post(save_profile))
        .layer(CorsLayer::very_permissive())
        .with_state(store)
}

/// Serve the collection endpoint until the process is stopped.
pub async fn serve(addr: SocketAddr, config: ServerConfig) -> Result<()> {
    tokio::fs::create_dir_all(&config.data_dir).await?;
    let store = CollectionStore::new(&config);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        "Collection endpoint listening on {} (data dir {})",
        listener.local_addr()?,
        config.data_dir.display()
    );

    axum::serve(listener, router(store)).await?;
    Ok(())
}
