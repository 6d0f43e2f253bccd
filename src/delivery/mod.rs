//! # Delivery to the collection endpoint
//!
//! Posts harvested data as JSON to the local collection endpoint (see the
//! `server` module) and turns the reply into a [`FlowOutcome`] the command
//! surface can show as-is.
//!
//! ## Endpoints
//!
//! - `POST {endpoint}/save_urls` with `{urls, filename}`
//! - `POST {endpoint}/save_profile` with `{profileUrl, profileName, experiences}`
//!
//! ## Error Handling
//!
//! Delivery never returns an error. An unreachable endpoint, a non-2xx
//! status or an unreadable reply all become `FlowOutcome::Failure` with a
//! message; nothing is retried.

use reqwest::Client;
use serde::Serialize;
use tracing::{error, info};

use crate::models::{FlowOutcome, ProfileSubmission, ServerReply, UrlBatch};

/// HTTP client for the collection endpoint.
///
/// Cheap to clone; the underlying `reqwest::Client` shares its connection pool.
#[derive(Clone)]
pub struct DeliveryClient {
    client: Client,
    /// Base URL without trailing slash, e.g. `http://localhost:5000`
    endpoint: String,
}

impl DeliveryClient {
    pub fn new(endpoint: &str) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
        }
    }

    pub async fn send_urls(&self, batch: &UrlBatch) -> FlowOutcome {
        info!(
            "Delivering {} profile URLs to {} as {}",
            batch.urls.len(),
            self.endpoint,
            batch.filename
        );
        self.post("save_urls", batch).await
    }

    pub async fn send_profile(&self, submission: &ProfileSubmission) -> FlowOutcome {
        info!(
            "Delivering profile {} to {}",
            submission.profile_name, self.endpoint
        );
        self.post("save_profile", submission).await
    }

    async fn post<T: Serialize + Sync>(&self, route: &str, body: &T) -> FlowOutcome {
        let url = format!("{}/{}", self.endpoint, route);

        let response = match self.client.post(&url).json(body).send().await {
            Ok(response) => response,
            Err(e) => {
                error!("Could not reach collection endpoint {}: {}", url, e);
                return FlowOutcome::Failure(format!("Could not reach {url}: {e}"));
            }
        };

        let status = response.status();
        let reply = response
            .text()
            .await
            .ok()
            .and_then(|text| serde_json::from_str::<ServerReply>(&text).ok())
            .unwrap_or_default();

        if status.is_success() {
            let message = if reply.message.is_empty() {
                format!("Delivered to {url}")
            } else {
                reply.message
            };
            info!("Collection endpoint accepted delivery: {}", message);
            FlowOutcome::Success(message)
        } else {
            let message = reply
                .error
                .filter(|e| !e.is_empty())
                .or_else(|| (!reply.message.is_empty()).then_some(reply.message))
                .unwrap_or_else(|| format!("Collection endpoint returned {status}"));
            error!("Collection endpoint rejected delivery ({}): {}", status, message);
            FlowOutcome::Failure(message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::server::{CollectionStore, router};
    use axum::{Json, Router, http::StatusCode, routing::post};
    use tempfile::tempdir;

    async fn spawn(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_urls_delivered_to_collection_server() {
        let temp = tempdir().unwrap();
        let store = CollectionStore::new(&ServerConfig {
            data_dir: temp.path().to_path_buf(),
            profile_file: "profiles.json".to_string(),
        });
        let endpoint = spawn(router(store)).await;
        let client = DeliveryClient::new(&format!("{endpoint}/"));

        let outcome = client
            .send_urls(&UrlBatch {
                urls: vec!["https://www.linkedin.com/in/ada".to_string()],
                filename: "acme".to_string(),
            })
            .await;

        assert!(outcome.is_success(), "{outcome:?}");
        assert!(outcome.message().contains("1 new URLs"));
        assert!(temp.path().join("acme.json").exists());
    }

    #[tokio::test]
    async fn test_profile_delivered_to_collection_server() {
        let temp = tempdir().unwrap();
        let store = CollectionStore::new(&ServerConfig {
            data_dir: temp.path().to_path_buf(),
            profile_file: "profiles.json".to_string(),
        });
        let endpoint = spawn(router(store)).await;

        let submission = ProfileSubmission {
            profile_url: "https://www.linkedin.com/in/ada".to_string(),
            profile_name: "Ada".to_string(),
            experiences: Vec::new(),
            scraped_at: None,
        };
        let outcome = DeliveryClient::new(&endpoint).send_profile(&submission).await;

        assert!(outcome.is_success(), "{outcome:?}");
        assert!(temp.path().join("profiles.json").exists());
    }

    #[tokio::test]
    async fn test_rejection_carries_server_message() {
        let app = Router::new().route(
            "/save_urls",
            post(|| async {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ServerReply::failure("disk full")),
                )
            }),
        );
        let endpoint = spawn(app).await;

        let outcome = DeliveryClient::new(&endpoint)
            .send_urls(&UrlBatch {
                urls: Vec::new(),
                filename: "x".to_string(),
            })
            .await;

        assert_eq!(outcome, FlowOutcome::Failure("disk full".to_string()));
    }

    #[tokio::test]
    async fn test_rejection_without_body_reports_status() {
        let app = Router::new().route("/save_urls", post(|| async { StatusCode::BAD_GATEWAY }));
        let endpoint = spawn(app).await;

        let outcome = DeliveryClient::new(&endpoint)
            .send_urls(&UrlBatch {
                urls: Vec::new(),
                filename: "x".to_string(),
            })
            .await;

        assert!(!outcome.is_success());
        assert!(outcome.message().contains("502"));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_failure() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let outcome = DeliveryClient::new(&format!("http://{addr}"))
            .send_urls(&UrlBatch {
                urls: Vec::new(),
                filename: "x".to_string(),
            })
            .await;

        assert!(!outcome.is_success());
        assert!(outcome.message().starts_with("Could not reach"));
    }
}
