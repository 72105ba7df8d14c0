//! Discovery backed by a remote registry over HTTP.
//!
//! Expects `GET {base_url}/services/{name}/instances` to return a JSON array
//! of `{ "host": "...", "port": N }`. A 404 means the registry does not know
//! the service and is reported as an empty list.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use url::Url;

use crate::discovery::{Discovery, DiscoveryError, Endpoint};

/// Eureka-style registry client.
#[derive(Debug, Clone)]
pub struct HttpDiscovery {
    base_url: Url,
    client: reqwest::Client,
}

impl HttpDiscovery {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, DiscoveryError> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { base_url, client })
    }

    fn instances_url(&self, service: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["services", service, "instances"]);
        }
        url
    }
}

#[async_trait]
impl Discovery for HttpDiscovery {
    async fn list_instances(&self, service: &str) -> Result<Vec<Endpoint>, DiscoveryError> {
        let response = self.client.get(self.instances_url(service)).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(Vec::new()),
            status if status.is_success() => Ok(response.json::<Vec<Endpoint>>().await?),
            status => Err(DiscoveryError::Status {
                service: service.to_string(),
                status: status.as_u16(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Path, http::StatusCode as AxumStatus, routing::get, Json, Router};

    async fn serve_registry() -> String {
        let app = Router::new().route(
            "/eureka/services/{name}/instances",
            get(|Path(name): Path<String>| async move {
                match name.as_str() {
                    "bookmark-service" => Ok(Json(vec![
                        Endpoint::new("10.0.0.1", 8081),
                        Endpoint::new("10.0.0.2", 8081),
                    ])),
                    "broken-service" => Err(AxumStatus::INTERNAL_SERVER_ERROR),
                    _ => Err(AxumStatus::NOT_FOUND),
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{}/eureka", addr)
    }

    #[tokio::test]
    async fn test_lists_instances() {
        let base = serve_registry().await;
        let discovery = HttpDiscovery::new(&base, Duration::from_secs(2)).unwrap();

        let endpoints = discovery.list_instances("bookmark-service").await.unwrap();
        assert_eq!(endpoints.len(), 2);
        assert_eq!(endpoints[1], Endpoint::new("10.0.0.2", 8081));

        assert!(discovery.list_instances("unknown-service").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_server_error_is_reported() {
        let base = serve_registry().await;
        let discovery = HttpDiscovery::new(&base, Duration::from_secs(2)).unwrap();

        let err = discovery.list_instances("broken-service").await.unwrap_err();
        assert!(matches!(err, DiscoveryError::Status { status: 500, .. }));
    }

    #[test]
    fn test_service_name_is_encoded_as_one_segment() {
        let discovery =
            HttpDiscovery::new("http://registry:8761/eureka", Duration::from_secs(2)).unwrap();
        assert_eq!(
            discovery.instances_url("contact service/v2").as_str(),
            "http://registry:8761/eureka/services/contact%20service%2Fv2/instances"
        );
        assert_eq!(
            discovery.instances_url("bookmark-service").as_str(),
            "http://registry:8761/eureka/services/bookmark-service/instances"
        );
    }
}
