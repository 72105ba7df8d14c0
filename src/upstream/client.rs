//! HTTP client for upstream record services.

use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, Uri};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use serde::de::DeserializeOwned;
use tokio::time::{self, Instant};

use crate::config::LoadBalancerConfig;
use crate::load_balancer::ServiceInstance;
use crate::observability::metrics;
use crate::upstream::{DependencyFailure, UpstreamError};

/// Largest upstream body we are willing to buffer.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Executes single GET calls against resolved instances.
#[derive(Clone)]
pub struct UpstreamClient {
    client: Client<HttpConnector, Body>,
    call_timeout: Duration,
    trip_threshold: u32,
    trip_cooldown: Duration,
}

impl UpstreamClient {
    pub fn new(call_timeout: Duration, lb: &LoadBalancerConfig) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            client,
            call_timeout,
            trip_threshold: lb.instance_failure_threshold,
            trip_cooldown: lb.instance_trip_cooldown(),
        }
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    /// GET `segments` (percent-encoded as path segments) on `instance` and
    /// decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        instance: &ServiceInstance,
        segments: &[&str],
    ) -> Result<T, UpstreamError> {
        let start = Instant::now();

        let outcome = match time::timeout(self.call_timeout, self.fetch(instance, segments)).await {
            Ok(result) => result,
            Err(_) => Err(UpstreamError::Timeout {
                target: instance.to_string(),
                after: self.call_timeout,
            }),
        };

        match &outcome {
            Ok(_) => instance.passive.record_success(),
            Err(e) => {
                if instance.passive.record_failure(self.trip_threshold, self.trip_cooldown) {
                    tracing::warn!(
                        instance = %instance,
                        cooldown_ms = self.trip_cooldown.as_millis() as u64,
                        error = %e,
                        "Instance tripped after consecutive failures"
                    );
                }
            }
        }

        let label = match &outcome {
            Ok(_) => "success",
            Err(e) => e.kind(),
        };
        metrics::record_upstream_call(&instance.service, label, start);

        outcome
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        instance: &ServiceInstance,
        segments: &[&str],
    ) -> Result<T, UpstreamError> {
        let failed = |reason: DependencyFailure| UpstreamError::Dependency {
            target: instance.to_string(),
            reason,
        };

        let mut url = instance.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| failed(DependencyFailure::Request("base URL cannot carry a path".into())))?
            .clear()
            .extend(segments);
        let uri: Uri = url
            .as_str()
            .parse()
            .map_err(|e: axum::http::uri::InvalidUri| {
                failed(DependencyFailure::Request(e.to_string()))
            })?;

        let request = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .header(header::ACCEPT, "application/json")
            .header(header::USER_AGENT, "passport-gateway")
            .body(Body::empty())
            .map_err(|e| failed(DependencyFailure::Request(e.to_string())))?;

        tracing::trace!(instance = %instance, path = %url.path(), "Calling upstream");

        let response = self
            .client
            .request(request)
            .await
            .map_err(|e| failed(DependencyFailure::Transport(e.to_string())))?;

        let status = response.status();
        if !status.is_success() {
            return Err(failed(DependencyFailure::Status(status.as_u16())));
        }

        let body = axum::body::to_bytes(Body::new(response.into_body()), MAX_BODY_BYTES)
            .await
            .map_err(|e| failed(DependencyFailure::Transport(e.to_string())))?;

        serde_json::from_slice(&body).map_err(|e| failed(DependencyFailure::Decode(e.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::Endpoint;
    use axum::{extract::Path, http::StatusCode, routing::get, Json, Router};
    use std::net::SocketAddr;

    async fn serve(app: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        addr
    }

    fn instance_at(addr: SocketAddr) -> ServiceInstance {
        ServiceInstance::new("bookmark-service", Endpoint::new("127.0.0.1", addr.port())).unwrap()
    }

    fn client(timeout_ms: u64) -> UpstreamClient {
        let lb = LoadBalancerConfig {
            instance_failure_threshold: 2,
            ..LoadBalancerConfig::default()
        };
        UpstreamClient::new(Duration::from_millis(timeout_ms), &lb)
    }

    #[tokio::test]
    async fn test_success_and_path_encoding() {
        let addr = serve(Router::new().route(
            "/{user}/bookmarks",
            get(|Path(user): Path<String>| async move { Json(vec![user]) }),
        ))
        .await;

        let instance = instance_at(addr);
        let users: Vec<String> = client(1_000)
            .get_json(&instance, &["Jane Doe/x", "bookmarks"])
            .await
            .unwrap();
        assert_eq!(users, vec!["Jane Doe/x".to_string()]);
    }

    #[tokio::test]
    async fn test_non_success_status() {
        let addr = serve(Router::new().route(
            "/{user}/bookmarks",
            get(|| async { StatusCode::SERVICE_UNAVAILABLE }),
        ))
        .await;

        let err = client(1_000)
            .get_json::<Vec<String>>(&instance_at(addr), &["Google", "bookmarks"])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            UpstreamError::Dependency { reason: DependencyFailure::Status(503), .. }
        ));
    }

    #[tokio::test]
    async fn test_unparseable_body() {
        let addr =
            serve(Router::new().route("/{user}/bookmarks", get(|| async { "not json" }))).await;

        let err = client(1_000)
            .get_json::<Vec<String>>(&instance_at(addr), &["Google", "bookmarks"])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            UpstreamError::Dependency { reason: DependencyFailure::Decode(_), .. }
        ));
    }

    #[tokio::test]
    async fn test_timeout_and_trip() {
        let addr = serve(Router::new().route(
            "/{user}/bookmarks",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(Vec::<String>::new())
            }),
        ))
        .await;

        let instance = instance_at(addr);
        let client = client(100);
        for _ in 0..2 {
            let err = client
                .get_json::<Vec<String>>(&instance, &["Google", "bookmarks"])
                .await
                .unwrap_err();
            assert!(matches!(err, UpstreamError::Timeout { .. }));
        }
        assert!(instance.passive.is_tripped());
    }

    #[tokio::test]
    async fn test_connection_refused() {
        // bind then drop to get a port nothing listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = client(1_000)
            .get_json::<Vec<String>>(&instance_at(addr), &["Google", "bookmarks"])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            UpstreamError::Dependency { reason: DependencyFailure::Transport(_), .. }
        ));
    }
}
