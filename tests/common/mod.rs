//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use passport_gateway::config::{GatewayConfig, StaticInstanceConfig};
use passport_gateway::{Gateway, RunningGateway};

/// Start a programmable mock record service on an ephemeral port.
///
/// `f` receives the request path and returns `(status, body)`.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let Some(path) = read_request_path(&mut socket).await else {
                            return;
                        };
                        let (status, body) = f(path).await;
                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Start a mock that always answers with the same JSON body.
pub async fn start_mock_backend(body: &'static str) -> SocketAddr {
    start_programmable_backend(move |_| async move { (200, body.to_string()) }).await
}

/// Start a mock that accepts requests and never answers in time.
pub async fn start_hanging_backend() -> SocketAddr {
    start_programmable_backend(|_| async {
        tokio::time::sleep(Duration::from_secs(30)).await;
        (200, "[]".to_string())
    })
    .await
}

async fn read_request_path(socket: &mut tokio::net::TcpStream) -> Option<String> {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let head = String::from_utf8_lossy(&buf);
    let request_line = head.lines().next()?;
    request_line.split_whitespace().nth(1).map(str::to_string)
}

/// Config with the given static instances and quiet background tasks.
pub fn test_config(bookmarks: &[SocketAddr], contacts: &[SocketAddr]) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.health_check.enabled = false;
    config.observability.metrics_enabled = false;
    config.timeouts.call_ms = 500;
    config.timeouts.aggregate_ms = 1_000;

    let entries = |service: &str, addrs: &[SocketAddr]| {
        addrs
            .iter()
            .map(|a| StaticInstanceConfig {
                service: service.to_string(),
                host: a.ip().to_string(),
                port: a.port(),
            })
            .collect::<Vec<_>>()
    };
    config.discovery.instances = entries("bookmark-service", bookmarks);
    config.discovery.instances.extend(entries("contact-service", contacts));
    config
}

/// Build and start a gateway on an ephemeral port.
pub async fn start_gateway(config: GatewayConfig) -> RunningGateway {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let admin = if config.admin.enabled {
        Some(TcpListener::bind("127.0.0.1:0").await.unwrap())
    } else {
        None
    };
    Gateway::build(config)
        .unwrap()
        .start(listener, admin, None)
        .await
        .unwrap()
}

pub fn bookmarks_json(user: &str) -> String {
    format!(
        r#"[{{"id":1,"href":"http://example.com/{user}","userId":"{user}","description":"home"}}]"#
    )
}

pub fn contacts_json(user: &str) -> String {
    format!(
        r#"[{{"id":1,"userId":"{user}","firstName":"Josh","lastName":"Long","email":"{user}@example.com"}}]"#
    )
}

/// Extract the user key from `/{user}/{resource}`.
pub fn user_of(path: &str) -> String {
    path.trim_start_matches('/')
        .split('/')
        .next()
        .unwrap_or_default()
        .to_string()
}
