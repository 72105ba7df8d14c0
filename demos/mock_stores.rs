//! Local bookmark and contact services for trying the gateway by hand.
//!
//! ```text
//! cargo run --example mock_stores
//! cargo run -- --config demos/gateway.toml
//! curl localhost:8080/jlong/passport
//! ```

use std::net::SocketAddr;

use axum::{extract::Path, routing::get, Json, Router};
use serde_json::{json, Value};

async fn bookmarks(Path(user): Path<String>) -> Json<Value> {
    Json(json!([
        { "id": 1, "href": format!("http://{user}.example.com"), "userId": user, "description": "Home page" },
        { "id": 2, "href": "http://spring.io", "userId": user, "description": "Spring" },
    ]))
}

async fn contacts(Path(user): Path<String>) -> Json<Value> {
    Json(json!([
        { "id": 1, "userId": user, "firstName": "Dave", "lastName": "Syer", "email": "dsyer@example.com" },
        { "id": 2, "userId": user, "firstName": "Phil", "lastName": "Webb", "email": "pwebb@example.com" },
    ]))
}

async fn serve(port: u16, app: Router) -> std::io::Result<()> {
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    println!("listening on http://{addr}");
    axum::serve(listener, app).await
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let health = || async { "ok" };
    let bookmark_store = Router::new()
        .route("/health", get(health))
        .route("/{user}/bookmarks", get(bookmarks));
    let contact_store = Router::new()
        .route("/health", get(health))
        .route("/{user}/contacts", get(contacts));

    tokio::try_join!(serve(9001, bookmark_store), serve(9002, contact_store))?;
    Ok(())
}
