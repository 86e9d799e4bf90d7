//! Shared fixtures for unit tests.

use std::sync::Arc;

use axum::Router;

use crate::store::{DbStore, MemStore, Store};

/// Serves `app` on an ephemeral local port and returns its base url.
pub async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

pub fn mem_store() -> Arc<Store> {
    let store = Store::new();
    MemStore::new().init(&store).unwrap();
    Arc::new(store)
}
