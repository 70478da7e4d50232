//! # Health Endpoint Tests

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::net::SocketAddr;
use std::sync::Arc;
use uuid::Uuid;

use time_cop::health;
use time_cop::models::{ExtractedActivity, StoredSession, TimeRecord};
use time_cop::store::{MemoryStore, RecordStore};

/// A store whose backend is unreachable
struct UnreachableStore;

#[async_trait]
impl RecordStore for UnreachableStore {
    async fn insert_batch(
        &self,
        _owner: i64,
        _date: NaiveDate,
        _activities: &[ExtractedActivity],
        _raw_text: Option<&str>,
    ) -> Result<Vec<TimeRecord>> {
        bail!("database unreachable")
    }

    async fn records_on(&self, _owner: i64, _date: NaiveDate) -> Result<Vec<TimeRecord>> {
        bail!("database unreachable")
    }

    async fn records_between(&self, _owner: i64, _from: NaiveDate, _to: NaiveDate) -> Result<Vec<TimeRecord>> {
        bail!("database unreachable")
    }

    async fn delete_record(&self, _id: Uuid, _owner: i64) -> Result<bool> {
        bail!("database unreachable")
    }

    async fn save_session(&self, _session: &StoredSession) -> Result<()> {
        bail!("database unreachable")
    }

    async fn load_session(&self, _owner: i64) -> Result<Option<StoredSession>> {
        bail!("database unreachable")
    }

    async fn clear_session(&self, _owner: i64) -> Result<()> {
        bail!("database unreachable")
    }

    async fn ping(&self) -> Result<()> {
        bail!("database unreachable")
    }
}

async fn spawn_server(store: Arc<dyn RecordStore>) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, health::router(store)).await.unwrap();
    });
    addr
}

async fn get_json(addr: SocketAddr, route: &str) -> (u16, serde_json::Value) {
    let response = reqwest::get(format!("http://{addr}{route}")).await.unwrap();
    let status = response.status().as_u16();
    (status, response.json().await.unwrap())
}

#[tokio::test]
async fn test_liveness_routes() {
    let addr = spawn_server(Arc::new(MemoryStore::new())).await;

    let (status, body) = get_json(addr, "/health").await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "time-cop");

    let (status, body) = get_json(addr, "/").await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "running");
}

#[tokio::test]
async fn test_ready_when_store_answers() {
    let addr = spawn_server(Arc::new(MemoryStore::new())).await;

    let (status, body) = get_json(addr, "/ready").await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_not_ready_when_store_is_down() {
    let addr = spawn_server(Arc::new(UnreachableStore)).await;

    let (status, body) = get_json(addr, "/ready").await;
    assert_eq!(status, 503);
    assert_eq!(body["status"], "unavailable");

    // Liveness does not depend on the store
    let (status, _) = get_json(addr, "/health").await;
    assert_eq!(status, 200);
}
