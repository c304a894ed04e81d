#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use sensorhub_core::provider::InsightProvider;
use sensorhub_server::{start, ServerConfig, ServerHandle};
use sensorhub_store::Database;

pub struct TestServer {
    pub handle: ServerHandle,
    pub db: Database,
    pub client: reqwest::Client,
}

impl TestServer {
    pub async fn spawn(insight: Option<Arc<dyn InsightProvider>>) -> Self {
        let db = Database::in_memory().unwrap();
        let config = ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
            ..Default::default()
        };
        let handle = start(config, db.clone(), insight).await.unwrap();
        Self {
            handle,
            db,
            client: reqwest::Client::new(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{path}", self.handle.port)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://127.0.0.1:{}/ws", self.handle.port)
    }

    pub async fn post(&self, path: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client.get(self.url(path)).send().await.unwrap()
    }

    pub async fn delete(&self, path: &str) -> reqwest::Response {
        self.client.delete(self.url(path)).send().await.unwrap()
    }

    pub async fn create_sensor(&self, body: Value) -> i64 {
        let resp = self.post("/sensors", body).await;
        assert_eq!(resp.status(), 201);
        let json: Value = resp.json().await.unwrap();
        json["id"].as_i64().unwrap()
    }

    /// Poll until the registry holds `n` live connections.
    pub async fn wait_for_connections(&self, n: usize) {
        for _ in 0..100 {
            if self.handle.connections() == n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!(
            "expected {n} live connections, found {}",
            self.handle.connections()
        );
    }
}
