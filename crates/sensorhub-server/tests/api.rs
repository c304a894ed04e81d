mod common;

use std::sync::Arc;

use serde_json::{json, Value};

use sensorhub_core::errors::InsightError;
use sensorhub_core::provider::InsightProvider;
use sensorhub_insight::MockProvider;
use sensorhub_store::ReadingRepo;

use common::TestServer;

#[tokio::test]
async fn create_ingest_and_read_back() {
    let server = TestServer::spawn(None).await;

    let id = server
        .create_sensor(json!({"name": "tank-1", "type": "temperature"}))
        .await;
    assert_eq!(id, 1);

    let resp = server
        .post("/sensors/data", json!({"sensor_id": 1, "value": 36.6, "unit": "C"}))
        .await;
    assert_eq!(resp.status(), 200);
    let reading: Value = resp.json().await.unwrap();
    assert_eq!(reading["id"], 1);
    assert_eq!(reading["sensor_id"], 1);
    assert_eq!(reading["value"], 36.6);
    assert_eq!(reading["unit"], "C");
    assert!(!reading["timestamp"].as_str().unwrap().is_empty());

    let readings: Vec<Value> = server.get("/sensors/1/readings").await.json().await.unwrap();
    assert_eq!(readings, vec![reading]);
}

#[tokio::test]
async fn ingest_for_missing_sensor_is_404_and_stores_nothing() {
    let server = TestServer::spawn(None).await;
    let repo = ReadingRepo::new(server.db.clone());
    let before = repo.count().unwrap();

    let resp = server
        .post("/sensors/data", json!({"sensor_id": 999, "value": 1.0}))
        .await;
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "NOT_FOUND");
    assert_eq!(repo.count().unwrap(), before);
}

#[tokio::test]
async fn ingest_applies_defaults() {
    let server = TestServer::spawn(None).await;
    let with_unit = server
        .create_sensor(json!({"name": "p-1", "type": "pressure", "unit": "kPa"}))
        .await;
    let without_unit = server
        .create_sensor(json!({"name": "lvl-1", "type": "level"}))
        .await;

    let reading: Value = server
        .post("/sensors/data", json!({"sensor_id": with_unit}))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(reading["value"], 0.0);
    assert_eq!(reading["unit"], "kPa");
    assert_eq!(reading["is_present"], true);

    let reading: Value = server
        .post("/sensors/data", json!({"sensor_id": without_unit, "is_present": false}))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(reading["unit"], "unknown");
    assert_eq!(reading["is_present"], false);
}

#[tokio::test]
async fn malformed_bodies_are_422() {
    let server = TestServer::spawn(None).await;
    server
        .create_sensor(json!({"name": "tank-1", "type": "temperature"}))
        .await;

    let resp = server.post("/sensors/data", json!({"value": 1.0})).await;
    assert_eq!(resp.status(), 422);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "VALIDATION_FAILED");

    let resp = server
        .post("/sensors/data", json!({"sensor_id": "one"}))
        .await;
    assert_eq!(resp.status(), 422);

    let resp = server
        .post("/sensors", json!({"name": "  ", "type": "temperature"}))
        .await;
    assert_eq!(resp.status(), 422);

    let resp = server.get("/sensors/abc").await;
    assert_eq!(resp.status(), 422);
}

#[tokio::test]
async fn readings_are_newest_first_and_ids_monotonic() {
    let server = TestServer::spawn(None).await;
    let id = server
        .create_sensor(json!({"name": "tank-1", "type": "temperature"}))
        .await;

    let mut ids = Vec::new();
    for value in [1.0, 2.0, 3.0] {
        let reading: Value = server
            .post("/sensors/data", json!({"sensor_id": id, "value": value}))
            .await
            .json()
            .await
            .unwrap();
        ids.push(reading["id"].as_i64().unwrap());
    }
    assert!(ids.windows(2).all(|w| w[0] < w[1]));

    let readings: Vec<Value> = server
        .get(&format!("/sensors/{id}/readings"))
        .await
        .json()
        .await
        .unwrap();
    let values: Vec<f64> = readings.iter().map(|r| r["value"].as_f64().unwrap()).collect();
    assert_eq!(values, vec![3.0, 2.0, 1.0]);

    let sensor: Value = server.get(&format!("/sensors/{id}")).await.json().await.unwrap();
    assert_eq!(sensor["name"], "tank-1");
    assert_eq!(sensor["type"], "temperature");
    assert_eq!(sensor["readings"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn list_sensors_nests_readings() {
    let server = TestServer::spawn(None).await;
    let a = server.create_sensor(json!({"name": "a", "type": "t"})).await;
    let b = server.create_sensor(json!({"name": "b", "type": "t"})).await;
    server.post("/sensors/data", json!({"sensor_id": a, "value": 1.0})).await;

    let sensors: Vec<Value> = server.get("/sensors").await.json().await.unwrap();
    assert_eq!(sensors.len(), 2);
    assert_eq!(sensors[0]["id"], a);
    assert_eq!(sensors[0]["readings"].as_array().unwrap().len(), 1);
    assert_eq!(sensors[1]["id"], b);
    assert!(sensors[1]["readings"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn delete_sensor_and_readings() {
    let server = TestServer::spawn(None).await;
    let id = server.create_sensor(json!({"name": "a", "type": "t"})).await;
    for _ in 0..2 {
        server.post("/sensors/data", json!({"sensor_id": id})).await;
    }

    let resp = server.delete(&format!("/sensors/{id}/readings")).await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"sensor_id": id, "deleted": 2}));

    server.post("/sensors/data", json!({"sensor_id": id})).await;
    assert_eq!(server.delete(&format!("/sensors/{id}")).await.status(), 204);
    assert_eq!(server.get(&format!("/sensors/{id}")).await.status(), 404);
    assert_eq!(server.delete(&format!("/sensors/{id}")).await.status(), 404);
    assert_eq!(server.delete(&format!("/sensors/{id}/readings")).await.status(), 404);
    assert_eq!(server.get(&format!("/sensors/{id}/readings")).await.status(), 404);
    assert_eq!(ReadingRepo::new(server.db.clone()).count().unwrap(), 0);
}

#[tokio::test]
async fn process_data_pagination() {
    let server = TestServer::spawn(None).await;
    for day in 0..5 {
        let resp = server
            .post(
                "/aux-process-data",
                json!({
                    "day": day,
                    "VS_remaining_kg": 100.0,
                    "VS_degraded_kg": 1.0,
                    "cum_CH4_m3": 0.5,
                    "approx_biogas_m3": 0.8,
                    "VFA_g": 12.0,
                    "NaHCO3_g_safety": 3.0
                }),
            )
            .await;
        assert_eq!(resp.status(), 201);
    }

    let page: Vec<Value> = server
        .get("/aux-process-data?skip=0&limit=1")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0]["day"], 0.0);

    let page: Vec<Value> = server
        .get("/aux-process-data?skip=5&limit=10")
        .await
        .json()
        .await
        .unwrap();
    assert!(page.is_empty());

    let page: Vec<Value> = server.get("/aux-process-data").await.json().await.unwrap();
    assert_eq!(page.len(), 5);

    assert_eq!(server.get("/aux-process-data?limit=0").await.status(), 422);
    assert_eq!(server.get("/aux-process-data?skip=-1").await.status(), 422);
    assert_eq!(server.get("/aux-process-data?limit=abc").await.status(), 422);
}

#[tokio::test]
async fn routes_are_also_served_under_api_prefix() {
    let server = TestServer::spawn(None).await;
    let resp = server
        .post("/api/sensors", json!({"name": "tank-1", "type": "temperature"}))
        .await;
    assert_eq!(resp.status(), 201);

    let sensors: Vec<Value> = server.get("/api/sensors").await.json().await.unwrap();
    assert_eq!(sensors.len(), 1);
    assert_eq!(server.get("/sensors/1").await.status(), 200);
}

#[tokio::test]
async fn insights_with_mock_provider() {
    let mock = Arc::new(MockProvider::with_text("{\"summary\":\"steady\"}"));
    let server = TestServer::spawn(Some(mock.clone() as Arc<dyn InsightProvider>)).await;
    let id = server
        .create_sensor(json!({"name": "tank-1", "type": "temperature"}))
        .await;
    for value in [111.25, 222.75] {
        server
            .post("/sensors/data", json!({"sensor_id": id, "value": value, "unit": "C"}))
            .await;
    }

    let resp = server.get(&format!("/sensors/{id}/insights")).await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["sensor_id"], id);
    assert_eq!(body["insight"], "{\"summary\":\"steady\"}");
    assert_eq!(mock.call_count(), 1);

    let prompt = mock.last_request().unwrap().user_prompt;
    assert!(prompt.contains(&format!("sensor ID {id}")));
    let older = prompt.find("111.25").unwrap();
    let newer = prompt.find("222.75").unwrap();
    assert!(older < newer, "readings should be presented oldest first");
}

#[tokio::test]
async fn insights_error_paths() {
    let mock = Arc::new(MockProvider::new(vec![Err(InsightError::ServerError {
        status: 500,
        body: "overloaded".into(),
    })]));
    let server = TestServer::spawn(Some(mock.clone() as Arc<dyn InsightProvider>)).await;

    assert_eq!(server.get("/sensors/42/insights").await.status(), 404);

    let id = server.create_sensor(json!({"name": "a", "type": "t"})).await;
    let resp = server.get(&format!("/sensors/{id}/insights")).await;
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["detail"], "No readings found for this sensor");
    assert_eq!(mock.call_count(), 0);

    server.post("/sensors/data", json!({"sensor_id": id, "value": 1.0})).await;
    let resp = server.get(&format!("/sensors/{id}/insights")).await;
    assert_eq!(resp.status(), 502);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "UPSTREAM_FAILURE");
    assert_eq!(mock.call_count(), 1);
}

#[tokio::test]
async fn insights_without_provider_is_503() {
    let server = TestServer::spawn(None).await;
    let id = server.create_sensor(json!({"name": "a", "type": "t"})).await;
    server.post("/sensors/data", json!({"sensor_id": id, "value": 1.0})).await;

    let resp = server.get(&format!("/sensors/{id}/insights")).await;
    assert_eq!(resp.status(), 503);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "SERVICE_UNAVAILABLE");
}
