use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use sensorhub_core::errors::InsightError;
use sensorhub_core::events::{LiveEvent, ReadingEvent};
use sensorhub_core::provider::InsightProvider;
use sensorhub_insight::{build_request, PromptReading};
use sensorhub_store::{
    Database, NewProcessRecord, NewReading, NewSensor, ProcessDataRepo, ProcessRecordRow,
    ReadingRepo, ReadingRow, SensorRepo, SensorRow, SensorWithReadings,
};

use crate::error::ApiError;
use crate::server::AppState;

/// Page size of `GET /sensors/{id}/readings`.
pub const RECENT_READINGS_LIMIT: u32 = 100;
pub const DEFAULT_PAGE_LIMIT: i64 = 100;
pub const MAX_PAGE_LIMIT: i64 = 1000;
/// Unit recorded when neither the request nor the sensor supplies one.
pub const UNKNOWN_UNIT: &str = "unknown";

/// Repositories and collaborators shared by every handler.
pub struct HandlerState {
    pub db: Database,
    pub sensors: SensorRepo,
    pub readings: ReadingRepo,
    pub process_data: ProcessDataRepo,
    pub insight: Option<Arc<dyn InsightProvider>>,
    pub insight_max_readings: u32,
    pub insight_temperature: f64,
}

impl HandlerState {
    pub fn new(db: Database) -> Self {
        Self {
            sensors: SensorRepo::new(db.clone()),
            readings: ReadingRepo::new(db.clone()),
            process_data: ProcessDataRepo::new(db.clone()),
            db,
            insight: None,
            insight_max_readings: 200,
            insight_temperature: 0.3,
        }
    }

    pub fn with_insight(
        mut self,
        provider: Option<Arc<dyn InsightProvider>>,
        max_readings: u32,
        temperature: f64,
    ) -> Self {
        self.insight = provider;
        self.insight_max_readings = max_readings.max(1);
        self.insight_temperature = temperature;
        self
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateSensorRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub sensor_type: String,
    pub location: Option<String>,
    pub unit: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    pub sensor_id: i64,
    pub value: Option<f64>,
    pub unit: Option<String>,
    pub is_present: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct DeletedReadings {
    pub sensor_id: i64,
    pub deleted: usize,
}

#[derive(Debug, Serialize)]
pub struct InsightResponse {
    pub sensor_id: i64,
    pub insight: String,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(field: &str, value: &str) -> Result<String, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::Validation(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}

/// `POST /sensors`
pub async fn create_sensor(
    State(state): State<AppState>,
    body: Result<Json<CreateSensorRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SensorRow>), ApiError> {
    let Json(req) = body?;
    let sensor = NewSensor {
        name: required("name", &req.name)?,
        sensor_type: required("type", &req.sensor_type)?,
        location: non_blank(req.location),
        unit: non_blank(req.unit),
    };
    let row = state.handlers.sensors.create(&sensor)?;
    tracing::info!(sensor_id = row.id, name = %row.name, "sensor created");
    Ok((StatusCode::CREATED, Json(row)))
}

/// `GET /sensors`
pub async fn list_sensors(
    State(state): State<AppState>,
) -> Result<Json<Vec<SensorWithReadings>>, ApiError> {
    Ok(Json(state.handlers.sensors.list_with_readings()?))
}

/// `GET /sensors/{id}`
pub async fn get_sensor(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<SensorWithReadings>, ApiError> {
    let Path(id) = id?;
    Ok(Json(state.handlers.sensors.get_with_readings(id)?))
}

/// `DELETE /sensors/{id}`
pub async fn delete_sensor(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let Path(id) = id?;
    let removed = state.handlers.sensors.delete(id)?;
    tracing::info!(sensor_id = id, readings_removed = removed, "sensor deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /sensors/{id}/readings`
pub async fn delete_readings(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<DeletedReadings>, ApiError> {
    let Path(id) = id?;
    if !state.handlers.sensors.exists(id)? {
        return Err(ApiError::NotFound(format!("sensor {id} not found")));
    }
    let deleted = state.handlers.readings.delete_for_sensor(id)?;
    tracing::info!(sensor_id = id, deleted, "readings deleted");
    Ok(Json(DeletedReadings {
        sensor_id: id,
        deleted,
    }))
}

/// `POST /sensors/data`: validate, apply defaults, persist, then fan out to live connections.
pub async fn ingest_reading(
    State(state): State<AppState>,
    body: Result<Json<IngestRequest>, JsonRejection>,
) -> Result<Json<ReadingRow>, ApiError> {
    let Json(req) = body?;
    let value = req.value.unwrap_or(0.0);
    if !value.is_finite() {
        return Err(ApiError::Validation("value must be a finite number".into()));
    }

    let sensor = state.handlers.sensors.get(req.sensor_id)?;
    let unit = non_blank(req.unit)
        .or(sensor.unit)
        .unwrap_or_else(|| UNKNOWN_UNIT.to_string());

    let row = state.handlers.readings.insert(&NewReading {
        sensor_id: sensor.id,
        value,
        unit,
        is_present: req.is_present.unwrap_or(true),
    })?;
    tracing::info!(sensor_id = row.sensor_id, reading_id = row.id, "reading stored");

    state.registry.broadcast(&LiveEvent::NewReading(ReadingEvent {
        id: row.id,
        sensor_id: row.sensor_id,
        value: row.value,
        unit: row.unit.clone(),
        is_present: row.is_present,
        timestamp: row.timestamp.clone(),
    }));

    Ok(Json(row))
}

/// `GET /sensors/{id}/readings`: most recent first.
pub async fn list_readings(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Vec<ReadingRow>>, ApiError> {
    let Path(id) = id?;
    if !state.handlers.sensors.exists(id)? {
        return Err(ApiError::NotFound(format!("sensor {id} not found")));
    }
    let rows = state
        .handlers
        .readings
        .list_for_sensor(id, Some(RECENT_READINGS_LIMIT))?;
    Ok(Json(rows))
}

/// `GET /sensors/{id}/insights`
pub async fn sensor_insights(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<InsightResponse>, ApiError> {
    let Path(id) = id?;
    let handlers = &state.handlers;
    if !handlers.sensors.exists(id)? {
        return Err(ApiError::NotFound(format!("sensor {id} not found")));
    }

    let mut rows = handlers
        .readings
        .list_for_sensor(id, Some(handlers.insight_max_readings))?;
    if rows.is_empty() {
        return Err(ApiError::NotFound("No readings found for this sensor".into()));
    }
    rows.reverse();

    let provider = handlers.insight.clone().ok_or(InsightError::NotConfigured)?;
    let readings: Vec<PromptReading> = rows
        .into_iter()
        .map(|r| PromptReading {
            value: r.value,
            unit: r.unit,
            timestamp: r.timestamp,
        })
        .collect();
    let request = build_request(id, &readings, handlers.insight_temperature);

    tracing::info!(
        sensor_id = id,
        readings = readings.len(),
        provider = provider.name(),
        model = provider.model(),
        "requesting insight"
    );
    let insight = provider.generate(&request).await?;

    Ok(Json(InsightResponse {
        sensor_id: id,
        insight,
    }))
}

/// `GET /aux-process-data?skip=&limit=`
pub async fn list_process_data(
    State(state): State<AppState>,
    params: Result<Query<PageParams>, QueryRejection>,
) -> Result<Json<Vec<ProcessRecordRow>>, ApiError> {
    let Query(params) = params?;
    let (skip, limit) = page_bounds(&params)?;
    Ok(Json(state.handlers.process_data.list(skip, limit)?))
}

/// `POST /aux-process-data`
pub async fn create_process_record(
    State(state): State<AppState>,
    body: Result<Json<NewProcessRecord>, JsonRejection>,
) -> Result<(StatusCode, Json<ProcessRecordRow>), ApiError> {
    let Json(record) = body?;
    let row = state.handlers.process_data.insert(&record)?;
    Ok((StatusCode::CREATED, Json(row)))
}

fn page_bounds(params: &PageParams) -> Result<(u32, u32), ApiError> {
    let skip = params.skip.unwrap_or(0);
    let limit = params.limit.unwrap_or(DEFAULT_PAGE_LIMIT);
    let skip = u32::try_from(skip)
        .map_err(|_| ApiError::Validation(format!("skip must be between 0 and {}", u32::MAX)))?;
    if !(1..=MAX_PAGE_LIMIT).contains(&limit) {
        return Err(ApiError::Validation(format!(
            "limit must be between 1 and {MAX_PAGE_LIMIT}"
        )));
    }
    // bounded above by MAX_PAGE_LIMIT
    Ok((skip, limit as u32))
}
