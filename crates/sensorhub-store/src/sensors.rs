use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::database::Database;
use crate::error::StoreError;
use crate::readings::{self, ReadingRow};
use crate::row_helpers;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SensorRow {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub sensor_type: String,
    pub location: Option<String>,
    /// Unit applied to readings submitted without one.
    pub unit: Option<String>,
    pub created_at: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewSensor {
    pub name: String,
    pub sensor_type: String,
    pub location: Option<String>,
    pub unit: Option<String>,
}

/// A sensor together with its readings (newest first), fetched with an explicit second query.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SensorWithReadings {
    #[serde(flatten)]
    pub sensor: SensorRow,
    pub readings: Vec<ReadingRow>,
}

const SELECT_COLUMNS: &str = "SELECT id, name, type, location, unit, created_at FROM sensors";

pub struct SensorRepo {
    db: Database,
}

impl SensorRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    #[instrument(skip(self, sensor), fields(name = %sensor.name))]
    pub fn create(&self, sensor: &NewSensor) -> Result<SensorRow, StoreError> {
        self.db.with_conn(|conn| {
            let now = row_helpers::now_timestamp();
            conn.execute(
                "INSERT INTO sensors (name, type, location, unit, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![sensor.name, sensor.sensor_type, sensor.location, sensor.unit, now],
            )?;

            Ok(SensorRow {
                id: conn.last_insert_rowid(),
                name: sensor.name.clone(),
                sensor_type: sensor.sensor_type.clone(),
                location: sensor.location.clone(),
                unit: sensor.unit.clone(),
                created_at: now,
            })
        })
    }

    #[instrument(skip(self))]
    pub fn get(&self, id: i64) -> Result<SensorRow, StoreError> {
        self.db.with_conn(|conn| select_one(conn, id))
    }

    pub fn exists(&self, id: i64) -> Result<bool, StoreError> {
        self.db.with_conn(|conn| exists(conn, id))
    }

    /// List all sensors in id order.
    #[instrument(skip(self))]
    pub fn list(&self) -> Result<Vec<SensorRow>, StoreError> {
        self.db.with_conn(select_all)
    }

    #[instrument(skip(self))]
    pub fn get_with_readings(&self, id: i64) -> Result<SensorWithReadings, StoreError> {
        self.db.with_conn(|conn| {
            let sensor = select_one(conn, id)?;
            let readings = readings::select_for_sensor(conn, id, None)?;
            Ok(SensorWithReadings { sensor, readings })
        })
    }

    #[instrument(skip(self))]
    pub fn list_with_readings(&self) -> Result<Vec<SensorWithReadings>, StoreError> {
        self.db.with_conn(|conn| {
            let sensors = select_all(conn)?;
            let mut grouped = readings::select_grouped(conn)?;
            Ok(sensors
                .into_iter()
                .map(|sensor| {
                    let readings = grouped.remove(&sensor.id).unwrap_or_default();
                    SensorWithReadings { sensor, readings }
                })
                .collect())
        })
    }

    /// Delete a sensor and its readings in one transaction.
    /// Returns the number of readings removed alongside it.
    #[instrument(skip(self))]
    pub fn delete(&self, id: i64) -> Result<usize, StoreError> {
        self.db.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            if !exists(&tx, id)? {
                return Err(StoreError::NotFound(format!("sensor {id}")));
            }
            let removed = readings::delete_for_sensor(&tx, id)?;
            tx.execute("DELETE FROM sensors WHERE id = ?1", [id])?;
            tx.commit()?;
            Ok(removed)
        })
    }
}

pub(crate) fn exists(conn: &Connection, id: i64) -> Result<bool, StoreError> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sensors WHERE id = ?1)",
        [id],
        |row| row.get(0),
    )?)
}

fn select_one(conn: &Connection, id: i64) -> Result<SensorRow, StoreError> {
    let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} WHERE id = ?1"))?;
    let mut rows = stmt.query([id])?;
    match rows.next()? {
        Some(row) => row_to_sensor(row),
        None => Err(StoreError::NotFound(format!("sensor {id}"))),
    }
}

fn select_all(conn: &Connection) -> Result<Vec<SensorRow>, StoreError> {
    let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY id ASC"))?;
    let rows = stmt.query([])?;
    row_helpers::collect(rows, row_to_sensor)
}

fn row_to_sensor(row: &rusqlite::Row<'_>) -> Result<SensorRow, StoreError> {
    Ok(SensorRow {
        id: row_helpers::get(row, 0, "sensors", "id")?,
        name: row_helpers::get(row, 1, "sensors", "name")?,
        sensor_type: row_helpers::get(row, 2, "sensors", "type")?,
        location: row_helpers::get_opt(row, 3, "sensors", "location")?,
        unit: row_helpers::get_opt(row, 4, "sensors", "unit")?,
        created_at: row_helpers::get(row, 5, "sensors", "created_at")?,
    })
}
