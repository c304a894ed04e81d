use std::collections::HashMap;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;
use crate::sensors;

/// A stored reading row. Never mutated after insert.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReadingRow {
    pub id: i64,
    pub sensor_id: i64,
    pub value: f64,
    pub unit: String,
    pub is_present: bool,
    pub timestamp: String,
}

/// A fully-populated reading ready for insert. Defaults are applied by the caller.
#[derive(Clone, Debug, PartialEq)]
pub struct NewReading {
    pub sensor_id: i64,
    pub value: f64,
    pub unit: String,
    pub is_present: bool,
}

const SELECT_COLUMNS: &str = "SELECT id, sensor_id, value, unit, is_present, timestamp FROM sensor_readings";

pub struct ReadingRepo {
    db: Database,
}

impl ReadingRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert a reading. The sensor must exist; the store assigns id and timestamp.
    #[instrument(skip(self, reading), fields(sensor_id = reading.sensor_id))]
    pub fn insert(&self, reading: &NewReading) -> Result<ReadingRow, StoreError> {
        self.db.with_conn(|conn| {
            if !sensors::exists(conn, reading.sensor_id)? {
                return Err(StoreError::NotFound(format!("sensor {}", reading.sensor_id)));
            }

            let now = row_helpers::now_timestamp();
            conn.execute(
                "INSERT INTO sensor_readings (sensor_id, value, unit, is_present, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    reading.sensor_id,
                    reading.value,
                    reading.unit,
                    reading.is_present,
                    now,
                ],
            )?;

            Ok(ReadingRow {
                id: conn.last_insert_rowid(),
                sensor_id: reading.sensor_id,
                value: reading.value,
                unit: reading.unit.clone(),
                is_present: reading.is_present,
                timestamp: now,
            })
        })
    }

    /// Readings for one sensor, newest first.
    #[instrument(skip(self))]
    pub fn list_for_sensor(
        &self,
        sensor_id: i64,
        limit: Option<u32>,
    ) -> Result<Vec<ReadingRow>, StoreError> {
        self.db.with_conn(|conn| select_for_sensor(conn, sensor_id, limit))
    }

    /// Delete every reading of a sensor. Returns the number of rows removed.
    #[instrument(skip(self))]
    pub fn delete_for_sensor(&self, sensor_id: i64) -> Result<usize, StoreError> {
        self.db.with_conn(|conn| delete_for_sensor(conn, sensor_id))
    }

    /// Total number of stored readings.
    pub fn count(&self) -> Result<i64, StoreError> {
        self.db.with_conn(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM sensor_readings", [], |row| row.get(0))?)
        })
    }
}

pub(crate) fn select_for_sensor(
    conn: &Connection,
    sensor_id: i64,
    limit: Option<u32>,
) -> Result<Vec<ReadingRow>, StoreError> {
    // SQLite treats a negative LIMIT as unbounded
    let limit = limit.map(i64::from).unwrap_or(-1);
    let mut stmt = conn.prepare(&format!(
        "{SELECT_COLUMNS} WHERE sensor_id = ?1 ORDER BY timestamp DESC, id DESC LIMIT ?2"
    ))?;
    let rows = stmt.query(rusqlite::params![sensor_id, limit])?;
    row_helpers::collect(rows, row_to_reading)
}

/// All readings grouped by sensor, each group newest first.
pub(crate) fn select_grouped(conn: &Connection) -> Result<HashMap<i64, Vec<ReadingRow>>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "{SELECT_COLUMNS} ORDER BY sensor_id ASC, timestamp DESC, id DESC"
    ))?;
    let rows = stmt.query([])?;
    let mut grouped: HashMap<i64, Vec<ReadingRow>> = HashMap::new();
    for reading in row_helpers::collect(rows, row_to_reading)? {
        grouped.entry(reading.sensor_id).or_default().push(reading);
    }
    Ok(grouped)
}

pub(crate) fn delete_for_sensor(conn: &Connection, sensor_id: i64) -> Result<usize, StoreError> {
    Ok(conn.execute(
        "DELETE FROM sensor_readings WHERE sensor_id = ?1",
        [sensor_id],
    )?)
}

fn row_to_reading(row: &rusqlite::Row<'_>) -> Result<ReadingRow, StoreError> {
    Ok(ReadingRow {
        id: row_helpers::get(row, 0, "sensor_readings", "id")?,
        sensor_id: row_helpers::get(row, 1, "sensor_readings", "sensor_id")?,
        value: row_helpers::get(row, 2, "sensor_readings", "value")?,
        unit: row_helpers::get(row, 3, "sensor_readings", "unit")?,
        is_present: row_helpers::get(row, 4, "sensor_readings", "is_present")?,
        timestamp: row_helpers::get(row, 5, "sensor_readings", "timestamp")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::{NewSensor, SensorRepo};

    fn setup() -> (Database, i64) {
        let db = Database::in_memory().unwrap();
        let sensor = SensorRepo::new(db.clone())
            .create(&NewSensor {
                name: "tank-1".into(),
                sensor_type: "temperature".into(),
                location: None,
                unit: Some("C".into()),
            })
            .unwrap();
        (db, sensor.id)
    }

    fn reading(sensor_id: i64, value: f64) -> NewReading {
        NewReading {
            sensor_id,
            value,
            unit: "C".into(),
            is_present: true,
        }
    }

    #[test]
    fn insert_assigns_id_and_timestamp() {
        let (db, sensor_id) = setup();
        let repo = ReadingRepo::new(db);
        let row = repo.insert(&reading(sensor_id, 36.6)).unwrap();
        assert_eq!(row.id, 1);
        assert_eq!(row.sensor_id, sensor_id);
        assert_eq!(row.value, 36.6);
        assert!(!row.timestamp.is_empty());
    }

    #[test]
    fn ids_are_monotonic() {
        let (db, sensor_id) = setup();
        let repo = ReadingRepo::new(db);
        let ids: Vec<i64> = (0..5)
            .map(|i| repo.insert(&reading(sensor_id, f64::from(i))).unwrap().id)
            .collect();
        for w in ids.windows(2) {
            assert!(w[0] < w[1]);
        }
    }

    #[test]
    fn ids_not_reused_after_delete() {
        let (db, sensor_id) = setup();
        let repo = ReadingRepo::new(db);
        let first = repo.insert(&reading(sensor_id, 1.0)).unwrap();
        repo.delete_for_sensor(sensor_id).unwrap();
        let second = repo.insert(&reading(sensor_id, 2.0)).unwrap();
        assert!(second.id > first.id);
    }

    #[test]
    fn insert_for_missing_sensor_is_not_found() {
        let (db, _) = setup();
        let repo = ReadingRepo::new(db);
        let result = repo.insert(&reading(999, 1.0));
        assert!(matches!(result, Err(StoreError::NotFound(msg)) if msg.contains("999")));
        assert_eq!(repo.count().unwrap(), 0);
    }

    #[test]
    fn list_is_newest_first_and_limited() {
        let (db, sensor_id) = setup();
        let repo = ReadingRepo::new(db);
        for i in 0..5 {
            repo.insert(&reading(sensor_id, f64::from(i))).unwrap();
        }

        let all = repo.list_for_sensor(sensor_id, None).unwrap();
        assert_eq!(all.len(), 5);
        assert_eq!(all[0].value, 4.0);
        assert_eq!(all[4].value, 0.0);

        let two = repo.list_for_sensor(sensor_id, Some(2)).unwrap();
        assert_eq!(two.len(), 2);
        assert_eq!(two[0].value, 4.0);
        assert_eq!(two[1].value, 3.0);
    }

    #[test]
    fn delete_for_sensor_counts_rows() {
        let (db, sensor_id) = setup();
        let repo = ReadingRepo::new(db);
        for i in 0..3 {
            repo.insert(&reading(sensor_id, f64::from(i))).unwrap();
        }
        assert_eq!(repo.delete_for_sensor(sensor_id).unwrap(), 3);
        assert_eq!(repo.delete_for_sensor(sensor_id).unwrap(), 0);
        assert!(repo.list_for_sensor(sensor_id, None).unwrap().is_empty());
    }

    #[test]
    fn is_present_round_trips_false() {
        let (db, sensor_id) = setup();
        let repo = ReadingRepo::new(db);
        let mut absent = reading(sensor_id, 0.0);
        absent.is_present = false;
        repo.insert(&absent).unwrap();
        let rows = repo.list_for_sensor(sensor_id, None).unwrap();
        assert!(!rows[0].is_present);
    }
}
