use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

/// One row of the auxiliary digester process table. Unrelated to sensors.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProcessRecordRow {
    pub id: i64,
    #[serde(flatten)]
    pub record: NewProcessRecord,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewProcessRecord {
    pub day: f64,
    #[serde(alias = "VS_remaining_kg")]
    pub vs_remaining_kg: f64,
    #[serde(alias = "VS_degraded_kg")]
    pub vs_degraded_kg: f64,
    #[serde(alias = "cum_CH4_m3")]
    pub cum_ch4_m3: f64,
    pub approx_biogas_m3: f64,
    #[serde(alias = "VFA_g")]
    pub vfa_g: f64,
    #[serde(alias = "NaHCO3_g_safety")]
    pub nahco3_g_safety: f64,
}

pub struct ProcessDataRepo {
    db: Database,
}

impl ProcessDataRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    #[instrument(skip(self, record), fields(day = record.day))]
    pub fn insert(&self, record: &NewProcessRecord) -> Result<ProcessRecordRow, StoreError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO biogas_data
                 (day, vs_remaining_kg, vs_degraded_kg, cum_ch4_m3, approx_biogas_m3, vfa_g, nahco3_g_safety)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    record.day,
                    record.vs_remaining_kg,
                    record.vs_degraded_kg,
                    record.cum_ch4_m3,
                    record.approx_biogas_m3,
                    record.vfa_g,
                    record.nahco3_g_safety,
                ],
            )?;
            Ok(ProcessRecordRow {
                id: conn.last_insert_rowid(),
                record: record.clone(),
            })
        })
    }

    /// Page through records in natural (id) order.
    #[instrument(skip(self))]
    pub fn list(&self, skip: u32, limit: u32) -> Result<Vec<ProcessRecordRow>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, day, vs_remaining_kg, vs_degraded_kg, cum_ch4_m3, approx_biogas_m3, vfa_g, nahco3_g_safety
                 FROM biogas_data ORDER BY id ASC LIMIT ?1 OFFSET ?2",
            )?;
            let rows = stmt.query(rusqlite::params![limit, skip])?;
            row_helpers::collect(rows, row_to_record)
        })
    }

    pub fn count(&self) -> Result<i64, StoreError> {
        self.db.with_conn(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM biogas_data", [], |row| row.get(0))?)
        })
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> Result<ProcessRecordRow, StoreError> {
    const T: &str = "biogas_data";
    Ok(ProcessRecordRow {
        id: row_helpers::get(row, 0, T, "id")?,
        record: NewProcessRecord {
            day: row_helpers::get(row, 1, T, "day")?,
            vs_remaining_kg: row_helpers::get(row, 2, T, "vs_remaining_kg")?,
            vs_degraded_kg: row_helpers::get(row, 3, T, "vs_degraded_kg")?,
            cum_ch4_m3: row_helpers::get(row, 4, T, "cum_ch4_m3")?,
            approx_biogas_m3: row_helpers::get(row, 5, T, "approx_biogas_m3")?,
            vfa_g: row_helpers::get(row, 6, T, "vfa_g")?,
            nahco3_g_safety: row_helpers::get(row, 7, T, "nahco3_g_safety")?,
        },
    })
}
