/// SQL DDL for the sensorhub database.
/// WAL mode + foreign keys enabled at connection time.
pub const SCHEMA_VERSION: u32 = 1;

/// `AUTOINCREMENT` keeps ids monotonic even after rows are deleted.
pub const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS sensors (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    type TEXT NOT NULL,
    location TEXT,
    unit TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS sensor_readings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    sensor_id INTEGER NOT NULL REFERENCES sensors(id),
    value REAL NOT NULL,
    unit TEXT NOT NULL,
    is_present INTEGER NOT NULL DEFAULT 1,
    timestamp TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS biogas_data (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    day REAL NOT NULL,
    vs_remaining_kg REAL NOT NULL,
    vs_degraded_kg REAL NOT NULL,
    cum_ch4_m3 REAL NOT NULL,
    approx_biogas_m3 REAL NOT NULL,
    vfa_g REAL NOT NULL,
    nahco3_g_safety REAL NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_readings_sensor ON sensor_readings(sensor_id);
CREATE INDEX IF NOT EXISTS idx_readings_sensor_ts ON sensor_readings(sensor_id, timestamp);

CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);
"#;

pub const PRAGMAS: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
PRAGMA busy_timeout = 5000;
PRAGMA synchronous = NORMAL;
"#;
