pub mod database;
pub mod error;
pub mod process_data;
pub mod readings;
pub mod row_helpers;
pub mod schema;
pub mod sensors;

pub use database::Database;
pub use error::StoreError;
pub use process_data::{NewProcessRecord, ProcessDataRepo, ProcessRecordRow};
pub use readings::{NewReading, ReadingRepo, ReadingRow};
pub use sensors::{NewSensor, SensorRepo, SensorRow, SensorWithReadings};
