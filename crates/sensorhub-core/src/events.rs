use serde::{Deserialize, Serialize};

/// Event pushed to live-update connections.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveEvent {
    NewReading(ReadingEvent),
}

/// Payload of a `new_reading` event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReadingEvent {
    pub id: i64,
    pub sensor_id: i64,
    pub value: f64,
    pub unit: String,
    pub is_present: bool,
    /// RFC 3339, assigned by the store.
    pub timestamp: String,
}

impl LiveEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::NewReading(_) => "new_reading",
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
