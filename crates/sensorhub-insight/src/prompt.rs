use serde::Serialize;

use sensorhub_core::provider::InsightRequest;

const SYSTEM_PROMPT: &str = "You are an AI assistant specialized in analyzing IoT sensor data.
Your task is to provide clear, concise insights about the readings.
Focus on:
- Trends over time
- Anomalies or unusual values
- Possible causes or real-world implications
- Suggestions for monitoring or action";

/// The subset of a reading that goes into a prompt.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PromptReading {
    pub value: f64,
    pub unit: String,
    pub timestamp: String,
}

/// Build the prompt pair for one sensor. Readings are expected oldest first.
pub fn build_request(sensor_id: i64, readings: &[PromptReading], temperature: f64) -> InsightRequest {
    // Vec<PromptReading> of plain fields cannot fail to serialize
    let data = serde_json::to_string_pretty(readings).unwrap_or_else(|_| "[]".into());
    let user_prompt = format!(
        "Analyze the following readings from sensor ID {sensor_id}:

{data}

Please summarize key insights in plain English.
Format the response as a short JSON object with:
- summary: high-level description
- trends: patterns noticed
- anomalies: any unusual values
- recommendations: next steps"
    );

    InsightRequest::new(SYSTEM_PROMPT, user_prompt).with_temperature(temperature)
}
