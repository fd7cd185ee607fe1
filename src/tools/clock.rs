//! Built-in `current_time` tool

use chrono::{DateTime, FixedOffset, Utc};
use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::{Value, json};

use super::Tool;

/// Largest offset accepted, matching real-world zones (UTC-12 to UTC+14)
const MAX_OFFSET_MINUTES: i64 = 14 * 60;

/// Reports the current time in UTC and optionally at a fixed offset
pub struct CurrentTimeTool;

impl CurrentTimeTool {
    pub const NAME: &'static str = "current_time";

    fn render(now: DateTime<Utc>, input: &Value) -> Result<Value, String> {
        let mut output = json!({ "utc": now.to_rfc3339() });

        let Some(raw) = input.get("utcOffsetMinutes").filter(|v| !v.is_null()) else {
            return Ok(output);
        };
        let minutes = raw
            .as_i64()
            .ok_or_else(|| format!("utcOffsetMinutes must be an integer, got {}", raw))?;
        if minutes.abs() > MAX_OFFSET_MINUTES {
            return Err(format!("utcOffsetMinutes out of range: {}", minutes));
        }
        let offset = FixedOffset::east_opt((minutes * 60) as i32)
            .ok_or_else(|| format!("utcOffsetMinutes out of range: {}", minutes))?;

        output["local"] = Value::String(now.with_timezone(&offset).to_rfc3339());
        output["utcOffsetMinutes"] = json!(minutes);
        Ok(output)
    }
}

impl Tool for CurrentTimeTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Get the current date and time. Optionally pass utcOffsetMinutes to also get the local time at that offset."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "utcOffsetMinutes": {
                    "type": "integer",
                    "description": "Offset from UTC in minutes, e.g. 120 for UTC+2"
                }
            }
        })
    }

    fn call(&self, input: Value) -> BoxFuture<'static, Result<Value, String>> {
        async move { Self::render(Utc::now(), &input) }.boxed()
    }
}
