// ============================================================================
// reelrun-core/src/events/json_handler.rs
// ============================================================================
//
// JSON EVENTS: Structured Output for Front Ends
//
// Writes one object per
// line to stdout for consumption by wrapper scripts and front ends.

use super::{Event, EventHandler};
use serde_json::json;
use std::io::{self, Write};
use std::sync::Mutex;

/// Event handler that outputs events as structured JSON lines
pub struct JsonEventHandler {
    output: Mutex<Box<dyn Write + Send>>,
    last_percent: Mutex<Option<u32>>,
}

impl JsonEventHandler {
    /// Create a new JSON handler that writes to stdout
    pub fn new() -> Self {
        Self::with_writer(Box::new(io::stdout()))
    }

    /// Create a new JSON handler with a custom writer
    pub fn with_writer(writer: Box<dyn Write + Send>) -> Self {
        Self {
            output: Mutex::new(writer),
            last_percent: Mutex::new(None),
        }
    }

    fn write_json(&self, value: serde_json::Value) {
        if let Ok(mut output) = self.output.lock() {
            if let Ok(json_str) = serde_json::to_string(&value) {
                let _ = writeln!(output, "{json_str}");
                let _ = output.flush();
            }
        }
    }

    /// Progress lines are only written when the whole-percent value changes.
    fn progress_changed(&self, percent: Option<f64>) -> bool {
        let whole = percent.map(|p| p.floor() as u32);
        match self.last_percent.lock() {
            Ok(mut last) => {
                if whole.is_some() && *last == whole {
                    return false;
                }
                *last = whole;
                true
            }
            Err(_) => true,
        }
    }
}

impl Default for JsonEventHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHandler for JsonEventHandler {
    fn handle(&self, event: &Event) {
        let timestamp = chrono::Utc::now().timestamp();

        let mut value = match event {
            Event::Progress(progress) => {
                if !self.progress_changed(progress.percent) {
                    return;
                }
                json!({ "type": "progress", "progress": progress })
            }
            other => match serde_json::to_value(other) {
                Ok(v) => v,
                Err(_) => return,
            },
        };

        if let Some(object) = value.as_object_mut() {
            object.insert("timestamp".to_string(), json!(timestamp));
        }
        self.write_json(value);
    }
}
