// ── Wire framing ──
//
// One JSON document per text frame, in both directions.

use serde::Serialize;
use serde_json::Value;

use crate::error::Error;

/// Parse an inbound text frame.
pub fn parse(text: &str) -> Result<Value, Error> {
    Ok(serde_json::from_str(text)?)
}

/// Serialize an outbound message into a text frame.
pub fn encode<T: Serialize + ?Sized>(message: &T) -> Result<String, Error> {
    Ok(serde_json::to_string(message)?)
}

/// The `type` discriminator carried by camera-board frames, if any.
pub fn discriminator(frame: &Value) -> Option<&str> {
    frame.get("type").and_then(Value::as_str)
}
