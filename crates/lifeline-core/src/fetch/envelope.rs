use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::transport::RawResponse;
use super::FetchError;

pub const DEMO_MESSAGE: &str = "Demo mode - using mock data";

/// Uniform result of every outbound call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchResponse<T = Value> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    /// HTTP status, or 0 when no response was received.
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Loose truthiness for server-supplied flags and messages.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn text_field(body: &Value, field: &str) -> Option<String> {
    let value = body.get(field).filter(|v| truthy(v))?;
    Some(match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}

impl FetchResponse<Value> {
    /// Synthetic success returned without touching the network.
    pub fn demo() -> Self {
        Self {
            success: true,
            data: None,
            error: None,
            status: 200,
            message: Some(DEMO_MESSAGE.to_string()),
        }
    }

    /// Interpret a completed exchange. A body `success` flag overrides the
    /// HTTP status; non-JSON bodies yield no data.
    pub fn from_raw(raw: &RawResponse) -> Self {
        let body: Option<Value> = serde_json::from_str(&raw.body).ok();

        let success = match &body {
            Some(Value::Object(map)) if map.contains_key("success") => truthy(&map["success"]),
            _ => raw.is_ok(),
        };

        let error = if success {
            None
        } else {
            let from_body = body
                .as_ref()
                .and_then(|b| text_field(b, "error").or_else(|| text_field(b, "message")));
            Some(from_body.unwrap_or_else(|| format!("{} {}", raw.status, raw.reason)))
        };

        let message = body.as_ref().and_then(|b| match b.get("message") {
            Some(Value::String(s)) => Some(s.clone()),
            _ => None,
        });

        Self {
            success,
            data: body,
            error,
            status: raw.status,
            message,
        }
    }

    /// Envelope for a request that ended in `err`. Status is 0 unless the
    /// transport reported an HTTP status.
    pub fn failure(err: &FetchError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(err.user_message()),
            status: err.status(),
            message: None,
        }
    }

    /// Convert the body into `T`. A JSON `null` body counts as no data.
    pub fn decode<T: DeserializeOwned>(self) -> Result<FetchResponse<T>, serde_json::Error> {
        let data = match self.data {
            None | Some(Value::Null) => None,
            Some(value) => Some(serde_json::from_value(value)?),
        };
        Ok(FetchResponse {
            success: self.success,
            data,
            error: self.error,
            status: self.status,
            message: self.message,
        })
    }
}

impl<T> FetchResponse<T> {
    /// `Ok(data)` on success, otherwise the failure as a `FetchError`.
    pub fn into_result(self) -> Result<Option<T>, FetchError> {
        if self.success {
            return Ok(self.data);
        }
        let message = self.error.unwrap_or_else(|| "Unknown error occurred".to_string());
        if self.status == 0 {
            Err(FetchError::Other(message))
        } else {
            Err(FetchError::http(self.status, &message))
        }
    }
}
