//! Messages exchanged with the dispatcher.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Message type tag of a verdict report.
pub const RESULT_REPORT: u32 = 1003;

/// Dispatcher-assigned run id.
///
/// Opaque to the judger: whatever JSON value arrives is echoed back
/// unchanged in the verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Value);

impl RunId {
    pub fn new(value: impl Into<Value>) -> Self {
        Self(value.into())
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Value::String(s) => f.write_str(s),
            other => write!(f, "{}", other),
        }
    }
}

/// A submission to be judged, as decoded from one inbound frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionJob {
    pub runid: RunId,
    /// Problem identifier on the remote judge.
    #[serde(deserialize_with = "string_or_number")]
    pub vid: String,
    /// Dispatcher language code, translated by the backend before submit.
    #[serde(deserialize_with = "string_or_number")]
    pub language: String,
    pub source: String,
}

/// Verdict reported back for exactly one [`SubmissionJob`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    #[serde(rename = "type")]
    pub kind: u32,
    pub runid: RunId,
    pub memory_used: String,
    pub time_used: String,
    pub result: String,
    pub remote_runid: String,
    pub compile_info: String,
}

/// The dispatcher is loose about whether codes are strings or numbers.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(text) => text,
        Raw::Number(number) => number.to_string(),
    })
}
