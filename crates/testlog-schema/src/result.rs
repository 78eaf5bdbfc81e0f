use crate::outcome::Outcome;
use serde::{Deserialize, Serialize};

/// One test result as produced by a results-file parser.
///
/// This is the input record of the ingestion pipeline. It is a closed type on purpose:
/// parsers convert whatever they read (JUnit XML, JSON, ...) into this shape.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParsedTestResult {
    pub name: String,
    /// Dotted package/class path. May be absent for flat test suites.
    #[serde(default)]
    pub package: Option<String>,
    pub outcome: Outcome,
    #[serde(default)]
    pub message: Option<String>,
    /// Raw duration in milliseconds, as reported. Not yet validated.
    #[serde(default)]
    pub duration_ms: i64,
    #[serde(default)]
    pub reruns: u32,
    #[serde(default)]
    pub artifacts: Vec<ArtifactPayload>,
    #[serde(default)]
    pub message_offsets: Vec<MessageOffset>,
}

/// An artifact attached to a result, still in its transport encoding.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactPayload {
    pub name: String,
    /// Media type tag, e.g. `text` or `image/png`.
    #[serde(rename = "type")]
    pub media_type: String,
    /// Standard base64 of the payload bytes.
    pub base64: String,
}

/// A window into the batch's source artifact (label, start offset, length).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageOffset {
    pub label: String,
    pub start_offset: u64,
    pub length: u64,
}

impl ParsedTestResult {
    pub fn new(package: impl Into<String>, name: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            name: name.into(),
            package: Some(package.into()),
            outcome,
            message: None,
            duration_ms: 0,
            reruns: 0,
            artifacts: Vec::new(),
            message_offsets: Vec::new(),
        }
    }
}
