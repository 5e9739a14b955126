//! # Response Extraction
//!
//! The partner returns the same information in several shapes. Each
//! [`ResponseShape`] locates one candidate container object inside a
//! decoded body; extractors try the shapes in [`ResponseShape::ORDER`] and
//! the first match wins.
//!
//! ```text
//! TopLevelField         { "BATCH_ID": "7" }
//! NestedResponseObject  { "EIS_RESPONSE": { "BATCH_ID": "7" } }
//! EmbeddedJsonString    { "EIS_RESPONSE": "{\"BATCH_ID\":\"7\"}" }
//! ```

use std::borrow::Cow;

use dlc_core::BatchId;
use serde_json::Value;

use crate::error::GatewayError;

const RESPONSE_OBJECT: &str = "EIS_RESPONSE";
const BATCH_ID_KEYS: [&str; 3] = ["BATCH_ID", "BATCHID", "batchId"];
const COUNT_KEYS: [&str; 2] = ["NO_OF_BATCHES", "TOTAL_RECORDS"];
const RECORD_KEYS: [&str; 3] = ["DATA", "RECORDS", "DLC_DATA"];
const ERROR_CODE_KEYS: [&str; 2] = ["ERROR_CODE", "ERRORCODE"];
const ERROR_DESC_KEYS: [&str; 3] = ["ERROR_DESC", "ERROR_DESCRIPTION", "ERROR_MESSAGE"];
const SUCCESS_CODES: [&str; 4] = ["0", "00", "000", "SUCCESS"];
const NO_DATA_MARKERS: [&str; 2] = ["no data", "no record"];

/// Where in a response body to look.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    TopLevelField,
    NestedResponseObject,
    EmbeddedJsonString,
}

impl ResponseShape {
    /// Priority order.
    pub const ORDER: [ResponseShape; 3] = [
        Self::TopLevelField,
        Self::NestedResponseObject,
        Self::EmbeddedJsonString,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::TopLevelField => "top_level_field",
            Self::NestedResponseObject => "nested_response_object",
            Self::EmbeddedJsonString => "embedded_json_string",
        }
    }

    /// The container this shape points at, if the body has one.
    pub fn container<'a>(self, body: &'a Value) -> Option<Cow<'a, Value>> {
        match self {
            Self::TopLevelField => Some(Cow::Borrowed(body)),
            Self::NestedResponseObject => body
                .get(RESPONSE_OBJECT)
                .filter(|v| v.is_object())
                .map(Cow::Borrowed),
            Self::EmbeddedJsonString => body
                .get(RESPONSE_OBJECT)
                .and_then(Value::as_str)
                .and_then(|s| serde_json::from_str::<Value>(s).ok())
                .filter(|v| v.is_object() || v.is_array())
                .map(Cow::Owned),
        }
    }

    fn containers(body: &Value) -> impl Iterator<Item = (ResponseShape, Cow<'_, Value>)> {
        Self::ORDER
            .into_iter()
            .filter_map(move |shape| shape.container(body).map(|c| (shape, c)))
    }
}

/// What batch-id extraction found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchIdLookup {
    Found(BatchId),
    /// The partner reported nothing to fetch.
    NoBatches,
}

/// Application status carried inside an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplicationStatus {
    /// No error code, or a success code.
    Ok,
    /// An error code whose description says there is nothing to return.
    NoData { code: String, description: String },
    Error { code: String, description: String },
}

/// Extract the batch identifier, trying each shape in order.
pub fn extract_batch_id(body: &Value) -> Result<BatchIdLookup, GatewayError> {
    for (shape, container) in ResponseShape::containers(body) {
        if let Some(found) = batch_id_in(&container) {
            tracing::debug!(strategy = shape.as_str(), ?found, "batch id extracted");
            return Ok(found);
        }
    }
    Err(GatewayError::BatchIdNotFound {
        tried: ResponseShape::ORDER
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(", "),
    })
}

fn batch_id_in(container: &Value) -> Option<BatchIdLookup> {
    let object = container.as_object()?;
    for key in BATCH_ID_KEYS {
        if let Some(value) = object.get(key) {
            if let Some(lookup) = batch_id_value(value) {
                return Some(lookup);
            }
        }
    }
    COUNT_KEYS
        .iter()
        .filter_map(|key| object.get(*key))
        .any(is_zero)
        .then_some(BatchIdLookup::NoBatches)
}

fn batch_id_value(value: &Value) -> Option<BatchIdLookup> {
    match value {
        Value::Null => Some(BatchIdLookup::NoBatches),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() || s == "0" {
                Some(BatchIdLookup::NoBatches)
            } else {
                BatchId::new(s).ok().map(BatchIdLookup::Found)
            }
        }
        Value::Number(n) => {
            if is_zero(value) {
                Some(BatchIdLookup::NoBatches)
            } else {
                BatchId::new(n.to_string()).ok().map(BatchIdLookup::Found)
            }
        }
        Value::Array(items) => match items.as_slice() {
            [] => Some(BatchIdLookup::NoBatches),
            [single] => batch_id_value(single),
            _ => None,
        },
        Value::Bool(_) | Value::Object(_) => None,
    }
}

fn is_zero(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.trim().parse::<f64>().ok() == Some(0.0),
        _ => false,
    }
}

/// Extract the record list, trying each shape in order.
///
/// Returns `None` when no shape carries a recognisable list. A list can
/// itself be embedded as a JSON string.
pub fn extract_records(body: &Value) -> Option<Vec<Value>> {
    for (_, container) in ResponseShape::containers(body) {
        if let Value::Array(items) = container.as_ref() {
            return Some(items.clone());
        }
        let Some(object) = container.as_object() else {
            continue;
        };
        for key in RECORD_KEYS {
            match object.get(key) {
                Some(Value::Array(items)) => return Some(items.clone()),
                Some(Value::String(s)) => {
                    if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(s) {
                        return Some(items);
                    }
                }
                Some(Value::Null) => return Some(Vec::new()),
                _ => {}
            }
        }
    }
    None
}

/// Whether any container reports a zero record or batch count.
pub fn reports_zero_count(body: &Value) -> bool {
    ResponseShape::containers(body).any(|(_, container)| {
        container.as_object().is_some_and(|object| {
            COUNT_KEYS
                .iter()
                .filter_map(|key| object.get(*key))
                .any(is_zero)
        })
    })
}

/// Detect an application-level error code in a decoded body.
pub fn application_status(body: &Value) -> ApplicationStatus {
    for (_, container) in ResponseShape::containers(body) {
        let Some(object) = container.as_object() else {
            continue;
        };
        let Some(code) = ERROR_CODE_KEYS
            .iter()
            .find_map(|key| object.get(*key))
            .and_then(scalar_string)
        else {
            continue;
        };
        if code.is_empty() || SUCCESS_CODES.iter().any(|ok| ok.eq_ignore_ascii_case(&code)) {
            return ApplicationStatus::Ok;
        }

        let description = ERROR_DESC_KEYS
            .iter()
            .find_map(|key| object.get(*key))
            .and_then(scalar_string)
            .unwrap_or_default();
        let lowered = description.to_ascii_lowercase();
        return if NO_DATA_MARKERS.iter().any(|m| lowered.contains(m)) {
            ApplicationStatus::NoData { code, description }
        } else {
            ApplicationStatus::Error { code, description }
        };
    }
    ApplicationStatus::Ok
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
