use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{ImagenError, Result};

/// How the provider should return generated images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    /// Images inline in the JSON body as base64 text.
    B64Json,
}

/// Body of `POST {base_url}/images/generations`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    pub model: String,
    pub prompt: String,
    #[serde(rename = "n")]
    pub image_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

/// What a single generation event reports in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationOutcome {
    Started,
    Saved,
    Retrying,
    TransportFailed,
    ResponseInvalid,
    ParseFailed,
    PersistenceFailed,
    ConfigInvalid,
}

impl GenerationOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationOutcome::Started => "started",
            GenerationOutcome::Saved => "saved",
            GenerationOutcome::Retrying => "retrying",
            GenerationOutcome::TransportFailed => "transport_failed",
            GenerationOutcome::ResponseInvalid => "response_invalid",
            GenerationOutcome::ParseFailed => "parse_failed",
            GenerationOutcome::PersistenceFailed => "persistence_failed",
            GenerationOutcome::ConfigInvalid => "config_invalid",
        }
    }

    pub fn is_failure(&self) -> bool {
        !matches!(
            self,
            GenerationOutcome::Started | GenerationOutcome::Saved | GenerationOutcome::Retrying
        )
    }
}

impl fmt::Display for GenerationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pull up to `limit` base64 payloads out of a generation response body.
///
/// A body that parses but has no usable `data` entries is a
/// [`ImagenError::ResponseShape`]; malformed JSON or fields of the wrong type
/// are [`ImagenError::Parse`]. Every kept entry is validated before any is
/// returned, so callers never decode a partially valid response.
pub fn extract_image_payloads(body: &str, limit: usize) -> Result<Vec<String>> {
    let parsed: Value =
        serde_json::from_str(body).map_err(|e| ImagenError::Parse(e.to_string()))?;

    let object = parsed
        .as_object()
        .ok_or_else(|| ImagenError::Parse("response body is not a JSON object".into()))?;

    let entries = match object.get("data") {
        None | Some(Value::Null) => {
            return Err(ImagenError::ResponseShape {
                body: parsed.to_string(),
            })
        }
        Some(Value::Array(entries)) if entries.is_empty() => {
            return Err(ImagenError::ResponseShape {
                body: parsed.to_string(),
            })
        }
        Some(Value::Array(entries)) => entries,
        Some(other) => {
            return Err(ImagenError::Parse(format!(
                "`data` should be a list, got {}",
                json_type(other)
            )))
        }
    };

    let mut payloads = Vec::with_capacity(entries.len().min(limit));
    for (index, entry) in entries.iter().take(limit).enumerate() {
        let entry = entry.as_object().ok_or_else(|| {
            ImagenError::Parse(format!(
                "`data[{}]` should be an object, got {}",
                index,
                json_type(entry)
            ))
        })?;

        match entry.get("b64_json") {
            Some(Value::String(b64)) if !b64.is_empty() => payloads.push(b64.clone()),
            None | Some(Value::Null) | Some(Value::String(_)) => {
                return Err(ImagenError::ResponseShape {
                    body: parsed.to_string(),
                })
            }
            Some(other) => {
                return Err(ImagenError::Parse(format!(
                    "`data[{}].b64_json` should be a string, got {}",
                    index,
                    json_type(other)
                )))
            }
        }
    }

    Ok(payloads)
}

pub fn decode_image(b64: &str) -> Result<Vec<u8>> {
    let compact: String = b64.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| ImagenError::Parse(format!("invalid base64 image data: {}", e)))
}

/// File for image `index` (0-based) of a request for `requested` images.
///
/// A single-image request writes to `base` unchanged; otherwise the stem gets
/// a `_{index + 1}` suffix, keeping the extension.
pub fn image_output_path(base: &Path, index: usize, requested: u32) -> PathBuf {
    if requested <= 1 {
        return base.to_path_buf();
    }

    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = match base.extension() {
        Some(ext) => format!("{}_{}.{}", stem, index + 1, ext.to_string_lossy()),
        None => format!("{}_{}", stem, index + 1),
    };
    base.with_file_name(file_name)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
