//! JSON Schema for registry sources.
//!
//! Structural problems (missing capability fields, wrong types) are reported with
//! the JSON pointer of the offending node before any semantic checks run.

use jsonschema::{Draft, JSONSchema};
use serde_json::{json, Value};

use crate::error::{Error, ErrorContext};
use crate::Result;

fn registry_schema() -> Value {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "title": "Model registry",
        "type": "object",
        "required": ["providers"],
        "properties": {
            "providers": {
                "type": "object",
                "additionalProperties": { "$ref": "#/definitions/provider" }
            }
        },
        "definitions": {
            "provider": {
                "type": "object",
                "required": ["name", "base_url", "supports_streaming", "models"],
                "properties": {
                    "name": { "type": "string", "minLength": 1 },
                    "base_url": { "type": "string", "minLength": 1 },
                    "uses_openai_protocol": { "type": "boolean" },
                    "protocol": { "enum": ["openai", "anthropic", "google", "dashscope"] },
                    "supports_streaming": { "type": "boolean" },
                    "supports_mcp": { "type": "boolean" },
                    "models": {
                        "type": "object",
                        "additionalProperties": { "$ref": "#/definitions/model" }
                    }
                }
            },
            "model": {
                "type": "object",
                "required": [
                    "name",
                    "max_tokens",
                    "supports_temperature",
                    "supports_streaming",
                    "supports_thinking"
                ],
                "properties": {
                    "name": { "type": "string", "minLength": 1 },
                    "max_tokens": { "type": "integer", "minimum": 1, "maximum": 4294967295u64 },
                    "supports_temperature": { "type": "boolean" },
                    "supports_streaming": { "type": "boolean" },
                    "supports_thinking": { "type": "boolean" },
                    "stream_only": { "type": "boolean" },
                    "is_reasoning_model": { "type": "boolean" }
                }
            }
        }
    })
}

/// Validate a raw registry document against the schema.
pub fn validate_document(doc: &Value) -> Result<()> {
    let schema_value = registry_schema();
    let schema = JSONSchema::options()
        .with_draft(Draft::Draft7)
        .compile(&schema_value)
        .map_err(|e| Error::configuration(format!("Failed to compile registry schema: {}", e)))?;

    if let Err(errors) = schema.validate(doc) {
        let mut first_path = None;
        let msgs: Vec<String> = errors
            .map(|e| {
                let path = e.instance_path.to_string();
                let path = if path.is_empty() { "/".to_string() } else { path };
                first_path.get_or_insert_with(|| path.clone());
                format!("{}: {}", path, e)
            })
            .collect();
        let mut ctx = ErrorContext::new()
            .with_details(msgs.join("; "))
            .with_source("registry_schema");
        if let Some(path) = first_path {
            ctx = ctx.with_field_path(path);
        }
        return Err(Error::configuration_with_context(
            "registry source failed schema validation",
            ctx,
        ));
    }
    Ok(())
}
