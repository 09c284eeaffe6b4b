//! Resource serialization for files.

use serde_json::Value;

use crate::error::{RepositoryError, RepositoryResult};
use crate::types::Resource;

use super::conventions::Encoding;

/// Converts resources to and from file bytes.
///
/// Failures are reported as `Internal` errors; the store wraps them with
/// the path and its own name.
pub trait ResourceCodec: Send + Sync {
    /// Serializes a resource.
    fn encode(&self, resource: &Resource) -> RepositoryResult<Vec<u8>>;

    /// Parses a resource.
    fn decode(&self, bytes: &[u8]) -> RepositoryResult<Resource>;

    /// File extension without the dot.
    fn extension(&self) -> &'static str;
}

const JSON_CODEC: &str = "json-codec";

/// Pretty-printed JSON.
///
/// A document without a `resourceType` whose `resource` member is a resource
/// (the shape of a bundle entry) decodes to that embedded resource.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl ResourceCodec for JsonCodec {
    fn encode(&self, resource: &Resource) -> RepositoryResult<Vec<u8>> {
        let mut bytes = serde_json::to_vec_pretty(resource.content()).map_err(|e| {
            RepositoryError::internal_with_source(JSON_CODEC, "unable to serialize resource", e)
        })?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    fn decode(&self, bytes: &[u8]) -> RepositoryResult<Resource> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| RepositoryError::internal_with_source(JSON_CODEC, "malformed JSON", e))?;
        Resource::from_json(unwrap_embedded(value)).map_err(|e| match e {
            RepositoryError::InvalidResource { message } => {
                RepositoryError::internal(JSON_CODEC, message)
            }
            other => other,
        })
    }

    fn extension(&self) -> &'static str {
        Encoding::Json.extension()
    }
}

fn unwrap_embedded(mut value: Value) -> Value {
    if value.get("resourceType").is_some() {
        return value;
    }
    let embedded = value
        .get("resource")
        .is_some_and(|r| r.get("resourceType").is_some_and(Value::is_string));
    if embedded {
        value["resource"].take()
    } else {
        value
    }
}
