//! Loading of attachment content kept in sibling files.
//!
//! A `Library` may reference its source (typically CQL) through a
//! `content[].url` relative to the resource file instead of embedding it.
//! On read the referenced file is loaded and embedded as base64 `data`.

use std::fs;
use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;
use tracing::trace;

use crate::error::{RepositoryError, RepositoryResult};
use crate::types::Resource;

/// Resource types whose attachments may live in side files.
const SIDE_CONTENT_TYPES: [&str; 1] = ["Library"];

/// Embeds side-file content into the resource's attachments.
///
/// `resource_path` is the file the resource was read from; attachment urls
/// resolve against its directory. A referenced file that cannot be read is
/// an `Internal` error.
pub(crate) fn embed_side_content(
    store: &str,
    resource: &mut Resource,
    resource_path: &Path,
) -> RepositoryResult<()> {
    if !SIDE_CONTENT_TYPES.iter().any(|t| *t == resource.resource_type()) {
        return Ok(());
    }
    let base = resource_path.parent().unwrap_or_else(|| Path::new("."));

    let Some(attachments) = resource
        .content_mut()
        .get_mut("content")
        .and_then(Value::as_array_mut)
    else {
        return Ok(());
    };

    for attachment in attachments.iter_mut() {
        let Some(url) = side_file_url(attachment) else {
            continue;
        };
        let side_path = base.join(&url);
        let bytes = fs::read(&side_path).map_err(|e| {
            RepositoryError::internal_with_source(
                store,
                format!(
                    "unable to read content '{}' referenced by {}",
                    side_path.display(),
                    resource_path.display()
                ),
                e,
            )
        })?;
        trace!(path = %side_path.display(), bytes = bytes.len(), "Embedded side content");
        attachment["data"] = Value::String(STANDARD.encode(bytes));
    }

    Ok(())
}

/// Returns the url of an attachment that points at a local file and carries
/// no inline data.
fn side_file_url(attachment: &Value) -> Option<String> {
    if attachment.get("data").is_some() {
        return None;
    }
    let url = attachment.get("url")?.as_str()?;
    is_relative(url).then(|| url.to_string())
}

fn is_relative(url: &str) -> bool {
    !url.is_empty()
        && !url.contains("://")
        && !url.starts_with('/')
        && !url.starts_with('#')
        && !url.starts_with("urn:")
}
