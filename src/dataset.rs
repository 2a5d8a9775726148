//! Reading and writing the explanation dataset and the reference text.

use std::path::Path;

use serde_json::Value;

use crate::error::{Error, Result};

/// Parse a JSON document from `path`.
pub async fn load_json(path: &Path) -> Result<Value> {
    let bytes = tokio::fs::read(path).await.map_err(|e| Error::io(path, e))?;
    serde_json::from_slice(&bytes).map_err(|e| Error::json(path, e))
}

/// Read the whole reference text as raw bytes.
pub async fn load_reference(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path).await.map_err(|e| Error::io(path, e))
}

/// Render items as 2-space indented JSON, non-ASCII kept literal.
pub fn render(items: &[Value]) -> Result<String> {
    serde_json::to_string_pretty(items).map_err(|e| Error::json("<output>", e))
}

/// Write items to `path` in one piece.
pub async fn write_items(path: &Path, items: &[Value]) -> Result<()> {
    let text = render(items)?;
    tokio::fs::write(path, text)
        .await
        .map_err(|e| Error::io(path, e))
}
