//! Reading the channel files a script leaves behind.

use crate::errors::ReadError;
use serde_json::Value;
use std::path::Path;

/// Read the output channel and parse it as JSON.
///
/// Any well-formed JSON document is accepted. An empty file is rejected
/// as invalid rather than treated as `null`.
pub fn read_output(path: &Path) -> Result<Value, ReadError> {
    let bytes = std::fs::read(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ReadError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            ReadError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    serde_json::from_slice(&bytes).map_err(|source| ReadError::InvalidJson {
        path: path.to_path_buf(),
        source,
    })
}

/// Read the error channel verbatim. Returns `None` if it is missing or empty.
pub fn read_error_detail(path: &Path) -> Option<String> {
    let bytes = std::fs::read(path).ok()?;
    if bytes.is_empty() {
        return None;
    }
    Some(String::from_utf8_lossy(&bytes).into_owned())
}
