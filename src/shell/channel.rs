//! One-shot temp files used to pass data between this process and a script.
//!
//! Each invocation allocates a fresh output channel (JSON written by the
//! script) and a fresh error channel (free text written on failure). The
//! files are created empty before launch and deleted when the
//! [`ChannelFile`] is released or dropped.

use crate::errors::ChannelError;
use std::path::Path;
use tempfile::TempPath;

/// Which side of the contract a channel file serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    /// The script writes its JSON result here.
    Output,
    /// The script may write failure detail here.
    Error,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Output => "output",
            ChannelKind::Error => "error",
        }
    }

    fn prefix(&self) -> &'static str {
        match self {
            ChannelKind::Output => "script-output-",
            ChannelKind::Error => "script-error-",
        }
    }

    fn suffix(&self) -> &'static str {
        match self {
            ChannelKind::Output => ".json",
            ChannelKind::Error => "",
        }
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A uniquely named temp file owned by a single invocation.
#[derive(Debug)]
pub struct ChannelFile {
    kind: ChannelKind,
    path: std::path::PathBuf,
    handle: Option<TempPath>,
}

impl ChannelFile {
    /// Create a new, empty channel file in the platform temp directory.
    pub fn allocate(kind: ChannelKind) -> Result<Self, ChannelError> {
        let file = tempfile::Builder::new()
            .prefix(kind.prefix())
            .suffix(kind.suffix())
            .tempfile()
            .map_err(|source| ChannelError {
                kind: kind.as_str(),
                source,
            })?;

        let handle = file.into_temp_path();
        let path = handle.to_path_buf();
        tracing::trace!(kind = %kind, path = %path.display(), "allocated channel file");

        Ok(Self {
            kind,
            path,
            handle: Some(handle),
        })
    }

    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    /// Absolute path handed to the script.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the file now. Calling this more than once is a no-op.
    pub fn release(&mut self) -> std::io::Result<()> {
        match self.handle.take().map(TempPath::close) {
            Some(Err(e)) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

impl Drop for ChannelFile {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            tracing::debug!(path = %self.path.display(), error = %e, "failed to remove channel file");
        }
    }
}
