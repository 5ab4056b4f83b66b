use anyhow::{anyhow, Context, Result};
use bytes::Bytes;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Handle to a media body held by a [`BlobStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobRef {
    pub id: u64,
    pub mime: String,
    pub len: usize,
}

impl BlobRef {
    pub fn uri(&self) -> String {
        format!("blob:{}", self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlobError {
    Empty,
    TooLarge { len: usize, limit: usize },
}

impl std::fmt::Display for BlobError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlobError::Empty => write!(f, "response body is empty"),
            BlobError::TooLarge { len, limit } => write!(
                f,
                "response body is {} but previews are limited to {}",
                format_bytes(*len as u64),
                format_bytes(*limit as u64)
            ),
        }
    }
}

/// In-memory media bodies addressable by `blob:<id>`.
#[derive(Debug)]
pub struct BlobStore {
    next_id: u64,
    blobs: HashMap<u64, Bytes>,
    max_bytes: usize,
}

impl BlobStore {
    pub fn new(max_bytes: usize) -> Self {
        BlobStore {
            next_id: 1,
            blobs: HashMap::new(),
            max_bytes,
        }
    }

    pub fn create(&mut self, mime: &str, body: Bytes) -> Result<BlobRef, BlobError> {
        if body.is_empty() {
            return Err(BlobError::Empty);
        }
        if body.len() > self.max_bytes {
            return Err(BlobError::TooLarge {
                len: body.len(),
                limit: self.max_bytes,
            });
        }

        let id = self.next_id;
        self.next_id += 1;
        let blob = BlobRef {
            id,
            mime: mime.to_string(),
            len: body.len(),
        };
        self.blobs.insert(id, body);
        Ok(blob)
    }

    pub fn get(&self, blob: &BlobRef) -> Option<&Bytes> {
        self.blobs.get(&blob.id)
    }

    pub fn release(&mut self, blob: &BlobRef) -> bool {
        self.blobs.remove(&blob.id).is_some()
    }

    pub fn live(&self) -> usize {
        self.blobs.len()
    }

    /// Writes the blob to `dir/<stem>.<ext>`, the extension guessed from its MIME type.
    pub async fn save(&self, blob: &BlobRef, dir: &Path, stem: &str) -> Result<PathBuf> {
        let body = self
            .get(blob)
            .ok_or_else(|| anyhow!("{} has already been released", blob.uri()))?;

        let ext = mime_guess::get_mime_extensions_str(&blob.mime)
            .and_then(|exts| exts.first())
            .copied()
            .unwrap_or("bin");
        let path = dir.join(format!("{}.{}", sanitize_file_stem(stem), ext));

        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("failed to create {}", dir.display()))?;
        tokio::fs::write(&path, body)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }
}

pub fn sanitize_file_stem(stem: &str) -> String {
    let cleaned: String = stem
        .trim()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "download".to_string()
    } else {
        cleaned
    }
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
