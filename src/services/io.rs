//! Filesystem collaborator
//!
//! Resolves source locators, reads and decodes sources, and writes artifacts to
//! fresh locators. Sources are only ever read; outputs are created with
//! create-new semantics so an existing file is never overwritten.

use crate::{
    error::{Result, SilhouetteError},
    imaging::codec,
    types::{PixelBuffer, SourceImage},
};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::debug;

const FILE_SCHEME: &str = "file://";

/// Resolve a locator to a local path
///
/// Accepts plain paths and `file://` URIs (with an empty or `localhost` host).
///
/// # Errors
/// `Decode` for empty locators and for any other URI scheme.
pub fn parse_locator(locator: &str) -> Result<PathBuf> {
    let locator = locator.trim();
    if locator.is_empty() {
        return Err(SilhouetteError::decode("empty source locator"));
    }

    if let Some(rest) = strip_prefix_ignore_case(locator, FILE_SCHEME) {
        let path = rest.strip_prefix("localhost").unwrap_or(rest);
        if !path.starts_with('/') {
            return Err(SilhouetteError::decode(format!(
                "'{locator}' is not a local-file reference"
            )));
        }
        return Ok(PathBuf::from(path));
    }

    if has_uri_scheme(locator) {
        return Err(SilhouetteError::decode(format!(
            "'{locator}' is not a local-file reference"
        )));
    }

    Ok(PathBuf::from(locator))
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &s[prefix.len()..])
}

/// `scheme://` with an RFC 3986 scheme of two or more characters
///
/// Single letters are left alone so `C:\...` style paths still count as paths.
fn has_uri_scheme(locator: &str) -> bool {
    locator.split_once("://").is_some_and(|(scheme, _)| {
        scheme.len() > 1
            && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    })
}

/// Read and decode the image at `locator`
///
/// # Errors
/// `Decode` when the locator is not local, the file cannot be read, or the bytes
/// are not a supported image.
pub async fn read_source(locator: &str) -> Result<SourceImage> {
    let path = parse_locator(locator)?;
    let bytes = tokio::fs::read(&path).await.map_err(|e| {
        SilhouetteError::decode(format!("Failed to read '{}': {}", path.display(), e))
    })?;
    debug!(path = %path.display(), bytes = bytes.len(), "Read source");

    let buffer = decode_blocking(bytes).await?;
    Ok(SourceImage::new(buffer, path))
}

async fn decode_blocking(bytes: Vec<u8>) -> Result<PixelBuffer> {
    tokio::task::spawn_blocking(move || codec::decode(&bytes))
        .await
        .map_err(|e| SilhouetteError::internal(format!("decode task failed: {e}")))?
}

/// Writes artifacts into one directory under fresh, unique names
#[derive(Debug, Clone)]
pub struct OutputStore {
    dir: PathBuf,
}

impl OutputStore {
    const MAX_NAME_ATTEMPTS: usize = 8;

    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `{prefix}{unix_millis}_{8 hex chars}.{extension}`
    #[must_use]
    pub fn fresh_name(prefix: &str, extension: &str) -> String {
        let millis = chrono::Utc::now().timestamp_millis();
        let id = uuid::Uuid::new_v4().simple().to_string();
        format!("{prefix}{millis}_{}.{extension}", &id[..8])
    }

    /// Write `bytes` to a new file and return its path
    ///
    /// # Errors
    /// `Io` when the directory cannot be created or the file cannot be written.
    pub async fn write_new(&self, prefix: &str, extension: &str, bytes: &[u8]) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| SilhouetteError::file_io_error("create output directory", &self.dir, &e))?;

        for _ in 0..Self::MAX_NAME_ATTEMPTS {
            let path = self.dir.join(Self::fresh_name(prefix, extension));
            let mut file = match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => file,
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(SilhouetteError::file_io_error("create output", &path, &e)),
            };

            file.write_all(bytes)
                .await
                .map_err(|e| SilhouetteError::file_io_error("write output", &path, &e))?;
            file.flush()
                .await
                .map_err(|e| SilhouetteError::file_io_error("flush output", &path, &e))?;

            debug!(path = %path.display(), bytes = bytes.len(), "Wrote output");
            return Ok(path);
        }

        Err(SilhouetteError::internal(format!(
            "could not find a free output name in '{}'",
            self.dir.display()
        )))
    }
}
