//! Media fetching
//!
//! Resolves a report's media reference against the blob store and writes
//! the payload to a per-report scratch file. Scratch paths are write-once:
//! a file already sitting at the target path is reported as stale rather
//! than overwritten.

use super::store::BlobStore;
use crate::error::{PipelineError, PipelineResult};
use apollo_common::db::{MediaKind, Report};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Materializes report media into the scratch directory
pub struct MediaFetcher {
    blobs: Arc<dyn BlobStore>,
    scratch_dir: PathBuf,
}

impl MediaFetcher {
    pub fn new(blobs: Arc<dyn BlobStore>, scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            blobs,
            scratch_dir: scratch_dir.into(),
        }
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// `<scratch_dir>/report_<id>_<kind>.<ext>`
    pub fn scratch_path(&self, report: &Report) -> PathBuf {
        let kind = report.media.kind();
        self.scratch_dir.join(format!(
            "report_{}_{}.{}",
            report.report_id,
            kind.as_str(),
            kind.scratch_extension()
        ))
    }

    /// Fetch the report's blob and write it to its scratch path
    ///
    /// The returned guard deletes the file when dropped.
    pub async fn fetch(&self, report: &Report) -> PipelineResult<ScratchFile> {
        let media_id = report.media.media_id();
        let blob = self.blobs.get(media_id).await?.ok_or_else(|| {
            PipelineError::NotFound(format!(
                "{} blob {} for report {}",
                report.media.kind(),
                media_id,
                report.report_id
            ))
        })?;

        if blob.file_data.is_empty() {
            return Err(PipelineError::EmptyPayload { media_id });
        }

        tokio::fs::create_dir_all(&self.scratch_dir).await?;

        let path = self.scratch_path(report);
        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(PipelineError::StaleScratchFile(path));
            }
            Err(e) => return Err(e.into()),
        };

        // Guard first so a failed write still cleans up
        let scratch = ScratchFile {
            path,
            kind: report.media.kind(),
            content_type: blob.file_type,
        };

        file.write_all(&blob.file_data).await?;
        file.flush().await?;

        debug!(
            report_id = report.report_id,
            media_id,
            bytes = blob.file_data.len(),
            path = %scratch.path.display(),
            "Media materialized"
        );

        Ok(scratch)
    }
}

/// A materialized media payload, removed on drop
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
    kind: MediaKind,
    content_type: String,
}

impl ScratchFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    /// Content type recorded with the blob
    pub fn content_type(&self) -> &str {
        &self.content_type
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove scratch file {}: {}", self.path.display(), e),
        }
    }
}
