//! Source fetch: resolve a `Media:` link and download the PDF by content hash.
//!
//! The work directory doubles as a cache. A PDF is stored as `<sha1>.pdf`
//! using the hash the wiki reports for the file, so a second run (or a second
//! link to the same file) finds it on disk and skips the download. Downloads
//! go to a temp file in the same directory and are renamed into place only
//! once complete, so an interrupted run never leaves a truncated PDF that a
//! later run would mistake for a cache hit.

use crate::error::BotError;
use crate::wiki::{FileDescriptor, WikiClient};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Prefix of links that point straight at a file in the media repository.
pub const MEDIA_PREFIX: &str = "Media:";

/// A source PDF present in the work directory.
#[derive(Debug, Clone)]
pub struct SourcePdf {
    /// The link as written on the page, e.g. `Media:Foo.pdf`.
    pub link: String,
    pub descriptor: FileDescriptor,
    /// `<workdir>/<sha1>.pdf`
    pub path: PathBuf,
    /// `false` when the file was already on disk.
    pub downloaded: bool,
}

impl SourcePdf {
    pub fn content_hash(&self) -> &str {
        &self.descriptor.sha1
    }
}

/// File name behind a `Media:` link.
pub fn media_file_name(link: &str) -> Result<&str, BotError> {
    link.strip_prefix(MEDIA_PREFIX)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| BotError::UnsupportedReference {
            link: link.to_string(),
        })
}

/// `<workdir>/<hash>.pdf`
pub fn pdf_path(workdir: &Path, hash: &str) -> PathBuf {
    workdir.join(format!("{hash}.pdf"))
}

/// Resolve `link` on the wiki and make sure its PDF is in `workdir`.
pub async fn fetch_source<C: WikiClient + ?Sized>(
    client: &C,
    link: &str,
    workdir: &Path,
) -> Result<SourcePdf, BotError> {
    let file_name = media_file_name(link)?;
    let descriptor = client
        .file_descriptor(file_name)
        .await?
        .ok_or_else(|| BotError::SourceFileMissing {
            file: file_name.to_string(),
        })?;

    // The hash becomes a file name; refuse anything that could escape workdir.
    if descriptor.sha1.is_empty() || !descriptor.sha1.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(BotError::UnusableContentHash {
            file: file_name.to_string(),
            hash: descriptor.sha1,
        });
    }

    let path = pdf_path(workdir, &descriptor.sha1);
    let cached = tokio::fs::try_exists(&path)
        .await
        .map_err(|e| BotError::io(&path, e))?;
    if cached {
        debug!("Cache hit for {} → {}", link, path.display());
        return Ok(SourcePdf {
            link: link.to_string(),
            descriptor,
            path,
            downloaded: false,
        });
    }

    tokio::fs::create_dir_all(workdir)
        .await
        .map_err(|e| BotError::io(workdir, e))?;
    let partial = tempfile::Builder::new()
        .prefix(".download-")
        .suffix(".part")
        .tempfile_in(workdir)
        .map_err(|e| BotError::io(workdir, e))?;

    client.download_file(&descriptor, partial.path()).await?;
    partial
        .persist(&path)
        .map_err(|e| BotError::io(&path, e.error))?;
    info!("Downloaded {} → {}", link, path.display());

    Ok(SourcePdf {
        link: link.to_string(),
        descriptor,
        path,
        downloaded: true,
    })
}
