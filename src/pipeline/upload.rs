//! Preview upload: push `<sha1>.png` to the wiki under a hash-derived name.

use crate::error::BotError;
use crate::wiki::WikiClient;
use std::path::Path;
use tracing::info;

/// Wiki file name for the preview of the PDF with content hash `hash`.
pub fn preview_file_name(hash: &str) -> String {
    format!("Preview-{hash}.png")
}

/// File description page text for an uploaded preview.
pub fn upload_description(source_link: &str) -> String {
    format!(
        "== Summary ==\nPreview of the first page of [[{source_link}]], generated automatically.\n"
    )
}

/// Whether [`upload`] sent the file or found it already on the wiki.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    Uploaded,
    AlreadyPresent,
}

/// Upload `<workdir>/<hash>.png` as `File:Preview-<hash>.png`.
///
/// The name is derived from the source PDF's content hash, so an existing file
/// of that name already shows this exact preview and the upload is skipped.
pub async fn upload<C: WikiClient + ?Sized>(
    client: &C,
    workdir: &Path,
    hash: &str,
    source_link: &str,
) -> Result<UploadOutcome, BotError> {
    let remote_name = preview_file_name(hash);
    if client.file_descriptor(&remote_name).await?.is_some() {
        info!("File:{} already exists; not re-uploading", remote_name);
        return Ok(UploadOutcome::AlreadyPresent);
    }

    let local = super::render::png_path(workdir, hash);
    client
        .upload_file(&local, &remote_name, &upload_description(source_link))
        .await?;
    Ok(UploadOutcome::Uploaded)
}
