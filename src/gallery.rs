//! Gallery injection: insert a `<gallery>` of previews into the page text.
//!
//! The block goes immediately before the `==General Information==` heading
//! and nothing else in the page is touched. Removing the inserted lines gives
//! back the original text byte for byte.

use crate::error::BotError;
use std::fmt;
use tracing::warn;

/// Line the gallery is inserted before (compared after trimming).
pub const GALLERY_MARKER: &str = "==General Information==";

/// Heading of the inserted section.
pub const PREVIEW_HEADING: &str = "==Score previews==";

/// Default display size of gallery images.
pub const DEFAULT_GALLERY_SIZE: (u32, u32) = (500, 250);

/// One image line of a gallery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GalleryEntry {
    /// Wiki file name without namespace.
    pub file_name: String,
    pub caption: String,
    /// Where clicking the image leads.
    pub link: String,
}

impl fmt::Display for GalleryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "File:{}|{}|link={}", self.file_name, self.caption, self.link)
    }
}

/// The lines of the inserted block, heading through `</gallery>`.
pub fn gallery_block(entries: &[GalleryEntry], width: u32, height: u32) -> Vec<String> {
    let mut block = Vec::with_capacity(entries.len() + 3);
    block.push(PREVIEW_HEADING.to_string());
    block.push(format!("<gallery widths={width} heights={height}>"));
    block.extend(entries.iter().map(ToString::to_string));
    block.push("</gallery>".to_string());
    block
}

/// Insert a default-sized gallery of `entries` before [`GALLERY_MARKER`].
pub fn inject_gallery(page_text: &str, entries: &[GalleryEntry]) -> Result<String, BotError> {
    let (width, height) = DEFAULT_GALLERY_SIZE;
    inject_gallery_sized(page_text, entries, width, height)
}

/// Insert a gallery with the given image display size.
///
/// Fails with [`BotError::MarkerNotFound`] when no line equals
/// [`GALLERY_MARKER`]; the text is never appended to as a fallback.
pub fn inject_gallery_sized(
    page_text: &str,
    entries: &[GalleryEntry],
    width: u32,
    height: u32,
) -> Result<String, BotError> {
    let lines: Vec<&str> = page_text.split('\n').collect();
    let at = lines
        .iter()
        .position(|line| line.trim() == GALLERY_MARKER)
        .ok_or_else(|| BotError::MarkerNotFound {
            marker: GALLERY_MARKER.to_string(),
        })?;

    if lines.iter().any(|line| line.trim() == PREVIEW_HEADING) {
        warn!("Page already has a {} section; adding another", PREVIEW_HEADING);
    }

    let block = gallery_block(entries, width, height);
    let mut out: Vec<&str> = Vec::with_capacity(lines.len() + block.len());
    out.extend_from_slice(&lines[..at]);
    out.extend(block.iter().map(String::as_str));
    out.extend_from_slice(&lines[at..]);
    Ok(out.join("\n"))
}
