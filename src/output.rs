//! Results of a bot run.

use crate::edition::Edition;
use serde::Serialize;

/// One preview produced for one PDF link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreviewAsset {
    /// SHA-1 of the source PDF; stem of the local files and the remote name.
    pub content_hash: String,
    /// The link as written on the page, e.g. `Media:Foo.pdf`.
    pub source_link: String,
    /// Direct URL of the source PDF; the gallery image links here.
    pub remote_url: String,
    /// Caption from the owning edition.
    pub caption: String,
}

/// Counters and timings for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub editions: usize,
    pub pdf_links: usize,
    /// PDFs fetched over the network.
    pub downloads: usize,
    /// PDFs found in the work directory.
    pub cache_hits: usize,
    pub uploads: usize,
    /// Previews already present on the wiki.
    pub uploads_skipped: usize,
    pub fetch_duration_ms: u64,
    pub render_duration_ms: u64,
    pub upload_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Everything a completed run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutput {
    pub editions: Vec<Edition>,
    /// One per PDF link, in document order.
    pub assets: Vec<PreviewAsset>,
    /// Page text with the gallery inserted.
    pub text: String,
    /// Page the text was (or would have been) saved to.
    pub target_page: String,
    /// `false` for a dry run.
    pub saved: bool,
    pub stats: RunStats,
}
