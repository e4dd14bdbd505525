//! Per-file stages turning a `Media:` link into a preview on the wiki.
//!
//! Each submodule implements exactly one step, run strictly in sequence for
//! every PDF link in document order.
//!
//! ## Data Flow
//!
//! ```text
//! fetch ──────────▶ render ─────────────────▶ upload
//! (Media: link      (pdftoppm page 1 →         (File:Preview-<sha1>.png)
//!  → <sha1>.pdf)     convert -crop → <sha1>.png)
//! ```
//!
//! 1. [`fetch`]: resolve the link to a wiki file and download it into the
//!    work directory, named by content hash; skipped when already on disk
//! 2. [`render`]: rasterise page one and crop the top of it with external
//!    tools behind the [`render::PreviewRenderer`] seam
//! 3. [`upload`]: push the PNG back to the wiki under a name derived from
//!    the hash, unless a file of that name already exists

pub mod fetch;
pub mod render;
pub mod upload;
