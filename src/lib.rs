//! # cpdl-previewbot
//!
//! Add first-page score previews to CPDL (Choral Public Domain Library) work
//! pages.
//!
//! A work page lists one or more editions of a score, each with links to PDF
//! files. Browsing those is slow: every PDF has to be opened to see what the
//! edition looks like. This crate renders the top of the first page of each
//! PDF, uploads it to the wiki and inserts a `<gallery>` of those previews
//! into the page, just above `==General Information==`.
//!
//! ## Pipeline Overview
//!
//! ```text
//! page title
//!  │
//!  ├─ 1. Login    MediaWiki Action API session (cookies + login token)
//!  ├─ 2. Load     live page text, or a local snapshot
//!  ├─ 3. Extract  wikitext → node stream → editions with PDF links
//!  ├─ 4. Fetch    download each PDF once, cached by SHA-1
//!  ├─ 5. Render   pdftoppm (page 1, 1000px wide) → convert (crop 1000×500)
//!  ├─ 6. Upload   File:Preview-<sha1>.png, skipped when already present
//!  ├─ 7. Gallery  insert "==Score previews==" before "==General Information=="
//!  └─ 8. Save     edit the target page (skipped on a dry run)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cpdl_previewbot::{run, BotConfig, Credentials, ExternalTools, MediaWikiClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = BotConfig::builder("Ave Maria (Robert Parsons)")
//!         .target_page("User:PreviewBot/Sandbox")
//!         .build()?;
//!     let credentials = Credentials::load(std::path::Path::new("cpdl"))?;
//!
//!     let client = MediaWikiClient::new(&config)?;
//!     let tools = ExternalTools::from_config(&config);
//!     let output = run(&client, &tools, &credentials, &config).await?;
//!     eprintln!("{} previews, saved: {}", output.assets.len(), output.saved);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `previewbot` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! cpdl-previewbot = { version = "0.1", default-features = false }
//! ```
//!
//! ## External Tools
//!
//! Rendering shells out to `pdftoppm` (poppler-utils) and `convert`
//! (ImageMagick). Both must be on `PATH`, or be configured with
//! [`BotConfigBuilder::rasterizer`] and [`BotConfigBuilder::cropper`].

// ── Modules ──────────────────────────────────────────────────────────────

pub mod bot;
pub mod config;
pub mod edition;
pub mod error;
pub mod gallery;
pub mod markup;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod wiki;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use bot::run;
pub use config::{BotConfig, BotConfigBuilder, Credentials, PageSource};
pub use edition::{extract, Edition, EditionExtractor, ScoreInfo};
pub use error::BotError;
pub use gallery::{inject_gallery, GalleryEntry};
pub use markup::MarkupNode;
pub use output::{PreviewAsset, RunOutput, RunStats};
pub use pipeline::render::{ExternalTools, PreviewRenderer};
pub use progress::{BotProgressCallback, NoopProgressCallback, ProgressCallback};
pub use wiki::{FileDescriptor, MediaWikiClient, WikiClient};
