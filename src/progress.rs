//! Progress-callback trait for per-file run events.
//!
//! Inject an [`Arc<dyn BotProgressCallback>`] via
//! [`crate::config::BotConfigBuilder::progress_callback`] to be told as the
//! bot works through each PDF link. The CLI uses it to drive a progress bar;
//! the library never prints anything itself.
//!
//! # Example
//!
//! ```rust
//! use cpdl_previewbot::{BotConfig, BotProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     uploaded: AtomicUsize,
//! }
//!
//! impl BotProgressCallback for CountingCallback {
//!     fn on_file_complete(&self, index: usize, total: usize, link: &str) {
//!         self.uploaded.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{index}/{total} {link}");
//!     }
//! }
//!
//! let config = BotConfig::builder("Ave Maria (Robert Parsons)")
//!     .progress_callback(Arc::new(CountingCallback { uploaded: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the driver as it processes each PDF link.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. `index` is 1-based and counts links across all
/// editions in document order.
pub trait BotProgressCallback: Send + Sync {
    /// Called once extraction is done, before the first download.
    fn on_run_start(&self, editions: usize, total_files: usize) {
        let _ = (editions, total_files);
    }

    /// Called before a link is fetched.
    fn on_file_start(&self, index: usize, total: usize, link: &str) {
        let _ = (index, total, link);
    }

    /// Called once a preview for `link` is on the wiki.
    fn on_file_complete(&self, index: usize, total: usize, link: &str) {
        let _ = (index, total, link);
    }

    /// Called when processing `link` failed; the run aborts right after.
    fn on_file_error(&self, index: usize, total: usize, link: &str, error: &str) {
        let _ = (index, total, link, error);
    }

    /// Called after the page text has been assembled (and saved, unless dry run).
    fn on_run_complete(&self, total_files: usize, saved: bool) {
        let _ = (total_files, saved);
    }
}

/// A no-op implementation; the default when no callback is configured.
pub struct NoopProgressCallback;

impl BotProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::BotConfig`].
pub type ProgressCallback = Arc<dyn BotProgressCallback>;
