//! Integration tests driving `run` end to end against an in-memory wiki.
//!
//! The wiki is a `FakeWiki` holding pages and files in a mutex; rendering is
//! replaced by a renderer that writes a placeholder PNG. Nothing here touches
//! the network or needs poppler / ImageMagick installed.
//!
//! Run with:
//!   cargo test --test bot_run

use async_trait::async_trait;
use cpdl_previewbot::{
    run, BotConfig, BotError, BotProgressCallback, Credentials, FileDescriptor, PreviewRenderer,
    WikiClient,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ── Test helpers ─────────────────────────────────────────────────────────────

const PAGE: &str = "Ave verum corpus (William Byrd)";

const PAGE_TEXT: &str = "{{Composer|William Byrd}}\n\
==Music files==\n\
{{CPDLno|1001}} [[Media:Byrd-Ave-A4.pdf|{{pdf}}]] [[Media:Byrd-Ave-A4.mid|{{mid}}]]\n\
{{ScoreInfo|A4|3|116}}\n\
\n\
{{CPDLno|1002}} [[Media:Byrd-Ave-Letter.pdf|{{pdf}}]]\n\
\n\
==General Information==\n\
'''Title:''' ''Ave verum corpus''\n";

#[derive(Default)]
struct WikiState {
    pages: HashMap<String, String>,
    files: HashMap<String, (FileDescriptor, Vec<u8>)>,
    logins: usize,
    downloads: Vec<String>,
    uploads: Vec<String>,
    saves: Vec<(String, String, String)>,
}

struct FakeWiki {
    password: String,
    state: Mutex<WikiState>,
}

impl FakeWiki {
    /// A wiki holding [`PAGE`] and the two PDFs it links to.
    fn new() -> Self {
        let wiki = FakeWiki {
            password: "s3cret".into(),
            state: Mutex::new(WikiState::default()),
        };
        wiki.add_page(PAGE, PAGE_TEXT);
        wiki.add_file("Byrd-Ave-A4.pdf", "aaa111");
        wiki.add_file("Byrd-Ave-Letter.pdf", "bbb222");
        wiki
    }

    fn add_page(&self, title: &str, text: &str) {
        self.state
            .lock()
            .unwrap()
            .pages
            .insert(title.to_string(), text.to_string());
    }

    fn add_file(&self, name: &str, sha1: &str) {
        let descriptor = FileDescriptor {
            name: name.to_string(),
            sha1: sha1.to_string(),
            url: file_url(name),
        };
        self.state.lock().unwrap().files.insert(
            name.to_string(),
            (descriptor, format!("%PDF-1.4 {name}").into_bytes()),
        );
    }

    fn state(&self) -> std::sync::MutexGuard<'_, WikiState> {
        self.state.lock().unwrap()
    }
}

fn file_url(name: &str) -> String {
    format!("https://www.cpdl.org/wiki/images/{name}")
}

#[async_trait]
impl WikiClient for FakeWiki {
    async fn login(&self, credentials: &Credentials) -> Result<(), BotError> {
        if credentials.password != self.password {
            return Err(BotError::LoginFailed {
                reason: "WrongPass".into(),
            });
        }
        self.state().logins += 1;
        Ok(())
    }

    async fn page_text(&self, title: &str) -> Result<String, BotError> {
        self.state()
            .pages
            .get(title)
            .cloned()
            .ok_or_else(|| BotError::ApiError {
                action: "query".into(),
                code: "missingtitle".into(),
                info: format!("page '{title}' does not exist"),
            })
    }

    async fn save_page(&self, title: &str, text: &str, summary: &str) -> Result<(), BotError> {
        let mut state = self.state();
        state.pages.insert(title.to_string(), text.to_string());
        state
            .saves
            .push((title.to_string(), text.to_string(), summary.to_string()));
        Ok(())
    }

    async fn file_descriptor(&self, file_name: &str) -> Result<Option<FileDescriptor>, BotError> {
        Ok(self.state().files.get(file_name).map(|(d, _)| d.clone()))
    }

    async fn download_file(&self, file: &FileDescriptor, dest: &Path) -> Result<(), BotError> {
        let bytes = {
            let mut state = self.state();
            state.downloads.push(file.name.clone());
            state.files[&file.name].1.clone()
        };
        std::fs::write(dest, bytes).unwrap();
        Ok(())
    }

    async fn upload_file(
        &self,
        local: &Path,
        remote_name: &str,
        _description: &str,
    ) -> Result<(), BotError> {
        let bytes = std::fs::read(local).unwrap();
        let mut state = self.state();
        state.uploads.push(remote_name.to_string());
        let descriptor = FileDescriptor {
            name: remote_name.to_string(),
            sha1: "ccc333".into(),
            url: file_url(remote_name),
        };
        state
            .files
            .insert(remote_name.to_string(), (descriptor, bytes));
        Ok(())
    }
}

/// Writes a placeholder PNG instead of shelling out.
#[derive(Default)]
struct FakeRenderer {
    calls: AtomicUsize,
}

#[async_trait]
impl PreviewRenderer for FakeRenderer {
    async fn render(&self, pdf: &Path, png: &Path) -> Result<(), BotError> {
        assert!(pdf.exists(), "renderer called before {} was fetched", pdf.display());
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::fs::write(png, b"\x89PNG placeholder").unwrap();
        Ok(())
    }
}

/// Records every progress event as a short string.
#[derive(Default)]
struct RecordingCallback {
    events: Mutex<Vec<String>>,
}

impl BotProgressCallback for RecordingCallback {
    fn on_run_start(&self, editions: usize, total_files: usize) {
        self.events
            .lock()
            .unwrap()
            .push(format!("start {editions} {total_files}"));
    }
    fn on_file_start(&self, index: usize, total: usize, link: &str) {
        self.events
            .lock()
            .unwrap()
            .push(format!("file {index}/{total} {link}"));
    }
    fn on_file_complete(&self, index: usize, total: usize, _link: &str) {
        self.events
            .lock()
            .unwrap()
            .push(format!("done {index}/{total}"));
    }
    fn on_file_error(&self, index: usize, total: usize, _link: &str, _error: &str) {
        self.events
            .lock()
            .unwrap()
            .push(format!("error {index}/{total}"));
    }
    fn on_run_complete(&self, total_files: usize, saved: bool) {
        self.events
            .lock()
            .unwrap()
            .push(format!("complete {total_files} {saved}"));
    }
}

fn credentials() -> Credentials {
    Credentials {
        username: "PreviewBot".into(),
        password: "s3cret".into(),
    }
}

fn config(workdir: &Path) -> BotConfig {
    BotConfig::builder(PAGE).workdir(workdir).build().unwrap()
}

fn expected_gallery() -> String {
    format!(
        "==Score previews==\n\
         <gallery widths=500 heights=250>\n\
         File:Preview-aaa111.png|A4, 3 pages, 116 kB|link={}\n\
         File:Preview-bbb222.png|Byrd-Ave-Letter.pdf|link={}\n\
         </gallery>\n",
        file_url("Byrd-Ave-A4.pdf"),
        file_url("Byrd-Ave-Letter.pdf"),
    )
}

// ── Full runs ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_run_inserts_gallery_and_saves() {
    let dir = tempfile::tempdir().unwrap();
    let wiki = FakeWiki::new();
    let renderer = FakeRenderer::default();

    let output = run(&wiki, &renderer, &credentials(), &config(dir.path()))
        .await
        .unwrap();

    let expected = PAGE_TEXT.replace(
        "==General Information==",
        &format!("{}==General Information==", expected_gallery()),
    );
    assert_eq!(output.text, expected);
    assert!(output.saved);
    assert_eq!(output.target_page, PAGE);

    let state = wiki.state();
    assert_eq!(state.logins, 1);
    assert_eq!(state.saves.len(), 1);
    let (title, text, summary) = &state.saves[0];
    assert_eq!(title, PAGE);
    assert_eq!(text, &expected);
    assert_eq!(summary, "Adding score previews");
    assert_eq!(
        state.uploads,
        vec!["Preview-aaa111.png", "Preview-bbb222.png"]
    );
    assert_eq!(renderer.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_run_reports_editions_assets_and_stats() {
    let dir = tempfile::tempdir().unwrap();
    let wiki = FakeWiki::new();

    let output = run(&wiki, &FakeRenderer::default(), &credentials(), &config(dir.path()))
        .await
        .unwrap();

    assert_eq!(output.editions.len(), 2);
    assert_eq!(output.editions[0].pdf_links, vec!["Media:Byrd-Ave-A4.pdf"]);
    assert_eq!(output.editions[1].score_info, None);

    assert_eq!(output.assets.len(), 2);
    assert_eq!(output.assets[0].content_hash, "aaa111");
    assert_eq!(output.assets[0].source_link, "Media:Byrd-Ave-A4.pdf");
    assert_eq!(output.assets[1].caption, "Byrd-Ave-Letter.pdf");

    let stats = &output.stats;
    assert_eq!(stats.editions, 2);
    assert_eq!(stats.pdf_links, 2);
    assert_eq!(stats.downloads, 2);
    assert_eq!(stats.cache_hits, 0);
    assert_eq!(stats.uploads, 2);
    assert_eq!(stats.uploads_skipped, 0);

    assert!(dir.path().join("aaa111.pdf").exists());
    assert!(dir.path().join("bbb222.png").exists());
    assert!(serde_json::to_string(&output).is_ok());
}

#[tokio::test]
async fn test_second_run_reuses_cache_and_skips_uploads() {
    let dir = tempfile::tempdir().unwrap();
    let wiki = FakeWiki::new();
    let renderer = FakeRenderer::default();
    let cfg = BotConfig::builder(PAGE)
        .workdir(dir.path())
        .target_page("User:PreviewBot/Sandbox")
        .build()
        .unwrap();

    run(&wiki, &renderer, &credentials(), &cfg).await.unwrap();
    let second = run(&wiki, &renderer, &credentials(), &cfg).await.unwrap();

    assert_eq!(second.stats.downloads, 0);
    assert_eq!(second.stats.cache_hits, 2);
    assert_eq!(second.stats.uploads, 0);
    assert_eq!(second.stats.uploads_skipped, 2);

    let state = wiki.state();
    assert_eq!(state.downloads.len(), 2);
    assert_eq!(state.uploads.len(), 2);
    assert_eq!(state.saves.len(), 2);
}

#[tokio::test]
async fn test_same_file_in_two_editions_is_downloaded_once() {
    let dir = tempfile::tempdir().unwrap();
    let wiki = FakeWiki::new();
    wiki.add_page(
        "Shared",
        "==Music files==\n\
         {{CPDLno|1}} [[Media:Byrd-Ave-A4.pdf|{{pdf}}]]\n\
         {{CPDLno|2}} [[Media:Byrd-Ave-A4.pdf|{{pdf}}]]\n\
         ==General Information==\n",
    );
    let cfg = BotConfig::builder("Shared")
        .workdir(dir.path())
        .build()
        .unwrap();

    let output = run(&wiki, &FakeRenderer::default(), &credentials(), &cfg)
        .await
        .unwrap();

    assert_eq!(output.assets.len(), 2);
    assert_eq!(output.stats.downloads, 1);
    assert_eq!(output.stats.cache_hits, 1);
    assert_eq!(output.stats.uploads, 1);
    assert_eq!(output.stats.uploads_skipped, 1);
    assert_eq!(output.text.matches("File:Preview-aaa111.png").count(), 2);
}

#[tokio::test]
async fn test_dry_run_does_not_save() {
    let dir = tempfile::tempdir().unwrap();
    let wiki = FakeWiki::new();
    let cfg = BotConfig::builder(PAGE)
        .workdir(dir.path())
        .save(false)
        .build()
        .unwrap();

    let output = run(&wiki, &FakeRenderer::default(), &credentials(), &cfg)
        .await
        .unwrap();

    assert!(!output.saved);
    assert!(output.text.contains(&expected_gallery()));
    let state = wiki.state();
    assert!(state.saves.is_empty());
    assert_eq!(state.pages[PAGE], PAGE_TEXT);
}

#[tokio::test]
async fn test_saves_to_target_page() {
    let dir = tempfile::tempdir().unwrap();
    let wiki = FakeWiki::new();
    let cfg = BotConfig::builder(PAGE)
        .workdir(dir.path())
        .target_page("User:PreviewBot/Sandbox")
        .summary("Preview test")
        .build()
        .unwrap();

    run(&wiki, &FakeRenderer::default(), &credentials(), &cfg)
        .await
        .unwrap();

    let state = wiki.state();
    assert_eq!(state.saves[0].0, "User:PreviewBot/Sandbox");
    assert_eq!(state.saves[0].2, "Preview test");
    assert_eq!(state.pages[PAGE], PAGE_TEXT);
}

#[tokio::test]
async fn test_snapshot_replaces_live_page() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = dir.path().join("snapshot.txt");
    std::fs::write(&snapshot, PAGE_TEXT).unwrap();

    let wiki = FakeWiki::new();
    let cfg = BotConfig::builder("Not On The Wiki")
        .workdir(dir.path().join("work"))
        .snapshot(&snapshot)
        .target_page("User:PreviewBot/Sandbox")
        .build()
        .unwrap();

    let output = run(&wiki, &FakeRenderer::default(), &credentials(), &cfg)
        .await
        .unwrap();
    assert_eq!(output.assets.len(), 2);
    assert_eq!(wiki.state().saves[0].0, "User:PreviewBot/Sandbox");
}

#[tokio::test]
async fn test_page_without_editions_is_left_alone() {
    let dir = tempfile::tempdir().unwrap();
    let wiki = FakeWiki::new();
    wiki.add_page("Plain", "Just text.\n==General Information==\n");
    let cfg = BotConfig::builder("Plain")
        .workdir(dir.path())
        .build()
        .unwrap();

    let output = run(&wiki, &FakeRenderer::default(), &credentials(), &cfg)
        .await
        .unwrap();

    assert!(output.editions.is_empty());
    assert!(!output.saved);
    assert_eq!(output.text, "Just text.\n==General Information==\n");
    assert!(wiki.state().saves.is_empty());
}

#[tokio::test]
async fn test_progress_events_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let wiki = FakeWiki::new();
    let recorder = Arc::new(RecordingCallback::default());
    let cfg = BotConfig::builder(PAGE)
        .workdir(dir.path())
        .progress_callback(recorder.clone())
        .build()
        .unwrap();

    run(&wiki, &FakeRenderer::default(), &credentials(), &cfg)
        .await
        .unwrap();

    assert_eq!(
        *recorder.events.lock().unwrap(),
        vec![
            "start 2 2",
            "file 1/2 Media:Byrd-Ave-A4.pdf",
            "done 1/2",
            "file 2/2 Media:Byrd-Ave-Letter.pdf",
            "done 2/2",
            "complete 2 true",
        ]
    );
}

// ── Failures ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_login_failure_stops_before_reading() {
    let dir = tempfile::tempdir().unwrap();
    let wiki = FakeWiki::new();
    let bad = Credentials {
        username: "PreviewBot".into(),
        password: "wrong".into(),
    };

    let err = run(&wiki, &FakeRenderer::default(), &bad, &config(dir.path()))
        .await
        .unwrap_err();
    assert!(matches!(err, BotError::LoginFailed { .. }), "got {err:?}");
    assert!(wiki.state().downloads.is_empty());
}

#[tokio::test]
async fn test_missing_marker_uploads_but_does_not_save() {
    let dir = tempfile::tempdir().unwrap();
    let wiki = FakeWiki::new();
    wiki.add_page(
        "No Marker",
        "==Music files==\n{{CPDLno|1}} [[Media:Byrd-Ave-A4.pdf|{{pdf}}]]\n==Other==\n",
    );
    let cfg = BotConfig::builder("No Marker")
        .workdir(dir.path())
        .build()
        .unwrap();

    let err = run(&wiki, &FakeRenderer::default(), &credentials(), &cfg)
        .await
        .unwrap_err();
    assert!(matches!(err, BotError::MarkerNotFound { .. }), "got {err:?}");

    let state = wiki.state();
    assert_eq!(state.uploads, vec!["Preview-aaa111.png"]);
    assert!(state.saves.is_empty());
}

#[tokio::test]
async fn test_unsupported_reference_aborts_run() {
    let dir = tempfile::tempdir().unwrap();
    let wiki = FakeWiki::new();
    wiki.add_page(
        "Bad Link",
        "==Music files==\n{{CPDLno|1}} [[Byrd-Ave-A4.pdf|score.pdf]]\n==General Information==\n",
    );
    let recorder = Arc::new(RecordingCallback::default());
    let cfg = BotConfig::builder("Bad Link")
        .workdir(dir.path())
        .progress_callback(recorder.clone())
        .build()
        .unwrap();

    let err = run(&wiki, &FakeRenderer::default(), &credentials(), &cfg)
        .await
        .unwrap_err();
    match err {
        BotError::UnsupportedReference { link } => assert_eq!(link, "Byrd-Ave-A4.pdf"),
        other => panic!("expected UnsupportedReference, got {other:?}"),
    }
    assert!(wiki.state().saves.is_empty());
    assert_eq!(recorder.events.lock().unwrap().last().unwrap(), "error 1/1");
}

#[tokio::test]
async fn test_missing_source_file_aborts_run() {
    let dir = tempfile::tempdir().unwrap();
    let wiki = FakeWiki::new();
    wiki.add_page(
        "Gone",
        "==Music files==\n{{CPDLno|1}} [[Media:Gone.pdf|Gone.pdf]]\n==General Information==\n",
    );
    let cfg = BotConfig::builder("Gone").workdir(dir.path()).build().unwrap();

    let err = run(&wiki, &FakeRenderer::default(), &credentials(), &cfg)
        .await
        .unwrap_err();
    assert!(
        matches!(err, BotError::SourceFileMissing { ref file } if file == "Gone.pdf"),
        "got {err:?}"
    );
}

#[tokio::test]
async fn test_unusable_content_hash_aborts_before_download() {
    let dir = tempfile::tempdir().unwrap();
    let wiki = FakeWiki::new();
    wiki.add_file("Escape.pdf", "../../etc");
    wiki.add_page(
        "Escape",
        "==Music files==\n{{CPDLno|1}} [[Media:Escape.pdf|{{pdf}}]]\n==General Information==\n",
    );
    let cfg = BotConfig::builder("Escape").workdir(dir.path()).build().unwrap();

    let err = run(&wiki, &FakeRenderer::default(), &credentials(), &cfg)
        .await
        .unwrap_err();
    match err {
        BotError::UnusableContentHash { file, hash } => {
            assert_eq!(file, "Escape.pdf");
            assert_eq!(hash, "../../etc");
        }
        other => panic!("expected UnusableContentHash, got {other:?}"),
    }
    assert!(wiki.state().downloads.is_empty());
}

#[tokio::test]
async fn test_structural_error_stops_before_fetching() {
    let dir = tempfile::tempdir().unwrap();
    let wiki = FakeWiki::new();
    wiki.add_page(
        "Orphan",
        "==Music files==\n[[Media:Byrd-Ave-A4.pdf|{{pdf}}]]\n{{CPDLno|1}}\n==General Information==\n",
    );
    let cfg = BotConfig::builder("Orphan").workdir(dir.path()).build().unwrap();

    let err = run(&wiki, &FakeRenderer::default(), &credentials(), &cfg)
        .await
        .unwrap_err();
    assert!(matches!(err, BotError::NoCurrentEdition { .. }), "got {err:?}");
    let state = wiki.state();
    assert!(state.downloads.is_empty());
    assert!(state.uploads.is_empty());
}

#[tokio::test]
async fn test_unreadable_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = BotConfig::builder(PAGE)
        .workdir(dir.path())
        .snapshot(dir.path().join("missing.txt"))
        .build()
        .unwrap();

    let err = run(&FakeWiki::new(), &FakeRenderer::default(), &credentials(), &cfg)
        .await
        .unwrap_err();
    assert!(matches!(err, BotError::SnapshotUnreadable { .. }), "got {err:?}");
}

#[test]
fn test_noop_callback_is_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<cpdl_previewbot::NoopProgressCallback>();
    assert_send_sync::<cpdl_previewbot::MediaWikiClient>();
}
