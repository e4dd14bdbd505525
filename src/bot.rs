//! The bot driver: one page in, one page (plus uploaded previews) out.
//!
//! Steps run strictly in order and any error aborts the run. The page is
//! saved last, so a failure anywhere earlier leaves the wiki page untouched
//! (previews uploaded before the failure stay on the wiki and are reused by
//! the next run).

use crate::config::{BotConfig, Credentials, PageSource};
use crate::edition::{self, Edition};
use crate::error::BotError;
use crate::gallery::{self, GalleryEntry};
use crate::markup;
use crate::output::{PreviewAsset, RunOutput, RunStats};
use crate::pipeline::fetch;
use crate::pipeline::render::{self, PreviewRenderer};
use crate::pipeline::upload::{self, UploadOutcome};
use crate::wiki::WikiClient;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Run the bot against `config.page`.
///
/// `client` must not be logged in yet; the run starts by logging in with
/// `credentials`. With `config.save == false` everything except the final
/// save is performed.
///
/// # Errors
/// Any [`BotError`] from extraction, fetching, rendering, uploading, gallery
/// placement or saving. Nothing is retried.
pub async fn run<C, R>(
    client: &C,
    renderer: &R,
    credentials: &Credentials,
    config: &BotConfig,
) -> Result<RunOutput, BotError>
where
    C: WikiClient + ?Sized,
    R: PreviewRenderer + ?Sized,
{
    let total_start = Instant::now();
    let mut stats = RunStats::default();
    info!("Starting run for '{}'", config.page);

    // ── Step 1: Authenticate ─────────────────────────────────────────────
    client.login(credentials).await?;

    // ── Step 2: Load page text ───────────────────────────────────────────
    let text = load_page_text(client, config).await?;

    // ── Step 3: Extract editions ─────────────────────────────────────────
    let nodes = markup::parse(&text);
    let editions = edition::extract(&nodes)?;
    let total_files: usize = editions.iter().map(|e| e.pdf_links.len()).sum();
    stats.editions = editions.len();
    stats.pdf_links = total_files;
    info!(
        "Found {} editions with {} PDF links",
        editions.len(),
        total_files
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_start(editions.len(), total_files);
    }

    // ── Step 4: Fetch, render and upload each PDF ────────────────────────
    let mut assets = Vec::with_capacity(total_files);
    let mut index = 0;
    for edition in &editions {
        for link in &edition.pdf_links {
            index += 1;
            if let Some(ref cb) = config.progress_callback {
                cb.on_file_start(index, total_files, link);
            }

            match process_file(client, renderer, config, edition, link, &mut stats).await {
                Ok(asset) => {
                    if let Some(ref cb) = config.progress_callback {
                        cb.on_file_complete(index, total_files, link);
                    }
                    assets.push(asset);
                }
                Err(e) => {
                    if let Some(ref cb) = config.progress_callback {
                        cb.on_file_error(index, total_files, link, &e.to_string());
                    }
                    return Err(e);
                }
            }
        }
    }

    // ── Step 5: Insert the gallery ───────────────────────────────────────
    let target_page = config.target_page().to_string();
    if assets.is_empty() {
        warn!("No PDF links found on '{}'; leaving the page unchanged", config.page);
        stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
        if let Some(ref cb) = config.progress_callback {
            cb.on_run_complete(0, false);
        }
        return Ok(RunOutput {
            editions,
            assets,
            text,
            target_page,
            saved: false,
            stats,
        });
    }

    let entries = gallery_entries(&assets);
    let new_text = gallery::inject_gallery_sized(
        &text,
        &entries,
        config.gallery_width,
        config.gallery_height,
    )?;

    // ── Step 6: Save ─────────────────────────────────────────────────────
    if config.save {
        client
            .save_page(&target_page, &new_text, &config.summary)
            .await?;
    } else {
        info!("Dry run: not saving '{}'", target_page);
    }

    stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
    info!(
        "Run complete: {} previews ({} downloaded, {} uploaded), {}ms total",
        assets.len(),
        stats.downloads,
        stats.uploads,
        stats.total_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_complete(assets.len(), config.save);
    }

    Ok(RunOutput {
        editions,
        assets,
        text: new_text,
        target_page,
        saved: config.save,
        stats,
    })
}

/// Gallery lines for `assets`, in the same order.
pub fn gallery_entries(assets: &[PreviewAsset]) -> Vec<GalleryEntry> {
    assets
        .iter()
        .map(|a| GalleryEntry {
            file_name: upload::preview_file_name(&a.content_hash),
            caption: a.caption.clone(),
            link: a.remote_url.clone(),
        })
        .collect()
}

async fn load_page_text<C: WikiClient + ?Sized>(
    client: &C,
    config: &BotConfig,
) -> Result<String, BotError> {
    match config.page_source {
        PageSource::Live => client.page_text(&config.page).await,
        PageSource::Snapshot(ref path) => {
            let text = tokio::fs::read_to_string(path).await.map_err(|e| {
                BotError::SnapshotUnreadable {
                    path: path.clone(),
                    source: e,
                }
            })?;
            debug!("Read snapshot {} ({} bytes)", path.display(), text.len());
            Ok(text)
        }
    }
}

/// Fetch → render → upload for one link.
async fn process_file<C, R>(
    client: &C,
    renderer: &R,
    config: &BotConfig,
    edition: &Edition,
    link: &str,
    stats: &mut RunStats,
) -> Result<PreviewAsset, BotError>
where
    C: WikiClient + ?Sized,
    R: PreviewRenderer + ?Sized,
{
    let start = Instant::now();
    let source = fetch::fetch_source(client, link, &config.workdir).await?;
    if source.downloaded {
        stats.downloads += 1;
    } else {
        stats.cache_hits += 1;
    }
    stats.fetch_duration_ms += start.elapsed().as_millis() as u64;

    let start = Instant::now();
    render::convert(renderer, &config.workdir, source.content_hash()).await?;
    stats.render_duration_ms += start.elapsed().as_millis() as u64;

    let start = Instant::now();
    match upload::upload(client, &config.workdir, source.content_hash(), link).await? {
        UploadOutcome::Uploaded => stats.uploads += 1,
        UploadOutcome::AlreadyPresent => stats.uploads_skipped += 1,
    }
    stats.upload_duration_ms += start.elapsed().as_millis() as u64;

    Ok(PreviewAsset {
        content_hash: source.content_hash().to_string(),
        source_link: link.to_string(),
        remote_url: source.descriptor.url.clone(),
        caption: edition.caption(link),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gallery_entries_follow_asset_order() {
        let assets = vec![
            PreviewAsset {
                content_hash: "bbb".into(),
                source_link: "Media:B.pdf".into(),
                remote_url: "https://cpdl.org/images/B.pdf".into(),
                caption: "B.pdf".into(),
            },
            PreviewAsset {
                content_hash: "aaa".into(),
                source_link: "Media:A.pdf".into(),
                remote_url: "https://cpdl.org/images/A.pdf".into(),
                caption: "A4, 2 pages, 80 kB".into(),
            },
        ];
        let lines: Vec<String> = gallery_entries(&assets)
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(
            lines,
            vec![
                "File:Preview-bbb.png|B.pdf|link=https://cpdl.org/images/B.pdf",
                "File:Preview-aaa.png|A4, 2 pages, 80 kB|link=https://cpdl.org/images/A.pdf",
            ]
        );
    }
}
