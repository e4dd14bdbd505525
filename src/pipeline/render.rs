//! Preview rendering: first PDF page → fixed-width PNG → top crop.
//!
//! Rendering is delegated to two command-line tools run as subprocesses:
//!
//! ```text
//! pdftoppm -png -f 1 -l 1 -singlefile -scale-to-x 1000 -scale-to-y -1 <sha1>.pdf <sha1>-full
//! convert <sha1>-full.png -crop 1000x500+0+0 <sha1>.png
//! ```
//!
//! A non-zero exit from either tool aborts the run with its stderr attached.
//! Intermediate files are left in the work directory. The crop keeps the
//! top-left region as-is: no re-paging, no centring.

use crate::config::BotConfig;
use crate::error::BotError;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

/// Turns a PDF into a preview PNG.
#[async_trait]
pub trait PreviewRenderer: Send + Sync {
    /// Render the first page of `pdf` and write the cropped preview to `png`.
    async fn render(&self, pdf: &Path, png: &Path) -> Result<(), BotError>;
}

/// `<workdir>/<hash>.png`
pub fn png_path(workdir: &Path, hash: &str) -> PathBuf {
    workdir.join(format!("{hash}.png"))
}

/// Render `<workdir>/<hash>.pdf` into `<workdir>/<hash>.png`.
pub async fn convert<R: PreviewRenderer + ?Sized>(
    renderer: &R,
    workdir: &Path,
    hash: &str,
) -> Result<PathBuf, BotError> {
    let pdf = super::fetch::pdf_path(workdir, hash);
    let png = png_path(workdir, hash);
    renderer.render(&pdf, &png).await?;
    Ok(png)
}

/// [`PreviewRenderer`] backed by poppler's `pdftoppm` and ImageMagick's `convert`.
#[derive(Debug, Clone)]
pub struct ExternalTools {
    pub rasterizer: String,
    pub cropper: String,
    pub raster_width: u32,
    pub crop_width: u32,
    pub crop_height: u32,
}

impl ExternalTools {
    pub fn from_config(config: &BotConfig) -> Self {
        Self {
            rasterizer: config.rasterizer.clone(),
            cropper: config.cropper.clone(),
            raster_width: config.raster_width,
            crop_width: config.crop_width,
            crop_height: config.crop_height,
        }
    }

    /// Arguments for rendering page one of `pdf` to `<stem>.png`.
    fn rasterize_args(&self, pdf: &Path, stem: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = [
            "-png",
            "-f",
            "1",
            "-l",
            "1",
            "-singlefile",
            "-scale-to-x",
        ]
        .into_iter()
        .map(OsString::from)
        .collect();
        args.push(self.raster_width.to_string().into());
        args.push("-scale-to-y".into());
        args.push("-1".into());
        args.push(pdf.into());
        args.push(stem.into());
        args
    }

    /// Arguments for cropping the top-left `crop_width`×`crop_height` region.
    fn crop_args(&self, input: &Path, output: &Path) -> Vec<OsString> {
        vec![
            input.into(),
            "-crop".into(),
            format!("{}x{}+0+0", self.crop_width, self.crop_height).into(),
            output.into(),
        ]
    }
}

#[async_trait]
impl PreviewRenderer for ExternalTools {
    async fn render(&self, pdf: &Path, png: &Path) -> Result<(), BotError> {
        let stem_name = png
            .file_stem()
            .map(|s| format!("{}-full", s.to_string_lossy()))
            .unwrap_or_else(|| "preview-full".to_string());
        let stem = png.with_file_name(stem_name);
        let full = stem.with_extension("png");

        run_tool(&self.rasterizer, &self.rasterize_args(pdf, &stem)).await?;
        run_tool(&self.cropper, &self.crop_args(&full, png)).await?;

        let (width, height) = preview_dimensions(png).await?;
        info!("Rendered {} → {} ({}x{})", pdf.display(), png.display(), width, height);
        Ok(())
    }
}

/// Run `program` to completion; non-zero exit becomes [`BotError::ToolFailed`].
async fn run_tool(program: &str, args: &[OsString]) -> Result<(), BotError> {
    debug!("Running {} {:?}", program, args);
    let output = Command::new(program)
        .args(args)
        .output()
        .await
        .map_err(|e| BotError::ToolSpawnFailed {
            tool: program.to_string(),
            source: e,
        })?;

    if !output.status.success() {
        return Err(BotError::ToolFailed {
            tool: program.to_string(),
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}

/// Read the PNG header back; a tool that "succeeds" without writing a
/// decodable image is caught here rather than at upload time.
async fn preview_dimensions(png: &Path) -> Result<(u32, u32), BotError> {
    let path = png.to_path_buf();
    tokio::task::spawn_blocking(move || image::image_dimensions(&path))
        .await
        .map_err(|e| BotError::InvalidPreview {
            path: png.to_path_buf(),
            detail: format!("dimension check panicked: {e}"),
        })?
        .map_err(|e| BotError::InvalidPreview {
            path: png.to_path_buf(),
            detail: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tools() -> ExternalTools {
        ExternalTools::from_config(&BotConfig::builder("P").build().unwrap())
    }

    #[test]
    fn rasterize_args_target_first_page_at_raster_width() {
        let args = tools().rasterize_args(Path::new("w/abc.pdf"), Path::new("w/abc-full"));
        let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            vec![
                "-png", "-f", "1", "-l", "1", "-singlefile", "-scale-to-x", "1000", "-scale-to-y",
                "-1", "w/abc.pdf", "w/abc-full",
            ]
        );
    }

    #[test]
    fn crop_args_anchor_at_origin() {
        let args = tools().crop_args(Path::new("w/abc-full.png"), Path::new("w/abc.png"));
        let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(args, vec!["w/abc-full.png", "-crop", "1000x500+0+0", "w/abc.png"]);
    }

    #[test]
    fn png_path_uses_hash_stem() {
        assert_eq!(png_path(Path::new("w"), "abc"), PathBuf::from("w/abc.png"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_rasterizer_aborts_with_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let mut t = tools();
        t.rasterizer = "false".into();
        let err = convert(&t, dir.path(), "abc").await.unwrap_err();
        match err {
            BotError::ToolFailed { tool, code, .. } => {
                assert_eq!(tool, "false");
                assert_eq!(code, Some(1));
            }
            other => panic!("expected ToolFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_tool_is_a_spawn_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut t = tools();
        t.rasterizer = "previewbot-no-such-rasterizer".into();
        let err = convert(&t, dir.path(), "abc").await.unwrap_err();
        assert!(matches!(err, BotError::ToolSpawnFailed { .. }), "got {err:?}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn successful_tools_without_output_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut t = tools();
        t.rasterizer = "true".into();
        t.cropper = "true".into();
        let err = convert(&t, dir.path(), "abc").await.unwrap_err();
        assert!(matches!(err, BotError::InvalidPreview { .. }), "got {err:?}");
    }
}
