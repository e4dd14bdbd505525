//! Configuration for a preview-bot run.
//!
//! Every knob lives in [`BotConfig`], built via [`BotConfigBuilder`] so the
//! CLI and tests only set what they care about. Credentials are kept out of
//! the config and loaded separately with [`Credentials::load`].

use crate::error::BotError;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::{Path, PathBuf};

/// Action API endpoint of cpdl.org.
pub const DEFAULT_API_URL: &str = "http://cpdl.org/wiki/api.php";

/// Edit summary used when saving the page.
pub const DEFAULT_SUMMARY: &str = "Adding score previews";

/// Where the page text comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PageSource {
    /// Fetch the current revision from the wiki (default).
    #[default]
    Live,
    /// Read a locally saved copy of the page text.
    Snapshot(PathBuf),
}

/// Configuration for one bot run.
#[derive(Clone)]
pub struct BotConfig {
    /// MediaWiki Action API endpoint. Default: [`DEFAULT_API_URL`].
    pub api_url: String,

    /// User-Agent sent with every request.
    pub user_agent: String,

    /// Page whose editions are scanned.
    pub page: String,

    /// Page the modified text is saved to. `None` saves back to [`Self::page`].
    pub target_page: Option<String>,

    /// Where the page text is read from. Default: live.
    pub page_source: PageSource,

    /// Directory holding `<sha1>.pdf` and `<sha1>.png`. Default: `./previews`.
    ///
    /// Files are keyed by content hash and reused across runs; nothing here
    /// is ever deleted.
    pub workdir: PathBuf,

    /// Save the modified page. Default: true. `false` is a dry run.
    pub save: bool,

    /// Edit summary for the save. Default: [`DEFAULT_SUMMARY`].
    pub summary: String,

    /// Width the first PDF page is rasterised to, in pixels. Default: 1000.
    pub raster_width: u32,

    /// Width of the top-left crop kept as the preview. Default: 1000.
    pub crop_width: u32,

    /// Height of the top-left crop kept as the preview. Default: 500.
    pub crop_height: u32,

    /// Display width of gallery images. Default: 500.
    pub gallery_width: u32,

    /// Display height of gallery images. Default: 250.
    pub gallery_height: u32,

    /// Rasteriser executable (poppler `pdftoppm` command line). Default: `pdftoppm`.
    pub rasterizer: String,

    /// Crop executable (ImageMagick `convert` command line). Default: `convert`.
    pub cropper: String,

    /// Timeout for each HTTP request in seconds. Default: 120.
    pub http_timeout_secs: u64,

    /// Optional progress callback for per-file events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            user_agent: format!(
                "{}/{} (MediaWiki bot)",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION")
            ),
            page: String::new(),
            target_page: None,
            page_source: PageSource::default(),
            workdir: PathBuf::from("previews"),
            save: true,
            summary: DEFAULT_SUMMARY.to_string(),
            raster_width: 1000,
            crop_width: 1000,
            crop_height: 500,
            gallery_width: 500,
            gallery_height: 250,
            rasterizer: "pdftoppm".to_string(),
            cropper: "convert".to_string(),
            http_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotConfig")
            .field("api_url", &self.api_url)
            .field("page", &self.page)
            .field("target_page", &self.target_page)
            .field("page_source", &self.page_source)
            .field("workdir", &self.workdir)
            .field("save", &self.save)
            .field("summary", &self.summary)
            .field("raster_width", &self.raster_width)
            .field("crop", &(self.crop_width, self.crop_height))
            .field("gallery", &(self.gallery_width, self.gallery_height))
            .field("rasterizer", &self.rasterizer)
            .field("cropper", &self.cropper)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn BotProgressCallback>"),
            )
            .finish()
    }
}

impl BotConfig {
    /// Create a new builder for `BotConfig`.
    pub fn builder(page: impl Into<String>) -> BotConfigBuilder {
        BotConfigBuilder {
            config: Self {
                page: page.into(),
                ..Self::default()
            },
        }
    }

    /// The page the result is saved to.
    pub fn target_page(&self) -> &str {
        self.target_page.as_deref().unwrap_or(&self.page)
    }
}

/// Builder for [`BotConfig`].
#[derive(Debug)]
pub struct BotConfigBuilder {
    config: BotConfig,
}

impl BotConfigBuilder {
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_url = url.into();
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.config.user_agent = ua.into();
        self
    }

    pub fn target_page(mut self, title: impl Into<String>) -> Self {
        self.config.target_page = Some(title.into());
        self
    }

    pub fn page_source(mut self, source: PageSource) -> Self {
        self.config.page_source = source;
        self
    }

    pub fn snapshot(self, path: impl Into<PathBuf>) -> Self {
        self.page_source(PageSource::Snapshot(path.into()))
    }

    pub fn workdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.workdir = dir.into();
        self
    }

    pub fn save(mut self, v: bool) -> Self {
        self.config.save = v;
        self
    }

    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.config.summary = summary.into();
        self
    }

    pub fn raster_width(mut self, px: u32) -> Self {
        self.config.raster_width = px;
        self
    }

    pub fn crop(mut self, width: u32, height: u32) -> Self {
        self.config.crop_width = width;
        self.config.crop_height = height;
        self
    }

    pub fn gallery_size(mut self, width: u32, height: u32) -> Self {
        self.config.gallery_width = width;
        self.config.gallery_height = height;
        self
    }

    pub fn rasterizer(mut self, program: impl Into<String>) -> Self {
        self.config.rasterizer = program.into();
        self
    }

    pub fn cropper(mut self, program: impl Into<String>) -> Self {
        self.config.cropper = program.into();
        self
    }

    pub fn http_timeout_secs(mut self, secs: u64) -> Self {
        self.config.http_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<BotConfig, BotError> {
        let c = &self.config;
        if c.page.trim().is_empty() {
            return Err(BotError::InvalidConfig("page title must not be empty".into()));
        }
        if c.target_page.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(BotError::InvalidConfig(
                "target page title must not be empty".into(),
            ));
        }
        if c.raster_width == 0 || c.crop_width == 0 || c.crop_height == 0 {
            return Err(BotError::InvalidConfig(format!(
                "raster and crop sizes must be non-zero, got raster {} crop {}x{}",
                c.raster_width, c.crop_width, c.crop_height
            )));
        }
        if c.crop_width > c.raster_width {
            return Err(BotError::InvalidConfig(format!(
                "crop width {} exceeds raster width {}",
                c.crop_width, c.raster_width
            )));
        }
        if !c.api_url.starts_with("http://") && !c.api_url.starts_with("https://") {
            return Err(BotError::InvalidConfig(format!(
                "API URL must be http(s), got '{}'",
                c.api_url
            )));
        }
        Ok(self.config)
    }
}

/// Bot account credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// `~/.config/cpdl` (or the platform's config directory equivalent).
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("cpdl"))
    }

    /// Read a file holding exactly two whitespace-separated tokens:
    /// username, then password.
    pub fn load(path: &Path) -> Result<Self, BotError> {
        let text = std::fs::read_to_string(path).map_err(|e| BotError::CredentialsUnreadable {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&text).ok_or_else(|| BotError::CredentialsMalformed {
            path: path.to_path_buf(),
        })
    }

    fn parse(text: &str) -> Option<Self> {
        let mut tokens = text.split_whitespace();
        match (tokens.next(), tokens.next(), tokens.next()) {
            (Some(username), Some(password), None) => Some(Self {
                username: username.to_string(),
                password: password.to_string(),
            }),
            _ => None,
        }
    }
}
