//! Wiki access: the [`WikiClient`] seam and its MediaWiki implementation.
//!
//! The driver only needs six operations from the wiki (log in, read a page,
//! save a page, look up a file, download it, upload a file), so they sit
//! behind one trait. [`MediaWikiClient`] speaks the Action API over `reqwest`
//! with a cookie store; the session lives in that store, so a logged-in
//! client is simply passed down to whoever needs it.
//!
//! All responses are requested as `format=json&formatversion=2`.

use crate::config::{BotConfig, Credentials};
use crate::error::BotError;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// A file stored in the wiki's media repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    /// File name without namespace, e.g. `Foo.pdf`.
    pub name: String,
    /// SHA-1 of the file content (hex), as reported by the wiki.
    pub sha1: String,
    /// Direct URL of the original file.
    pub url: String,
}

/// Everything the bot needs from the wiki.
#[async_trait]
pub trait WikiClient: Send + Sync {
    async fn login(&self, credentials: &Credentials) -> Result<(), BotError>;

    /// Current wikitext of `title`.
    async fn page_text(&self, title: &str) -> Result<String, BotError>;

    async fn save_page(&self, title: &str, text: &str, summary: &str) -> Result<(), BotError>;

    /// Look up `File:<file_name>`; `None` when the wiki has no such file.
    async fn file_descriptor(&self, file_name: &str) -> Result<Option<FileDescriptor>, BotError>;

    /// Write the raw bytes of `file` to `dest`.
    async fn download_file(&self, file: &FileDescriptor, dest: &Path) -> Result<(), BotError>;

    /// Upload `local` as `File:<remote_name>` with `description` as page text.
    async fn upload_file(
        &self,
        local: &Path,
        remote_name: &str,
        description: &str,
    ) -> Result<(), BotError>;
}

/// [`WikiClient`] over the MediaWiki Action API.
pub struct MediaWikiClient {
    http: reqwest::Client,
    api_url: String,
}

impl MediaWikiClient {
    pub fn new(config: &BotConfig) -> Result<Self, BotError> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .map_err(|e| BotError::http("building HTTP client", e))?;
        Ok(Self {
            http,
            api_url: config.api_url.clone(),
        })
    }

    async fn get(
        &self,
        action: &str,
        params: &[(&str, &str)],
    ) -> Result<serde_json::Value, BotError> {
        let response = self
            .http
            .get(&self.api_url)
            .query(&[("action", action), ("format", "json"), ("formatversion", "2")])
            .query(params)
            .send()
            .await
            .map_err(|e| BotError::http(action, e))?;
        decode(action, response).await
    }

    async fn post(
        &self,
        action: &str,
        params: &[(&str, &str)],
    ) -> Result<serde_json::Value, BotError> {
        let mut form = vec![("action", action), ("format", "json"), ("formatversion", "2")];
        form.extend_from_slice(params);
        let response = self
            .http
            .post(&self.api_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| BotError::http(action, e))?;
        decode(action, response).await
    }

    /// Fetch a `login` or `csrf` token.
    async fn token(&self, kind: &str) -> Result<String, BotError> {
        let value = self.get("query", &[("meta", "tokens"), ("type", kind)]).await?;
        let parsed: TokenResponse = parse("query", value)?;
        let key = format!("{kind}token");
        parsed.query.tokens.get(&key).cloned().ok_or_else(|| BotError::ApiError {
            action: "query".into(),
            code: "notoken".into(),
            info: format!("response has no {key}"),
        })
    }
}

#[async_trait]
impl WikiClient for MediaWikiClient {
    async fn login(&self, credentials: &Credentials) -> Result<(), BotError> {
        let token = self.token("login").await?;
        let value = self
            .post(
                "login",
                &[
                    ("lgname", credentials.username.as_str()),
                    ("lgpassword", credentials.password.as_str()),
                    ("lgtoken", token.as_str()),
                ],
            )
            .await?;
        let parsed: LoginResponse = parse("login", value)?;
        if parsed.login.result != "Success" {
            return Err(BotError::LoginFailed {
                reason: parsed.login.reason.unwrap_or(parsed.login.result),
            });
        }
        info!("Logged in as {}", credentials.username);
        Ok(())
    }

    async fn page_text(&self, title: &str) -> Result<String, BotError> {
        let value = self
            .get(
                "query",
                &[
                    ("titles", title),
                    ("prop", "revisions"),
                    ("rvprop", "content"),
                    ("rvslots", "main"),
                ],
            )
            .await?;
        let parsed: QueryResponse = parse("query", value)?;
        let page = parsed
            .query
            .pages
            .into_iter()
            .next()
            .filter(|p| !p.missing)
            .ok_or_else(|| BotError::ApiError {
                action: "query".into(),
                code: "missingtitle".into(),
                info: format!("page '{title}' does not exist"),
            })?;
        let text = page
            .revisions
            .into_iter()
            .next()
            .and_then(|r| r.slots.main.content)
            .unwrap_or_default();
        debug!("Fetched '{}' ({} bytes)", title, text.len());
        Ok(text)
    }

    async fn save_page(&self, title: &str, text: &str, summary: &str) -> Result<(), BotError> {
        let token = self.token("csrf").await?;
        let value = self
            .post(
                "edit",
                &[
                    ("title", title),
                    ("text", text),
                    ("summary", summary),
                    ("bot", "1"),
                    ("token", token.as_str()),
                ],
            )
            .await?;
        let parsed: EditResponse = parse("edit", value)?;
        if parsed.edit.result != "Success" {
            return Err(BotError::ApiError {
                action: "edit".into(),
                code: parsed.edit.result,
                info: format!("saving '{title}' was not accepted"),
            });
        }
        info!("Saved '{}'", title);
        Ok(())
    }

    async fn file_descriptor(&self, file_name: &str) -> Result<Option<FileDescriptor>, BotError> {
        let title = format!("File:{file_name}");
        let value = self
            .get(
                "query",
                &[
                    ("titles", title.as_str()),
                    ("prop", "imageinfo"),
                    ("iiprop", "sha1|url"),
                ],
            )
            .await?;
        let parsed: QueryResponse = parse("query", value)?;
        let info = parsed
            .query
            .pages
            .into_iter()
            .next()
            .and_then(|p| p.imageinfo.into_iter().next());
        Ok(info.map(|i| FileDescriptor {
            name: file_name.to_string(),
            sha1: i.sha1,
            url: i.url,
        }))
    }

    async fn download_file(&self, file: &FileDescriptor, dest: &Path) -> Result<(), BotError> {
        let context = format!("download {}", file.name);
        let response = self
            .http
            .get(&file.url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| BotError::http(context.as_str(), e))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| BotError::http(context.as_str(), e))?;
        tokio::fs::write(dest, &bytes)
            .await
            .map_err(|e| BotError::io(dest, e))?;
        debug!("Downloaded {} → {} ({} bytes)", file.url, dest.display(), bytes.len());
        Ok(())
    }

    async fn upload_file(
        &self,
        local: &Path,
        remote_name: &str,
        description: &str,
    ) -> Result<(), BotError> {
        let bytes = tokio::fs::read(local)
            .await
            .map_err(|e| BotError::io(local, e))?;
        let token = self.token("csrf").await?;

        let file = Part::bytes(bytes)
            .file_name(remote_name.to_string())
            .mime_str("image/png")
            .map_err(|e| BotError::http("upload", e))?;
        let form = Form::new()
            .text("action", "upload")
            .text("format", "json")
            .text("formatversion", "2")
            .text("filename", remote_name.to_string())
            .text("comment", "Score preview")
            .text("text", description.to_string())
            .text("ignorewarnings", "1")
            .text("token", token)
            .part("file", file);

        let response = self
            .http
            .post(&self.api_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| BotError::http("upload", e))?;
        let parsed: UploadResponse = parse("upload", decode("upload", response).await?)?;
        if parsed.upload.result != "Success" {
            return Err(BotError::ApiError {
                action: "upload".into(),
                code: parsed.upload.result,
                info: format!("uploading '{remote_name}' was not accepted"),
            });
        }
        info!("Uploaded File:{}", remote_name);
        Ok(())
    }
}

// ── Response handling ────────────────────────────────────────────────────

/// Check the HTTP status, decode JSON and surface an API `error` object.
async fn decode(action: &str, response: reqwest::Response) -> Result<serde_json::Value, BotError> {
    let response = response
        .error_for_status()
        .map_err(|e| BotError::http(action, e))?;
    let value: serde_json::Value = response
        .json()
        .await
        .map_err(|e| BotError::http(action, e))?;
    api_error(action, &value).map_or(Ok(value), Err)
}

fn api_error(action: &str, value: &serde_json::Value) -> Option<BotError> {
    let error = value.get("error")?;
    let field = |name: &str| {
        error
            .get(name)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    };
    Some(BotError::ApiError {
        action: action.to_string(),
        code: field("code"),
        info: field("info"),
    })
}

fn parse<T: DeserializeOwned>(action: &str, value: serde_json::Value) -> Result<T, BotError> {
    serde_json::from_value(value).map_err(|e| BotError::ApiError {
        action: action.to_string(),
        code: "unexpected-response".into(),
        info: e.to_string(),
    })
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    query: TokenQuery,
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    tokens: std::collections::HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    login: LoginResult,
}

#[derive(Debug, Deserialize)]
struct LoginResult {
    result: String,
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    query: PageQuery,
}

#[derive(Debug, Deserialize)]
struct PageQuery {
    #[serde(default)]
    pages: Vec<QueryPage>,
}

#[derive(Debug, Deserialize)]
struct QueryPage {
    #[serde(default)]
    missing: bool,
    #[serde(default)]
    revisions: Vec<Revision>,
    #[serde(default)]
    imageinfo: Vec<ImageInfo>,
}

#[derive(Debug, Deserialize)]
struct Revision {
    slots: RevisionSlots,
}

#[derive(Debug, Deserialize)]
struct RevisionSlots {
    main: MainSlot,
}

#[derive(Debug, Deserialize)]
struct MainSlot {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImageInfo {
    sha1: String,
    url: String,
}

#[derive(Debug, Deserialize)]
struct EditResponse {
    edit: ActionResult,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    upload: ActionResult,
}

#[derive(Debug, Deserialize)]
struct ActionResult {
    result: String,
}
