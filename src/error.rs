//! Error type for the cpdl-previewbot library.
//!
//! A run is a single linear batch job, so there is exactly one error type and
//! every failure is fatal: nothing is retried or recovered locally, and the
//! page is only saved after every earlier step has succeeded. The variants
//! are grouped by where they come from so the operator can tell at a glance
//! whether the page markup, a PDF link, an external tool, the gallery marker
//! or the wiki itself is to blame.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the cpdl-previewbot library.
#[derive(Debug, Error)]
pub enum BotError {
    // ── Structural markup errors ──────────────────────────────────────────
    /// Content that belongs to an edition appeared before any `CPDLno` template.
    #[error(
        "Node {position} ({node}) appears before any {{{{CPDLno}}}} template\n\
There is no edition to attach it to; check the page markup."
    )]
    NoCurrentEdition { position: usize, node: String },

    /// A `ScoreInfo` template did not carry (description, pages, size).
    #[error("Malformed {{{{ScoreInfo}}}} template at node {position}: {detail}")]
    MalformedScoreInfo { position: usize, detail: String },

    // ── Reference errors ──────────────────────────────────────────────────
    /// A PDF link that is not a `Media:` reference.
    #[error("Unsupported file reference '{link}': expected a link of the form [[Media:<file>]]")]
    UnsupportedReference { link: String },

    /// The wiki has no file behind a `Media:` reference.
    #[error("File '{file}' does not exist on the wiki")]
    SourceFileMissing { file: String },

    /// The wiki reported a content hash that cannot name a local file.
    #[error(
        "File '{file}' has unusable content hash '{hash}'\n\
Expected a non-empty alphanumeric SHA-1 from the wiki's file store."
    )]
    UnusableContentHash { file: String, hash: String },

    // ── External tool errors ──────────────────────────────────────────────
    /// An external conversion tool exited with a non-zero status.
    #[error("'{tool}' failed with exit code {code:?}\n{stderr}")]
    ToolFailed {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },

    /// An external conversion tool could not be started at all.
    #[error("Failed to run '{tool}': {source}\nIs it installed and on PATH?")]
    ToolSpawnFailed {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// The tools exited successfully but left no usable PNG behind.
    #[error("Preview '{path}' is not a usable PNG: {detail}")]
    InvalidPreview { path: PathBuf, detail: String },

    // ── Gallery errors ────────────────────────────────────────────────────
    /// The heading the gallery is inserted before is missing from the page.
    #[error("Marker line '{marker}' not found in page text; cannot place the gallery")]
    MarkerNotFound { marker: String },

    // ── Transport errors ──────────────────────────────────────────────────
    /// The wiki rejected the login.
    #[error("Login failed: {reason}\nCheck the credentials file.")]
    LoginFailed { reason: String },

    /// The Action API answered with an error object.
    #[error("Wiki API error during '{action}': {code}: {info}")]
    ApiError {
        action: String,
        code: String,
        info: String,
    },

    /// Network or HTTP-level failure talking to the wiki.
    #[error("HTTP request failed ({context}): {reason}")]
    Http { context: String, reason: String },

    // ── Local state errors ────────────────────────────────────────────────
    /// Credentials file missing or unreadable.
    #[error("Cannot read credentials file '{path}': {source}")]
    CredentialsUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Credentials file does not hold exactly a username and a password.
    #[error("Credentials file '{path}' must contain a username and a password separated by whitespace")]
    CredentialsMalformed { path: PathBuf },

    /// Local page snapshot missing or unreadable.
    #[error("Cannot read page snapshot '{path}': {source}")]
    SnapshotUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Filesystem failure inside the work directory.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl BotError {
    pub(crate) fn http(context: impl Into<String>, err: impl std::fmt::Display) -> Self {
        BotError::Http {
            context: context.into(),
            reason: err.to_string(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BotError::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_current_edition_display() {
        let e = BotError::NoCurrentEdition {
            position: 3,
            node: "template ScoreInfo".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("Node 3"), "got: {msg}");
        assert!(msg.contains("{{CPDLno}}"), "got: {msg}");
    }

    #[test]
    fn tool_failed_display() {
        let e = BotError::ToolFailed {
            tool: "pdftoppm".into(),
            code: Some(99),
            stderr: "Syntax Error".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("pdftoppm"));
        assert!(msg.contains("99"));
        assert!(msg.contains("Syntax Error"));
    }

    #[test]
    fn marker_not_found_display() {
        let e = BotError::MarkerNotFound {
            marker: "==General Information==".into(),
        };
        assert!(e.to_string().contains("==General Information=="));
    }

    #[test]
    fn api_error_display() {
        let e = BotError::ApiError {
            action: "edit".into(),
            code: "badtoken".into(),
            info: "Invalid CSRF token.".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("edit"));
        assert!(msg.contains("badtoken"));
    }
}
