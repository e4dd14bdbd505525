//! Edition extraction: group a page's PDF links under the edition they belong to.
//!
//! A CPDL work page lists its editions one after another. Each edition opens
//! with a `{{CPDLno}}` template, may carry a `{{ScoreInfo|desc|pages|kB}}`
//! template, and lists its files under the `==Music files==` heading. None of
//! this is nested in the markup; grouping depends purely on node order and on
//! which level-2 heading was seen last.
//!
//! ```text
//! {{CPDLno}} ─────▶ open a new edition (the previous one is finished)
//! {{ScoreInfo}} ──▶ set the open edition's score info (last one wins)
//! == heading == ──▶ remember the title for that level only
//! [[Media:x|…pdf…]] under ==Music files== ──▶ append to the open edition
//! ```

use crate::error::BotError;
use crate::markup::MarkupNode;
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

/// Template that opens a new edition.
pub const CPDLNO_TEMPLATE: &str = "CPDLno";
/// Template carrying (description, page count, size in kB).
pub const SCORE_INFO_TEMPLATE: &str = "ScoreInfo";
/// Level-2 heading under which PDF links are collected.
pub const MUSIC_FILES_HEADING: &str = "Music files";

/// Case-sensitive substring marking a link caption as a PDF.
const PDF_MARKER: &str = "pdf";

/// Score metadata from a `{{ScoreInfo}}` template.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreInfo {
    pub description: String,
    pub page_count: u32,
    pub size_kb: f64,
}

impl ScoreInfo {
    /// Interpret template parameters positionally; extra parameters are ignored.
    fn from_params(params: &[String], position: usize) -> Result<Self, BotError> {
        let malformed = |detail: String| BotError::MalformedScoreInfo { position, detail };

        let [description, pages, size, ..] = params else {
            return Err(malformed(format!(
                "expected 3 parameters (description, pages, size), got {}",
                params.len()
            )));
        };
        let page_count = pages
            .trim()
            .parse::<u32>()
            .map_err(|e| malformed(format!("page count '{pages}': {e}")))?;
        let size_kb = size
            .trim()
            .parse::<f64>()
            .map_err(|e| malformed(format!("size '{size}': {e}")))?;

        Ok(ScoreInfo {
            description: description.clone(),
            page_count,
            size_kb,
        })
    }
}

/// One catalogued edition of a score.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Edition {
    pub score_info: Option<ScoreInfo>,
    /// Link targets in document order, e.g. `Media:Foo.pdf`.
    pub pdf_links: Vec<String>,
}

impl Edition {
    /// Gallery caption for one of this edition's files.
    ///
    /// `"A4, 3 pages, 116 kB"` when score info is known, otherwise the file
    /// name taken from `link`.
    pub fn caption(&self, link: &str) -> String {
        match self.score_info {
            Some(ref info) => format!(
                "{}, {} {}, {} kB",
                info.description,
                info.page_count,
                if info.page_count == 1 { "page" } else { "pages" },
                info.size_kb
            ),
            None => link
                .split_once(':')
                .map_or(link, |(_, name)| name)
                .to_string(),
        }
    }
}

/// Most recent heading title per heading level.
///
/// A heading only overwrites its own level: a `===sub===` never disturbs the
/// `==section==` it sits under.
#[derive(Debug, Clone, Default)]
pub struct HeadingContext {
    titles: HashMap<u8, String>,
}

impl HeadingContext {
    pub fn record(&mut self, level: u8, title: impl Into<String>) {
        self.titles.insert(level, title.into());
    }

    pub fn title(&self, level: u8) -> Option<&str> {
        self.titles.get(&level).map(String::as_str)
    }
}

/// Whether a link caption marks the link as a PDF score.
pub fn is_pdf_reference(display: Option<&str>) -> bool {
    display.is_some_and(|d| d.contains(PDF_MARKER))
}

/// Incremental extractor; feed nodes with [`push`](Self::push) in document
/// order, then call [`finish`](Self::finish).
#[derive(Debug, Default)]
pub struct EditionExtractor {
    headings: HeadingContext,
    finished: Vec<Edition>,
    current: Option<Edition>,
    position: usize,
}

impl EditionExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one node. On error the extractor should be discarded.
    pub fn push(&mut self, node: &MarkupNode) -> Result<(), BotError> {
        let position = self.position;
        self.position += 1;

        match node {
            MarkupNode::Heading { level, title } => {
                self.headings.record(*level, title.as_str());
            }
            MarkupNode::Template { name, .. } if name == CPDLNO_TEMPLATE => {
                if let Some(done) = self.current.replace(Edition::default()) {
                    self.finished.push(done);
                }
                debug!("Edition {} opens at node {}", self.finished.len() + 1, position);
            }
            MarkupNode::Template { name, params } if name == SCORE_INFO_TEMPLATE => {
                let edition = self.active(node, position)?;
                edition.score_info = Some(ScoreInfo::from_params(params, position)?);
            }
            MarkupNode::Wikilink { target, display } => {
                if is_pdf_reference(display.as_deref())
                    && self.headings.title(2) == Some(MUSIC_FILES_HEADING)
                {
                    self.active(node, position)?.pdf_links.push(target.clone());
                }
            }
            MarkupNode::Template { .. } | MarkupNode::Other => {}
        }
        Ok(())
    }

    /// Close the open edition and return all editions in document order.
    pub fn finish(mut self) -> Vec<Edition> {
        self.finished.extend(self.current.take());
        self.finished
    }

    fn active(&mut self, node: &MarkupNode, position: usize) -> Result<&mut Edition, BotError> {
        self.current
            .as_mut()
            .ok_or_else(|| BotError::NoCurrentEdition {
                position,
                node: node.to_string(),
            })
    }
}

/// Group a node stream into editions.
///
/// Returns one [`Edition`] per `{{CPDLno}}` template. Fails with
/// [`BotError::NoCurrentEdition`] when a `{{ScoreInfo}}` or a qualifying PDF
/// link precedes the first `{{CPDLno}}`.
pub fn extract(nodes: &[MarkupNode]) -> Result<Vec<Edition>, BotError> {
    let mut extractor = EditionExtractor::new();
    for node in nodes {
        extractor.push(node)?;
    }
    Ok(extractor.finish())
}
