//! Wikitext → flat stream of [`MarkupNode`]s.
//!
//! `parse_wiki_text` produces a tree: template parameters, link captions,
//! list items and table cells all nest further nodes. The edition extractor
//! only cares about document order, so the tree is walked pre-order (a node
//! before its children) and reduced to the four kinds it understands.
//!
//! Text fields are taken verbatim from the page source between the first and
//! last child node, so a caption such as `{{pdf}} score` keeps its template
//! markup exactly as written. Heading titles, template names and parameter
//! values are trimmed of surrounding whitespace; nothing else is normalised.

use parse_wiki_text::{Configuration, ConfigurationSource, Node};
use std::fmt;
use tracing::{debug, warn};

/// One node of the flattened markup stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkupNode {
    /// `== title ==`; `level` is the number of `=` signs.
    Heading { level: u8, title: String },
    /// `{{name|param|param…}}`; `params` in source order, named or not.
    Template { name: String, params: Vec<String> },
    /// `[[target|display]]`; `display` is `None` when there is no caption.
    Wikilink {
        target: String,
        display: Option<String>,
    },
    /// Anything else: text, formatting, comments, external links…
    Other,
}

impl MarkupNode {
    pub fn heading(level: u8, title: impl Into<String>) -> Self {
        MarkupNode::Heading {
            level,
            title: title.into(),
        }
    }

    pub fn template<S: Into<String>>(
        name: impl Into<String>,
        params: impl IntoIterator<Item = S>,
    ) -> Self {
        MarkupNode::Template {
            name: name.into(),
            params: params.into_iter().map(Into::into).collect(),
        }
    }

    pub fn wikilink(target: impl Into<String>, display: Option<&str>) -> Self {
        MarkupNode::Wikilink {
            target: target.into(),
            display: display.map(str::to_string),
        }
    }
}

impl fmt::Display for MarkupNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarkupNode::Heading { level, title } => {
                let eq = "=".repeat(*level as usize);
                write!(f, "heading {eq}{title}{eq}")
            }
            MarkupNode::Template { name, params } if params.is_empty() => {
                write!(f, "template {{{{{name}}}}}")
            }
            MarkupNode::Template { name, params } => {
                write!(f, "template {{{{{name}|{}}}}}", params.join("|"))
            }
            MarkupNode::Wikilink {
                target,
                display: Some(display),
            } => write!(f, "link [[{target}|{display}]]"),
            MarkupNode::Wikilink { target, .. } => write!(f, "link [[{target}]]"),
            MarkupNode::Other => write!(f, "other"),
        }
    }
}

/// Parse page text into a flat, document-ordered node stream.
pub fn parse(text: &str) -> Vec<MarkupNode> {
    let output = cpdl_configuration().parse(text);
    for warning in &output.warnings {
        warn!(
            "Wikitext warning at bytes {}..{}: {:?}",
            warning.start, warning.end, warning.message
        );
    }

    let mut flat = Vec::new();
    flatten(text, &output.nodes, &mut flat);
    debug!(
        "Parsed {} bytes of wikitext into {} nodes",
        text.len(),
        flat.len()
    );
    flat
}

fn flatten(src: &str, nodes: &[Node<'_>], out: &mut Vec<MarkupNode>) {
    for node in nodes {
        match node {
            Node::Heading { level, nodes, .. } => {
                out.push(MarkupNode::Heading {
                    level: *level,
                    title: source_of(src, nodes).trim().to_string(),
                });
                flatten(src, nodes, out);
            }
            Node::Template {
                name, parameters, ..
            } => {
                out.push(MarkupNode::Template {
                    name: source_of(src, name).trim().to_string(),
                    params: parameters
                        .iter()
                        .map(|p| source_of(src, &p.value).trim().to_string())
                        .collect(),
                });
                flatten(src, name, out);
                for parameter in parameters {
                    if let Some(ref name) = parameter.name {
                        flatten(src, name, out);
                    }
                    flatten(src, &parameter.value, out);
                }
            }
            Node::Link {
                start,
                end,
                target,
                text,
                ..
            } => {
                out.push(MarkupNode::Wikilink {
                    target: target.to_string(),
                    display: link_display(src, *start, *end, text).map(str::to_string),
                });
                flatten(src, text, out);
            }
            Node::Image { text, .. } => {
                out.push(MarkupNode::Other);
                flatten(src, text, out);
            }
            Node::ExternalLink { nodes, .. }
            | Node::Preformatted { nodes, .. }
            | Node::Tag { nodes, .. } => {
                out.push(MarkupNode::Other);
                flatten(src, nodes, out);
            }
            Node::UnorderedList { items, .. } | Node::OrderedList { items, .. } => {
                out.push(MarkupNode::Other);
                for item in items {
                    flatten(src, &item.nodes, out);
                }
            }
            Node::DefinitionList { items, .. } => {
                out.push(MarkupNode::Other);
                for item in items {
                    flatten(src, &item.nodes, out);
                }
            }
            Node::Table { captions, rows, .. } => {
                out.push(MarkupNode::Other);
                for caption in captions {
                    flatten(src, &caption.content, out);
                }
                for row in rows {
                    for cell in &row.cells {
                        flatten(src, &cell.content, out);
                    }
                }
            }
            _ => out.push(MarkupNode::Other),
        }
    }
}

/// Caption of the link spanning `start..end`: the source between `|` and the
/// closing `]]`. A link trail (`[[a|b]]cd`) is rendered as part of the
/// caption by MediaWiki but is not part of what the page author wrote.
fn link_display<'a>(src: &'a str, start: usize, end: usize, text: &[Node<'_>]) -> Option<&'a str> {
    let raw = src.get(start..end)?;
    // An unpiped link has no caption, whatever the parser puts in `text`.
    if !raw.contains('|') {
        return None;
    }
    let first = text.first().map(|n| span(n).0)?;
    let close = start + raw.rfind("]]")?;
    let display = src.get(first..close)?;
    (!display.is_empty()).then_some(display)
}

/// The source text spanned by `nodes`, or `""` when there are none.
fn source_of<'a>(src: &'a str, nodes: &[Node<'_>]) -> &'a str {
    match (nodes.first(), nodes.last()) {
        (Some(first), Some(last)) => src.get(span(first).0..span(last).1).unwrap_or(""),
        _ => "",
    }
}

fn span(node: &Node<'_>) -> (usize, usize) {
    match *node {
        Node::Bold { start, end, .. }
        | Node::BoldItalic { start, end, .. }
        | Node::Category { start, end, .. }
        | Node::CharacterEntity { start, end, .. }
        | Node::Comment { start, end, .. }
        | Node::DefinitionList { start, end, .. }
        | Node::EndTag { start, end, .. }
        | Node::ExternalLink { start, end, .. }
        | Node::Heading { start, end, .. }
        | Node::HorizontalDivider { start, end, .. }
        | Node::Image { start, end, .. }
        | Node::Italic { start, end, .. }
        | Node::Link { start, end, .. }
        | Node::MagicWord { start, end, .. }
        | Node::OrderedList { start, end, .. }
        | Node::ParagraphBreak { start, end, .. }
        | Node::Parameter { start, end, .. }
        | Node::Preformatted { start, end, .. }
        | Node::Redirect { start, end, .. }
        | Node::StartTag { start, end, .. }
        | Node::Table { start, end, .. }
        | Node::Tag { start, end, .. }
        | Node::Template { start, end, .. }
        | Node::Text { start, end, .. }
        | Node::UnorderedList { start, end, .. } => (start, end),
    }
}

/// Parser configuration for cpdl.org (MediaWiki defaults plus the
/// extension tags the site has installed).
fn cpdl_configuration() -> Configuration {
    Configuration::new(&ConfigurationSource {
        category_namespaces: &["category"],
        extension_tags: &[
            "categorytree",
            "gallery",
            "imagemap",
            "includeonly",
            "inputbox",
            "math",
            "noinclude",
            "nowiki",
            "onlyinclude",
            "poem",
            "pre",
            "ref",
            "references",
            "score",
            "source",
            "syntaxhighlight",
        ],
        file_namespaces: &["file", "image"],
        link_trail: "abcdefghijklmnopqrstuvwxyz",
        magic_words: &[
            "DISAMBIG",
            "FORCETOC",
            "HIDDENCAT",
            "INDEX",
            "NEWSECTIONLINK",
            "NOCC",
            "NOCONTENTCONVERT",
            "NOEDITSECTION",
            "NOGALLERY",
            "NOINDEX",
            "NONEWSECTIONLINK",
            "NOTC",
            "NOTITLECONVERT",
            "NOTOC",
            "STATICREDIRECT",
            "TOC",
        ],
        protocols: &[
            "//",
            "ftp://",
            "http://",
            "https://",
            "irc://",
            "mailto:",
            "news:",
        ],
        redirect_magic_words: &["REDIRECT"],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn significant(text: &str) -> Vec<MarkupNode> {
        parse(text)
            .into_iter()
            .filter(|n| *n != MarkupNode::Other)
            .collect()
    }

    #[test]
    fn headings_keep_level_and_trimmed_title() {
        let nodes = significant("== Music files ==\n=== Edition 1 ===\n");
        assert_eq!(
            nodes,
            vec![
                MarkupNode::heading(2, "Music files"),
                MarkupNode::heading(3, "Edition 1"),
            ]
        );
    }

    #[test]
    fn template_params_in_source_order() {
        let nodes = significant("{{CPDLno|12345}}\n{{ScoreInfo|A4|3|116}}\n");
        assert_eq!(
            nodes,
            vec![
                MarkupNode::template("CPDLno", ["12345"]),
                MarkupNode::template("ScoreInfo", ["A4", "3", "116"]),
            ]
        );
    }

    #[test]
    fn links_inside_list_items_are_found() {
        let nodes = significant("*{{PostedDate|2019-01-01}} [[Media:Foo.pdf|Foo.pdf]]\n*[[Main Page]]\n");
        assert!(nodes.contains(&MarkupNode::wikilink("Media:Foo.pdf", Some("Foo.pdf"))));
        assert!(nodes.contains(&MarkupNode::wikilink("Main Page", None)));
    }

    #[test]
    fn nested_template_comes_after_its_parent() {
        let nodes = significant("{{Outer|{{Inner}}}}");
        assert_eq!(
            nodes,
            vec![
                MarkupNode::template("Outer", ["{{Inner}}"]),
                MarkupNode::template("Inner", Vec::<String>::new()),
            ]
        );
    }

    #[test]
    fn display_text_is_verbatim_source() {
        let nodes = significant("[[Media:Foo.pdf|{{pdf}} score]]");
        assert_eq!(
            nodes.first(),
            Some(&MarkupNode::wikilink("Media:Foo.pdf", Some("{{pdf}} score")))
        );
    }

    #[test]
    fn link_trail_is_not_part_of_display() {
        let nodes = significant("[[Media:B.pdf|Bpdf]]trail and [[Main Page]]s");
        assert_eq!(
            nodes,
            vec![
                MarkupNode::wikilink("Media:B.pdf", Some("Bpdf")),
                MarkupNode::wikilink("Main Page", None),
            ]
        );
    }

    #[test]
    fn display_formatting() {
        assert_eq!(
            MarkupNode::template("ScoreInfo", ["A4", "3"]).to_string(),
            "template {{ScoreInfo|A4|3}}"
        );
        assert_eq!(
            MarkupNode::wikilink("Media:X.pdf", Some("x.pdf")).to_string(),
            "link [[Media:X.pdf|x.pdf]]"
        );
        assert_eq!(MarkupNode::heading(2, "Music files").to_string(), "heading ==Music files==");
    }
}
