//! HTML-to-token flattening.
//!
//! A message body is reduced to the ordered list of its visible text
//! fragments. Extractors walk that list looking for anchor tokens; the
//! parsed tree stays available for the one template that needs table
//! structure.

use std::sync::OnceLock;

use scraper::{ElementRef, Html, Node, Selector};

const HIDDEN_ELEMENTS: [&str; 2] = ["script", "style"];

fn td_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    SEL.get_or_init(|| Selector::parse("td").expect("invalid td selector"))
}

// ── TokenSequence ─────────────────────────────────────────────────────────────

/// Ordered, non-empty, trimmed visible-text fragments of a document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenSequence(Vec<String>);

impl TokenSequence {
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// All tokens joined with `"\n"`.
    pub fn joined(&self) -> String {
        self.0.join("\n")
    }

    /// Push the non-empty trimmed lines of `text`.
    fn push_lines(&mut self, text: &str) {
        self.0.extend(
            text.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string),
        );
    }
}

impl From<Vec<String>> for TokenSequence {
    fn from(tokens: Vec<String>) -> Self {
        let mut seq = TokenSequence::default();
        for token in &tokens {
            seq.push_lines(token);
        }
        seq
    }
}

impl<'a> IntoIterator for &'a TokenSequence {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// ── Document ──────────────────────────────────────────────────────────────────

/// A flattened message body.
pub struct Document {
    html: Option<Html>,
    tokens: TokenSequence,
}

impl Document {
    /// Parse `html` and flatten its visible text.
    pub fn parse(html: &str) -> Self {
        let parsed = Html::parse_document(html);
        let mut tokens = TokenSequence::default();
        for node in parsed.tree.root().descendants() {
            if let Node::Text(text) = node.value() {
                if is_visible(node.ancestors().map(|a| a.value())) {
                    tokens.push_lines(text);
                }
            }
        }
        Self {
            html: Some(parsed),
            tokens,
        }
    }

    /// A document with no markup behind it. Table lookups find nothing.
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            html: None,
            tokens: TokenSequence::from(tokens.into_iter().map(Into::into).collect::<Vec<_>>()),
        }
    }

    pub fn tokens(&self) -> &TokenSequence {
        &self.tokens
    }

    /// Cells of the table body holding `anchor`.
    ///
    /// Locates the first visible text line equal to `anchor`, takes its
    /// nearest enclosing `<tbody>` and returns the trimmed text of every
    /// `<td>` in it that holds exactly one text node. Returns `None` when
    /// the anchor or its table body is missing.
    pub fn table_cells_near(&self, anchor: &str) -> Option<Vec<String>> {
        let html = self.html.as_ref()?;

        let anchor_node = html.tree.root().descendants().find(|node| match node.value() {
            Node::Text(text) => {
                is_visible(node.ancestors().map(|a| a.value()))
                    && text.lines().any(|line| line.trim() == anchor)
            }
            _ => false,
        })?;

        let tbody = anchor_node
            .ancestors()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name() == "tbody")?;

        let cells = tbody
            .select(td_selector())
            .filter_map(|td| {
                let mut texts = td.text();
                let only = texts.next()?;
                if texts.next().is_some() {
                    return None;
                }
                Some(only.trim().to_string())
            })
            .collect();

        Some(cells)
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("has_markup", &self.html.is_some())
            .field("tokens", &self.tokens)
            .finish()
    }
}

/// Flatten an HTML (or plain-text) body into its visible tokens.
pub fn flatten(html: &str) -> TokenSequence {
    Document::parse(html).tokens
}

/// `false` when any of `ancestors` is a script or style element.
fn is_visible<'a>(mut ancestors: impl Iterator<Item = &'a Node>) -> bool {
    !ancestors.any(|node| match node {
        Node::Element(el) => HIDDEN_ELEMENTS.contains(&el.name()),
        _ => false,
    })
}
