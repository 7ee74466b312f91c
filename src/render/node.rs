//! Structured output of the render pipeline
//!
//! Nothing here is executable markup. Raw markup from a reply survives only
//! as allow-listed structural elements with no attributes beyond a vetted
//! link target.

use crate::copy_state::CopyKey;
use serde::Serialize;

/// A rendered assistant message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Document {
    pub blocks: Vec<Block>,
    /// Whole-message copy button
    pub copy_key: CopyKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Block {
    Paragraph(Vec<Inline>),
    Heading { level: u8, content: Vec<Inline> },
    BlockQuote(Vec<Block>),
    List(List),
    CodeBlock(CodeBlock),
    Table(Table),
    Rule,
    /// Sanitized raw markup block
    Markup(Vec<MarkupNode>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct List {
    /// First number of an ordered list; `None` for bullets
    pub start: Option<u64>,
    pub items: Vec<ListItem>,
}

impl List {
    pub fn is_ordered(&self) -> bool {
        self.start.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListItem {
    /// Task-list state, if the item has a checkbox
    pub checked: Option<bool>,
    pub blocks: Vec<Block>,
}

/// A fenced or indented code block
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodeBlock {
    pub language: Option<String>,
    /// Exact inner text of the block
    pub code: String,
    /// Present only when the language was recognized
    pub highlighted: Option<Vec<HighlightedLine>>,
    pub copy_key: CopyKey,
}

/// One source line, newline included
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HighlightedLine {
    pub spans: Vec<StyledSpan>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StyledSpan {
    pub text: String,
    pub style: TokenStyle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TokenStyle {
    pub foreground: (u8, u8, u8),
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    None,
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Table {
    pub alignments: Vec<Alignment>,
    pub header: Vec<Vec<Inline>>,
    pub rows: Vec<Vec<Vec<Inline>>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Inline {
    Text(String),
    /// Inline code span; no copy button
    Code(String),
    Emphasis(Vec<Inline>),
    Strong(Vec<Inline>),
    Strikethrough(Vec<Inline>),
    Link(Link),
    Image {
        src: Option<String>,
        alt: String,
    },
    SoftBreak,
    HardBreak,
    /// Allow-listed raw inline element, e.g. `<sub>`
    Element {
        tag: &'static str,
        children: Vec<Inline>,
    },
}

/// Links always open in a new browsing context with no opener reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
    /// `None` when the target was not a safe scheme
    pub href: Option<String>,
    pub title: Option<String>,
    pub children: Vec<Inline>,
}

impl Link {
    pub const TARGET: &'static str = "_blank";
    pub const REL: &'static str = "noopener noreferrer";
}

/// Node of a sanitized raw markup block
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MarkupNode {
    Text {
        text: String,
    },
    Element {
        tag: &'static str,
        children: Vec<MarkupNode>,
    },
    /// `<a>`, under the same opening rules as [`Link`]
    Link {
        href: Option<String>,
        children: Vec<MarkupNode>,
    },
}

// ============================================================================
// Plain text extraction
// ============================================================================

impl Document {
    /// All code blocks in document order, including nested ones
    pub fn code_blocks(&self) -> Vec<&CodeBlock> {
        let mut out = Vec::new();
        collect_code_blocks(&self.blocks, &mut out);
        out
    }

    pub fn code_block(&self, ordinal: usize) -> Option<&CodeBlock> {
        self.code_blocks().into_iter().nth(ordinal)
    }

    pub fn plain_text(&self) -> String {
        blocks_text(&self.blocks)
    }
}

fn collect_code_blocks<'a>(blocks: &'a [Block], out: &mut Vec<&'a CodeBlock>) {
    for block in blocks {
        match block {
            Block::CodeBlock(code) => out.push(code),
            Block::BlockQuote(inner) => collect_code_blocks(inner, out),
            Block::List(list) => {
                for item in &list.items {
                    collect_code_blocks(&item.blocks, out);
                }
            }
            _ => {}
        }
    }
}

impl CodeBlock {
    /// Text of the highlighted spans, or the raw code when unhighlighted.
    /// Always equal to `code`.
    pub fn plain_text(&self) -> String {
        match &self.highlighted {
            Some(lines) => lines
                .iter()
                .flat_map(|line| line.spans.iter())
                .map(|span| span.text.as_str())
                .collect(),
            None => self.code.clone(),
        }
    }
}

impl Block {
    pub fn plain_text(&self) -> String {
        match self {
            Block::Paragraph(inlines) | Block::Heading { content: inlines, .. } => {
                inlines_text(inlines)
            }
            Block::BlockQuote(blocks) => blocks_text(blocks),
            Block::List(list) => list
                .items
                .iter()
                .map(|item| blocks_text(&item.blocks))
                .collect::<Vec<_>>()
                .join("\n"),
            Block::CodeBlock(code) => code.plain_text(),
            Block::Table(table) => std::iter::once(&table.header)
                .chain(table.rows.iter())
                .map(|row| {
                    row.iter()
                        .map(|cell| inlines_text(cell))
                        .collect::<Vec<_>>()
                        .join("\t")
                })
                .collect::<Vec<_>>()
                .join("\n"),
            Block::Rule => String::new(),
            Block::Markup(nodes) => markup_text(nodes),
        }
    }
}

fn blocks_text(blocks: &[Block]) -> String {
    blocks
        .iter()
        .map(Block::plain_text)
        .collect::<Vec<_>>()
        .join("\n")
}

pub(crate) fn inlines_text(inlines: &[Inline]) -> String {
    let mut out = String::new();
    for inline in inlines {
        inline.push_text(&mut out);
    }
    out
}

impl Inline {
    fn push_text(&self, out: &mut String) {
        match self {
            Inline::Text(text) | Inline::Code(text) => out.push_str(text),
            Inline::Emphasis(children)
            | Inline::Strong(children)
            | Inline::Strikethrough(children)
            | Inline::Element { children, .. }
            | Inline::Link(Link { children, .. }) => {
                for child in children {
                    child.push_text(out);
                }
            }
            Inline::Image { alt, .. } => out.push_str(alt),
            Inline::SoftBreak => out.push(' '),
            Inline::HardBreak => out.push('\n'),
        }
    }
}

fn markup_text(nodes: &[MarkupNode]) -> String {
    let mut out = String::new();
    for node in nodes {
        match node {
            MarkupNode::Text { text } => out.push_str(text),
            MarkupNode::Element { children, .. } | MarkupNode::Link { children, .. } => {
                out.push_str(&markup_text(children));
            }
        }
    }
    out
}
